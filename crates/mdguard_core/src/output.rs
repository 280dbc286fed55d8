//! Timestamped output log shown to the user on demand.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use time::OffsetDateTime;
use time::macros::format_description;
use tracing::{error, info};

/// Destination for output lines, such as an editor output panel.
pub trait OutputSink: Send + Sync {
    fn append_line(&self, line: &str);

    /// Brings the output to the user's attention.
    fn show(&self);
}

/// Output log that surfaces itself on the first error after each reset.
#[derive(Default)]
pub struct OutputLog {
    sink: Option<Arc<dyn OutputSink>>,
    shown: AtomicBool,
}

impl std::fmt::Debug for OutputLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputLog")
            .field("has_sink", &self.sink.is_some())
            .field("shown", &self.shown.load(Ordering::SeqCst))
            .finish()
    }
}

impl OutputLog {
    pub fn new(sink: Option<Arc<dyn OutputSink>>) -> Self {
        Self {
            sink,
            shown: AtomicBool::new(false),
        }
    }

    pub fn info(&self, message: &str) {
        info!("{}", message);
        self.append("INFO", message);
    }

    /// Logs an error. Returns true when this call surfaced the log.
    pub fn error(&self, message: &str) -> bool {
        error!("{}", message);
        self.append("ERROR", message);
        let first = !self.shown.swap(true, Ordering::SeqCst);
        if first && let Some(sink) = &self.sink {
            sink.show();
        }
        first
    }

    /// Allows the next error to surface the log again.
    pub fn reset(&self) {
        self.shown.store(false, Ordering::SeqCst);
    }

    fn append(&self, level: &str, message: &str) {
        if let Some(sink) = &self.sink {
            sink.append_line(&format_line(timestamp(), level, message));
        }
    }
}

fn timestamp() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

fn format_line(at: OffsetDateTime, level: &str, message: &str) -> String {
    let clock = at
        .format(format_description!("[hour]:[minute]:[second]"))
        .unwrap_or_default();
    format!("[{}] {}: {}", clock, level, message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use time::macros::datetime;

    #[derive(Default)]
    struct Capture {
        lines: Mutex<Vec<String>>,
        shows: Mutex<usize>,
    }

    impl OutputSink for Capture {
        fn append_line(&self, line: &str) {
            self.lines.lock().push(line.to_string());
        }

        fn show(&self) {
            *self.shows.lock() += 1;
        }
    }

    #[test]
    fn lines_carry_clock_and_level() {
        let at = datetime!(2024-03-01 09:05:07 UTC);
        assert_eq!(format_line(at, "INFO", "hello"), "[09:05:07] INFO: hello");
    }

    #[test]
    fn surfaces_once_per_reset() {
        let capture = Arc::new(Capture::default());
        let log = OutputLog::new(Some(capture.clone() as Arc<dyn OutputSink>));

        log.info("starting");
        assert!(log.error("first"));
        assert!(!log.error("second"));
        assert_eq!(*capture.shows.lock(), 1);

        log.reset();
        assert!(log.error("third"));
        assert_eq!(*capture.shows.lock(), 2);

        let lines = capture.lines.lock();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].ends_with("] INFO: starting"));
        assert!(lines[1].ends_with("] ERROR: first"));
    }

    #[test]
    fn works_without_a_sink() {
        let log = OutputLog::default();
        assert!(log.error("nowhere"));
        assert!(!log.error("again"));
    }
}
