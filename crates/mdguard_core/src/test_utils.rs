use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use url::Url;

use crate::CoreError;
use crate::diagnostic::Diagnostic;
use crate::document::Document;
use crate::engine::{EngineOutput, LintRequest, RuleEngine};
use crate::fs::{DirEntry, FileSystem, FileType, NativeFs};
use crate::output::{OutputLog, OutputSink};
use crate::scheduler::{HostView, Publisher};
use crate::violation::RuleViolation;

/// Wraps a file layer and counts every call made through it.
pub struct CountingFs<F = NativeFs> {
    inner: F,
    calls: AtomicUsize,
}

impl CountingFs<NativeFs> {
    pub fn native() -> Self {
        Self::new(NativeFs)
    }
}

impl<F: FileSystem> CountingFs<F> {
    pub fn new(inner: F) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<F: FileSystem> FileSystem for CountingFs<F> {
    async fn stat(&self, path: &Path) -> Result<FileType, CoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.stat(path).await
    }

    async fn read_file(&self, path: &Path) -> Result<String, CoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.read_file(path).await
    }

    async fn read_dir(&self, path: &Path) -> Result<Vec<DirEntry>, CoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.read_dir(path).await
    }

    fn is_available(&self) -> bool {
        self.inner.is_available()
    }
}

/// Engine returning canned violations and counting evaluations.
#[derive(Default)]
pub struct StubEngine {
    pub violations: Mutex<Vec<RuleViolation>>,
    pub fail: Mutex<bool>,
    pub delay: Mutex<Option<std::time::Duration>>,
    pub calls: AtomicUsize,
    pub requests: Mutex<Vec<LintRequest>>,
}

impl StubEngine {
    pub fn with_violations(violations: Vec<RuleViolation>) -> Self {
        Self {
            violations: Mutex::new(violations),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RuleEngine for StubEngine {
    async fn evaluate(&self, request: LintRequest) -> Result<EngineOutput, CoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request);
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if *self.fail.lock() {
            return Err(CoreError::engine("stub failure"));
        }
        Ok(EngineOutput::Violations(self.violations.lock().clone()))
    }
}

/// Publisher recording the latest diagnostic set per document.
#[derive(Default)]
pub struct RecordingPublisher {
    pub published: Mutex<HashMap<Url, Vec<Diagnostic>>>,
    pub publishes: AtomicUsize,
}

impl RecordingPublisher {
    pub fn diagnostics(&self, uri: &Url) -> Option<Vec<Diagnostic>> {
        self.published.lock().get(uri).cloned()
    }

    pub fn publishes(&self) -> usize {
        self.publishes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn publish(&self, document: &Document, diagnostics: Vec<Diagnostic>) {
        self.publishes.fetch_add(1, Ordering::SeqCst);
        self.published.lock().insert(document.uri.clone(), diagnostics);
    }

    async fn clear(&self, uri: &Url) {
        self.published.lock().remove(uri);
    }

    async fn clear_all(&self) {
        self.published.lock().clear();
    }
}

/// Host with a fixed set of visible documents and an optional cursor.
#[derive(Default)]
pub struct StaticHost {
    pub visible: Mutex<Vec<Document>>,
    pub cursor: Mutex<Option<(Url, u32)>>,
}

impl HostView for StaticHost {
    fn visible_documents(&self) -> Vec<Document> {
        self.visible.lock().clone()
    }

    fn active_cursor(&self) -> Option<(Url, u32)> {
        self.cursor.lock().clone()
    }
}

/// Output sink keeping every line it receives.
#[derive(Default)]
pub struct CapturedOutput {
    pub lines: Mutex<Vec<String>>,
    pub shows: AtomicUsize,
}

impl CapturedOutput {
    /// A log writing into a fresh capture.
    pub fn log() -> (Arc<Self>, Arc<OutputLog>) {
        let capture = Arc::new(Self::default());
        let log = Arc::new(OutputLog::new(Some(capture.clone() as Arc<dyn OutputSink>)));
        (capture, log)
    }

    /// Lines logged at the error level.
    pub fn errors(&self) -> Vec<String> {
        self.lines
            .lock()
            .iter()
            .filter(|line| line.contains("] ERROR: "))
            .cloned()
            .collect()
    }

    pub fn shows(&self) -> usize {
        self.shows.load(Ordering::SeqCst)
    }
}

impl OutputSink for CapturedOutput {
    fn append_line(&self, line: &str) {
        self.lines.lock().push(line.to_string());
    }

    fn show(&self) {
        self.shows.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn markdown(uri: &str, text: &str) -> Document {
    Document::new(Url::parse(uri).unwrap_or_else(|e| panic!("{uri}: {e}")), text, "markdown", 1)
}
