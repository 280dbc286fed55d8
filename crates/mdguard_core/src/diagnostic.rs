//! Conversion of engine violations into positioned diagnostics.

use std::collections::BTreeMap;

use url::Url;

use crate::document::{Document, utf16_len};
use crate::settings::FocusMode;
use crate::violation::{FixDescriptor, RuleViolation};

/// A 0-based position; `character` counts UTF-16 code units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

impl Position {
    pub fn new(line: usize, character: usize) -> Self {
        Self {
            line: u32::try_from(line).unwrap_or(u32::MAX),
            character: u32::try_from(character).unwrap_or(u32::MAX),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    pub fn contains_line(&self, line: u32) -> bool {
        self.start.line <= line && line <= self.end.line
    }
}

/// A violation positioned in a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub range: Range,
    pub message: String,
    /// Primary rule name.
    pub rule: String,
    /// All rule names joined with `/`.
    pub rule_alias: String,
    pub fix_info: Option<FixDescriptor>,
    pub information: Option<Url>,
}

impl Diagnostic {
    pub fn is_fixable(&self) -> bool {
        self.fix_info.is_some()
    }
}

/// Formats the user-facing message of a violation.
pub fn message(violation: &RuleViolation) -> String {
    let mut message = format!("{}: {}", violation.rule_alias(), violation.rule_description);
    if let Some(detail) = &violation.error_detail {
        message.push_str(" [");
        message.push_str(detail);
        message.push(']');
    }
    message
}

/// Builds diagnostics for one document.
#[derive(Debug, Default)]
pub struct DiagnosticBuilder {
    focus_mode: FocusMode,
    cursor_line: Option<u32>,
    information: BTreeMap<String, Url>,
}

impl DiagnosticBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Suppresses violations near `cursor_line` (0-based) according to
    /// `focus_mode`.
    pub fn with_focus(mut self, focus_mode: FocusMode, cursor_line: Option<u32>) -> Self {
        self.focus_mode = focus_mode;
        self.cursor_line = cursor_line;
        self
    }

    /// Rule name to documentation link, gathered from built violations.
    pub fn information(&self) -> &BTreeMap<String, Url> {
        &self.information
    }

    pub fn into_information(self) -> BTreeMap<String, Url> {
        self.information
    }

    /// Builds diagnostics in engine order.
    pub fn build(&mut self, document: &Document, violations: &[RuleViolation]) -> Vec<Diagnostic> {
        let lines = document.lines();
        let mut diagnostics = Vec::with_capacity(violations.len());
        for violation in violations {
            let Some(index) = violation.line_number.checked_sub(1) else {
                continue;
            };
            let Some(text) = lines.get(index) else {
                continue;
            };
            let line = u32::try_from(index).unwrap_or(u32::MAX);
            if self.is_focused(line) {
                continue;
            }

            let information = violation
                .rule_information
                .as_deref()
                .and_then(|link| Url::parse(link).ok());
            if let Some(link) = &information {
                self.information
                    .insert(violation.rule().to_string(), link.clone());
            }

            diagnostics.push(Diagnostic {
                range: line_range(index, utf16_len(text), violation),
                message: message(violation),
                rule: violation.rule().to_string(),
                rule_alias: violation.rule_alias(),
                fix_info: violation.fix_info.clone(),
                information,
            });
        }
        diagnostics
    }

    fn is_focused(&self, line: u32) -> bool {
        match (self.focus_mode, self.cursor_line) {
            (FocusMode::Window(n), Some(cursor)) => {
                line.saturating_sub(n) <= cursor && cursor <= line.saturating_add(n)
            }
            _ => false,
        }
    }
}

/// The whole line, narrowed to the violation's column span when present.
fn line_range(index: usize, length: usize, violation: &RuleViolation) -> Range {
    let (start, end) = match violation.error_range {
        Some(range) => {
            let start = range.column.saturating_sub(1).min(length);
            let end = start.saturating_add(range.length).min(length);
            (start, end)
        }
        None => (0, length),
    };
    Range::new(Position::new(index, start), Position::new(index, end))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::markdown;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn heading() -> RuleViolation {
        RuleViolation::new(
            ["MD019", "no-multiple-space-atx"],
            1,
            "Multiple spaces after hash on atx style heading",
        )
        .with_range(1, 4)
        .with_information("https://example.com/md019.md")
    }

    #[test]
    fn narrows_to_error_range() {
        let doc = markdown("file:///ws/a.md", "#  Title\n");
        let diagnostics = DiagnosticBuilder::new().build(&doc, &[heading()]);

        assert_eq!(diagnostics.len(), 1);
        let d = &diagnostics[0];
        assert_eq!(d.range, Range::new(Position::new(0, 0), Position::new(0, 4)));
        assert_eq!(
            d.message,
            "MD019/no-multiple-space-atx: Multiple spaces after hash on atx style heading"
        );
        assert_eq!(d.rule, "MD019");
        assert_eq!(d.rule_alias, "MD019/no-multiple-space-atx");
    }

    #[test]
    fn whole_line_without_error_range_and_detail_in_message() {
        let doc = markdown("file:///ws/a.md", "a\n\n\n");
        let violation = RuleViolation::new(["MD012", "no-multiple-blanks"], 2, "Multiple consecutive blank lines")
            .with_detail("Expected: 1; Actual: 2");
        let diagnostics = DiagnosticBuilder::new().build(&doc, &[violation]);

        assert_eq!(diagnostics[0].range, Range::new(Position::new(1, 0), Position::new(1, 0)));
        assert_eq!(
            diagnostics[0].message,
            "MD012/no-multiple-blanks: Multiple consecutive blank lines [Expected: 1; Actual: 2]"
        );
    }

    #[test]
    fn error_range_is_clipped_to_the_line() {
        let doc = markdown("file:///ws/a.md", "short\n");
        let violation = RuleViolation::new(["X"], 1, "x").with_range(4, 50);
        let diagnostics = DiagnosticBuilder::new().build(&doc, &[violation]);
        assert_eq!(diagnostics[0].range, Range::new(Position::new(0, 3), Position::new(0, 5)));
    }

    #[test]
    fn columns_count_utf16_units() {
        let doc = markdown("file:///ws/a.md", "\u{1F600}x  \n");
        let violation = RuleViolation::new(["MD009"], 1, "Trailing spaces").with_range(4, 2);
        let diagnostics = DiagnosticBuilder::new().build(&doc, &[violation]);
        assert_eq!(diagnostics[0].range, Range::new(Position::new(0, 3), Position::new(0, 5)));
    }

    #[test]
    fn lines_outside_the_document_are_dropped() {
        let doc = markdown("file:///ws/a.md", "one\n");
        let violations = [
            RuleViolation::new(["X"], 0, "zero"),
            RuleViolation::new(["X"], 9, "past the end"),
            RuleViolation::new(["X"], 1, "kept"),
        ];
        let diagnostics = DiagnosticBuilder::new().build(&doc, &violations);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].message, "X: kept");
    }

    #[test]
    fn engine_order_is_preserved() {
        let doc = markdown("file:///ws/a.md", "a\nb\nc\n");
        let violations = [
            RuleViolation::new(["B"], 3, "third"),
            RuleViolation::new(["A"], 1, "first"),
        ];
        let rules: Vec<_> = DiagnosticBuilder::new()
            .build(&doc, &violations)
            .into_iter()
            .map(|d| d.rule)
            .collect();
        assert_eq!(rules, vec!["B", "A"]);
    }

    #[rstest]
    #[case(FocusMode::Disabled, Some(2), vec![1, 2, 3, 4, 5])]
    #[case(FocusMode::Window(0), Some(2), vec![1, 2, 4, 5])]
    #[case(FocusMode::Window(1), Some(2), vec![1, 5])]
    #[case(FocusMode::Window(5), Some(2), vec![])]
    #[case(FocusMode::Window(1), None, vec![1, 2, 3, 4, 5])]
    fn focus_mode_window(#[case] mode: FocusMode, #[case] cursor: Option<u32>, #[case] expected: Vec<usize>) {
        let doc = markdown("file:///ws/a.md", "1\n2\n3\n4\n5\n");
        let violations: Vec<_> = (1..=5).map(|n| RuleViolation::new(["X"], n, "x")).collect();
        let lines: Vec<usize> = DiagnosticBuilder::new()
            .with_focus(mode, cursor)
            .build(&doc, &violations)
            .iter()
            .map(|d| d.range.start.line as usize + 1)
            .collect();
        assert_eq!(lines, expected);
    }

    #[test]
    fn records_information_links() {
        let doc = markdown("file:///ws/a.md", "#  Title\n");
        let mut builder = DiagnosticBuilder::new();
        let diagnostics = builder.build(&doc, &[heading()]);

        assert_eq!(
            diagnostics[0].information.as_ref().map(Url::as_str),
            Some("https://example.com/md019.md")
        );
        assert_eq!(
            builder.information().get("MD019").map(Url::as_str),
            Some("https://example.com/md019.md")
        );
    }
}
