//! Violation records exchanged with the rule-evaluation engine.

use serde::{Deserialize, Serialize};

/// One rule non-compliance reported by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleViolation {
    /// Rule identifiers, primary name first (e.g. `["MD019", "no-multiple-space-atx"]`).
    pub rule_names: Vec<String>,
    /// 1-based line number.
    pub line_number: usize,
    pub rule_description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_context: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_range: Option<ErrorRange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_information: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fix_info: Option<FixDescriptor>,
}

impl RuleViolation {
    pub fn new<I, S>(names: I, line_number: usize, description: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            rule_names: names.into_iter().map(Into::into).collect(),
            line_number,
            rule_description: description.into(),
            error_detail: None,
            error_context: None,
            error_range: None,
            rule_information: None,
            fix_info: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.error_detail = Some(detail.into());
        self
    }

    pub fn with_range(mut self, column: usize, length: usize) -> Self {
        self.error_range = Some(ErrorRange { column, length });
        self
    }

    pub fn with_information(mut self, url: impl Into<String>) -> Self {
        self.rule_information = Some(url.into());
        self
    }

    pub fn with_fix(mut self, fix: FixDescriptor) -> Self {
        self.fix_info = Some(fix);
        self
    }

    /// Primary rule name.
    pub fn rule(&self) -> &str {
        self.rule_names.first().map(String::as_str).unwrap_or_default()
    }

    /// All names joined with `/`, as shown to users.
    pub fn rule_alias(&self) -> String {
        self.rule_names.join("/")
    }

    pub fn has_rule(&self, name: &str) -> bool {
        self.rule_names.iter().any(|n| n.eq_ignore_ascii_case(name))
    }
}

/// Column span of a violation: 1-based start column and length.
///
/// Serialized as the engine's `[column, length]` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(usize, usize)", into = "(usize, usize)")]
pub struct ErrorRange {
    pub column: usize,
    pub length: usize,
}

impl From<(usize, usize)> for ErrorRange {
    fn from((column, length): (usize, usize)) -> Self {
        Self { column, length }
    }
}

impl From<ErrorRange> for (usize, usize) {
    fn from(range: ErrorRange) -> Self {
        (range.column, range.length)
    }
}

/// Number of characters a fix removes.
///
/// The engine encodes whole-line deletion as `-1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum DeleteCount {
    Chars(usize),
    WholeLine,
}

impl Default for DeleteCount {
    fn default() -> Self {
        DeleteCount::Chars(0)
    }
}

impl DeleteCount {
    /// Characters removed, ignoring the whole-line sentinel.
    pub fn chars(self) -> usize {
        match self {
            DeleteCount::Chars(n) => n,
            DeleteCount::WholeLine => 0,
        }
    }

    pub fn is_whole_line(self) -> bool {
        matches!(self, DeleteCount::WholeLine)
    }
}

impl From<i64> for DeleteCount {
    fn from(value: i64) -> Self {
        match value {
            v if v < 0 => DeleteCount::WholeLine,
            v => DeleteCount::Chars(usize::try_from(v).unwrap_or(usize::MAX)),
        }
    }
}

impl From<DeleteCount> for i64 {
    fn from(value: DeleteCount) -> Self {
        match value {
            DeleteCount::Chars(n) => i64::try_from(n).unwrap_or(i64::MAX),
            DeleteCount::WholeLine => -1,
        }
    }
}

/// A single-line edit attached to a violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixDescriptor {
    /// 1-based target line; the violation's line when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_number: Option<usize>,
    /// 1-based column where the edit starts.
    #[serde(default = "default_edit_column")]
    pub edit_column: usize,
    #[serde(default)]
    pub delete_count: DeleteCount,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insert_text: Option<String>,
}

fn default_edit_column() -> usize {
    1
}

impl FixDescriptor {
    /// Replaces `delete_count` characters at `edit_column` with `insert_text`.
    pub fn replace(edit_column: usize, delete_count: usize, insert_text: impl Into<String>) -> Self {
        Self {
            line_number: None,
            edit_column,
            delete_count: DeleteCount::Chars(delete_count),
            insert_text: Some(insert_text.into()),
        }
    }

    /// Inserts text at `edit_column`.
    pub fn insert(edit_column: usize, insert_text: impl Into<String>) -> Self {
        Self::replace(edit_column, 0, insert_text)
    }

    /// Removes `delete_count` characters at `edit_column`.
    pub fn delete(edit_column: usize, delete_count: usize) -> Self {
        Self {
            insert_text: None,
            ..Self::replace(edit_column, delete_count, "")
        }
    }

    /// Deletes the whole line, terminator included.
    pub fn delete_line() -> Self {
        Self {
            line_number: None,
            edit_column: 1,
            delete_count: DeleteCount::WholeLine,
            insert_text: None,
        }
    }

    pub fn on_line(mut self, line_number: usize) -> Self {
        self.line_number = Some(line_number);
        self
    }
}
