//! Applying fix descriptors to document text.
//!
//! Single fixes become a [`TextEdit`] on one line. Batches are computed
//! against the original line array: fixes are sorted bottom-to-top and
//! right-to-left, duplicates dropped, overlapping fixes on one line skipped,
//! deleted lines removed by original index, and the survivors joined with the
//! document's dominant line ending.

use std::cmp::Ordering;

use tracing::{debug, warn};

use crate::diagnostic::{Position, Range};
use crate::document::{Document, LineEnding, dominant_line_ending, split_lines, utf16_len, utf16_to_byte};
use crate::violation::{DeleteCount, FixDescriptor, RuleViolation};

/// Outcome of applying one fix to one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineFix {
    Replace(String),
    /// Remove the line together with one adjacent terminator.
    DeleteLine,
}

/// A replacement of `range` with `new_text`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEdit {
    pub range: Range,
    pub new_text: String,
}

/// Result of applying a batch of fixes.
#[derive(Debug)]
pub struct FixerResult {
    /// Number of fixes applied.
    pub fixes_applied: usize,
    /// The fixed content.
    pub fixed_content: String,
    /// Whether the content was modified.
    pub modified: bool,
}

impl FixerResult {
    pub fn new(fixes_applied: usize, fixed_content: String, modified: bool) -> Self {
        Self {
            fixes_applied,
            fixed_content,
            modified,
        }
    }

    /// Creates a result indicating no changes were made.
    pub fn unchanged(content: String) -> Self {
        Self {
            fixes_applied: 0,
            fixed_content: content,
            modified: false,
        }
    }
}

/// Which violations a batch fix applies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FixFilter {
    All,
    /// Violations of one rule, matched against any of its names.
    Rule(String),
    /// Violations on 0-based lines `start..=end`.
    Lines { start: usize, end: usize },
}

impl FixFilter {
    pub fn rule(rule: Option<&str>) -> Self {
        match rule {
            Some(rule) => FixFilter::Rule(rule.to_string()),
            None => FixFilter::All,
        }
    }

    fn accepts(&self, violation: &RuleViolation) -> bool {
        match self {
            FixFilter::All => true,
            FixFilter::Rule(rule) => violation.has_rule(rule),
            FixFilter::Lines { start, end } => {
                let line = violation.line_number.saturating_sub(1);
                *start <= line && line <= *end
            }
        }
    }
}

/// Applies one fix descriptor to `line`.
///
/// `\n` in the inserted text becomes `line_ending`. A whole-line delete with
/// no text to insert yields [`LineFix::DeleteLine`].
pub fn apply_fix(line: &str, fix: &FixDescriptor, line_ending: LineEnding) -> LineFix {
    let edit_index = fix.edit_column.saturating_sub(1);
    let insert = fix
        .insert_text
        .as_deref()
        .unwrap_or_default()
        .replace('\n', line_ending.as_str());
    let prefix = &line[..utf16_to_byte(line, edit_index)];
    match fix.delete_count {
        DeleteCount::WholeLine if insert.is_empty() => LineFix::DeleteLine,
        DeleteCount::WholeLine => LineFix::Replace(format!("{}{}", prefix, insert)),
        DeleteCount::Chars(count) => {
            let suffix = &line[utf16_to_byte(line, edit_index.saturating_add(count))..];
            LineFix::Replace(format!("{}{}{}", prefix, insert, suffix))
        }
    }
}

/// Builds the edit for a fix applied to the document's line `line_index`.
///
/// The fix's own line number, when present, wins over `line_index`. Whole
/// line deletion takes the following terminator on line 1 and the preceding
/// terminator elsewhere; the only line of a document is cleared instead.
/// Returns `None` when the target line does not exist.
pub fn fix_line_edit(document: &Document, line_index: usize, fix: &FixDescriptor) -> Option<TextEdit> {
    let lines = document.lines();
    let index = fix.line_number.map_or(line_index, |n| n.saturating_sub(1));
    let Some(text) = lines.get(index) else {
        warn!(
            "Fix for line {} does not match {} (line count {})",
            index + 1,
            document.uri,
            lines.len()
        );
        return None;
    };
    let line_range = Range::new(
        Position::new(index, 0),
        Position::new(index, utf16_len(text)),
    );

    match apply_fix(text, fix, document.line_ending()) {
        LineFix::Replace(new_text) => Some(TextEdit {
            range: line_range,
            new_text,
        }),
        LineFix::DeleteLine => {
            let range = if index == 0 {
                if lines.len() > 1 {
                    Range::new(Position::new(0, 0), Position::new(1, 0))
                } else {
                    line_range
                }
            } else {
                let previous = lines[index - 1];
                Range::new(
                    Position::new(index - 1, utf16_len(previous)),
                    line_range.end,
                )
            };
            Some(TextEdit {
                range,
                new_text: String::new(),
            })
        }
    }
}

/// An edit replacing the whole of `document` with `new_text`.
pub fn full_document_edit(document: &Document, new_text: String) -> TextEdit {
    let lines = document.lines();
    let last = lines.len().saturating_sub(1);
    let end = lines.last().map_or(0, |l| utf16_len(l));
    TextEdit {
        range: Range::new(Position::new(0, 0), Position::new(last, end)),
        new_text,
    }
}

#[derive(Debug, Clone)]
struct PendingFix {
    line_index: usize,
    edit_index: usize,
    delete_count: DeleteCount,
    insert_text: String,
    dropped: bool,
}

impl PendingFix {
    fn from_violation(violation: &RuleViolation) -> Option<Self> {
        let fix = violation.fix_info.as_ref()?;
        let line_number = fix.line_number.unwrap_or(violation.line_number);
        Some(Self {
            line_index: line_number.checked_sub(1)?,
            edit_index: fix.edit_column.saturating_sub(1),
            delete_count: fix.delete_count,
            insert_text: fix.insert_text.clone().unwrap_or_default(),
            dropped: false,
        })
    }

    fn same_edit(&self, other: &Self) -> bool {
        self.line_index == other.line_index
            && self.edit_index == other.edit_index
            && self.delete_count == other.delete_count
            && self.insert_text == other.insert_text
    }

    fn delete_value(&self) -> i64 {
        i64::from(self.delete_count)
    }

    fn descriptor(&self) -> FixDescriptor {
        FixDescriptor {
            line_number: None,
            edit_column: self.edit_index + 1,
            delete_count: self.delete_count,
            insert_text: Some(self.insert_text.clone()),
        }
    }
}

/// Bottom-to-top, whole-line deletes last, right-to-left, longest insert first.
fn fix_order(a: &PendingFix, b: &PendingFix) -> Ordering {
    b.line_index
        .cmp(&a.line_index)
        .then_with(|| {
            a.delete_count
                .is_whole_line()
                .cmp(&b.delete_count.is_whole_line())
        })
        .then_with(|| b.edit_index.cmp(&a.edit_index))
        .then_with(|| utf16_len(&b.insert_text).cmp(&utf16_len(&a.insert_text)))
}

/// Applies the fixes of `violations` accepted by `filter` to `text`.
pub fn apply_fixes(text: &str, violations: &[RuleViolation], filter: &FixFilter) -> FixerResult {
    let mut fixes: Vec<PendingFix> = violations
        .iter()
        .filter(|v| filter.accepts(v))
        .filter_map(PendingFix::from_violation)
        .collect();
    if fixes.is_empty() {
        return FixerResult::unchanged(text.to_string());
    }

    fixes.sort_by(fix_order);
    fixes.dedup_by(|current, previous| current.same_edit(previous));

    // An insert-only fix followed by a delete-only fix at the same spot
    // becomes one replacement.
    for i in 1..fixes.len() {
        let (head, tail) = fixes.split_at_mut(i);
        let previous = &mut head[i - 1];
        let current = &mut tail[0];
        if !previous.dropped
            && current.line_index == previous.line_index
            && current.edit_index == previous.edit_index
            && current.insert_text.is_empty()
            && current.delete_value() > 0
            && !previous.insert_text.is_empty()
            && previous.delete_value() == 0
        {
            current.insert_text = previous.insert_text.clone();
            previous.dropped = true;
        }
    }

    let line_ending = dominant_line_ending(text);
    let mut lines: Vec<Option<String>> = split_lines(text)
        .into_iter()
        .map(|l| Some(l.to_string()))
        .collect();

    let mut applied = 0;
    let mut last_line: Option<usize> = None;
    let mut last_edit: i64 = -1;
    for fix in fixes.iter().filter(|f| !f.dropped) {
        let edit = i64::try_from(fix.edit_index).unwrap_or(i64::MAX);
        let delete = fix.delete_value();
        let fits = last_line != Some(fix.line_index)
            || fix.delete_count.is_whole_line()
            || edit.saturating_add(delete) <= last_edit - if delete > 0 { 0 } else { 1 };
        last_line = Some(fix.line_index);
        last_edit = edit;
        if !fits {
            debug!("Skipping overlapping fix on line {}", fix.line_index + 1);
            continue;
        }

        let Some(slot) = lines.get_mut(fix.line_index) else {
            warn!("Skipping fix for missing line {}", fix.line_index + 1);
            continue;
        };
        let Some(line) = slot.as_deref() else {
            continue;
        };
        *slot = match apply_fix(line, &fix.descriptor(), line_ending) {
            LineFix::Replace(text) => Some(text),
            LineFix::DeleteLine => None,
        };
        applied += 1;
    }

    let fixed: Vec<String> = lines.into_iter().flatten().collect();
    let fixed = fixed.join(line_ending.as_str());
    let modified = fixed != text;
    FixerResult::new(applied, fixed, modified)
}
