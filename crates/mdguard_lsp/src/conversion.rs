//! LSP type conversion utilities.

use serde::{Deserialize, Serialize};
use tower_lsp::lsp_types::{
    CodeDescription, Diagnostic, DiagnosticSeverity, NumberOrString, Position, Range, TextEdit,
};

use mdguard_core::{
    Diagnostic as MdguardDiagnostic, FixDescriptor, Position as MdguardPosition,
    Range as MdguardRange, TextEdit as MdguardTextEdit,
};

/// Source name shown next to diagnostics.
pub const SOURCE: &str = "mdguard";

/// Payload attached to each LSP diagnostic so code actions can act on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticData {
    pub rule: String,
    pub rule_alias: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fix_info: Option<FixDescriptor>,
}

impl DiagnosticData {
    /// Reads the payload back from a diagnostic sent by the client.
    pub fn from_diagnostic(diagnostic: &Diagnostic) -> Option<Self> {
        let data = diagnostic.data.clone()?;
        serde_json::from_value(data).ok()
    }
}

/// Converts an mdguard diagnostic to an LSP diagnostic.
pub fn to_lsp_diagnostic(diag: &MdguardDiagnostic) -> Diagnostic {
    let data = DiagnosticData {
        rule: diag.rule.clone(),
        rule_alias: diag.rule_alias.clone(),
        fix_info: diag.fix_info.clone(),
    };
    Diagnostic {
        range: to_lsp_range(diag.range),
        severity: Some(DiagnosticSeverity::WARNING),
        code: Some(NumberOrString::String(diag.rule.clone())),
        code_description: diag
            .information
            .clone()
            .map(|href| CodeDescription { href }),
        source: Some(SOURCE.to_string()),
        message: diag.message.clone(),
        data: serde_json::to_value(data).ok(),
        ..Default::default()
    }
}

pub fn to_lsp_position(position: MdguardPosition) -> Position {
    Position::new(position.line, position.character)
}

pub fn to_lsp_range(range: MdguardRange) -> Range {
    Range::new(to_lsp_position(range.start), to_lsp_position(range.end))
}

pub fn from_lsp_range(range: Range) -> MdguardRange {
    MdguardRange {
        start: MdguardPosition {
            line: range.start.line,
            character: range.start.character,
        },
        end: MdguardPosition {
            line: range.end.line,
            character: range.end.character,
        },
    }
}

pub fn to_lsp_edit(edit: MdguardTextEdit) -> TextEdit {
    TextEdit {
        range: to_lsp_range(edit.range),
        new_text: edit.new_text,
    }
}

/// Helper to compare Positions (p1 <= p2)
pub fn positions_le(p1: Position, p2: Position) -> bool {
    p1.line < p2.line || (p1.line == p2.line && p1.character <= p2.character)
}

/// Whether two ranges touch or overlap.
pub fn ranges_intersect(a: &Range, b: &Range) -> bool {
    positions_le(a.start, b.end) && positions_le(b.start, a.end)
}
