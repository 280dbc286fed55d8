//! Output formatting module

mod json;
mod text;

use miette::Result;

use crate::cli::OutputFormat;
use crate::linter::FileReport;

/// Prints the reports; returns true when any violation was found.
pub fn output_results(reports: &[FileReport], format: OutputFormat) -> Result<bool> {
    let has_violations = reports.iter().any(|r| !r.violations.is_empty());

    match format {
        OutputFormat::Json => json::output_json(reports)?,
        OutputFormat::Text => text::output_text(reports),
    }

    Ok(has_violations)
}
