//! JSON output formatter

use miette::{IntoDiagnostic, Result};
use serde::Serialize;

use mdguard_core::RuleViolation;

use crate::linter::FileReport;

#[derive(Serialize)]
struct JsonReport<'a> {
    path: String,
    violations: &'a [RuleViolation],
}

pub fn output_json(reports: &[FileReport]) -> Result<()> {
    let output: Vec<_> = reports
        .iter()
        .map(|r| JsonReport {
            path: r.path.display().to_string(),
            violations: &r.violations,
        })
        .collect();

    let json = serde_json::to_string_pretty(&output).into_diagnostic()?;
    println!("{}", json);
    Ok(())
}
