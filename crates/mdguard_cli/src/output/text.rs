//! Text output formatter

use mdguard_core::RuleViolation;

use crate::linter::FileReport;

/// `path:line[:column] alias description [detail]`
pub fn format_violation(path: &str, violation: &RuleViolation) -> String {
    let mut line = format!("{}:{}", path, violation.line_number);
    if let Some(range) = &violation.error_range {
        line.push_str(&format!(":{}", range.column));
    }
    line.push_str(&format!(
        " {} {}",
        violation.rule_alias(),
        violation.rule_description
    ));
    if let Some(detail) = &violation.error_detail {
        line.push_str(&format!(" [{}]", detail));
    }
    line
}

pub fn output_text(reports: &[FileReport]) {
    for report in reports {
        let path = report.path.display().to_string();
        for violation in &report.violations {
            println!("{}", format_violation(&path, violation));
        }
    }

    let total_issues: usize = reports.iter().map(|r| r.violations.len()).sum();
    eprintln!(
        "Checked {} files, found {} issues",
        reports.len(),
        total_issues
    );
}
