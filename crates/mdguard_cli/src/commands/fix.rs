//! Fix command implementation

use std::path::PathBuf;

use miette::{IntoDiagnostic, Result};
use tracing::error;

use mdguard_core::{FixFilter, apply_fixes};

use crate::cli::Cli;
use crate::commands::lint::lint_files;
use crate::finder::FileFinder;
use crate::linter::FileReport;
use crate::utils::create_tokio_runtime;

/// Summary of applied fixes.
pub struct FixSummary {
    pub total_fixes: usize,
    pub fixes_by_file: Vec<(PathBuf, usize)>,
    pub errors: Vec<(PathBuf, String)>,
    /// Violations without a fix.
    pub remaining: usize,
}

/// Applies every fix; returns true when violations remain.
pub fn run_fix(cli: &Cli, patterns: &[String], dry_run: bool) -> Result<bool> {
    let root = std::env::current_dir().into_diagnostic()?;
    let files = FileFinder::new()
        .and_then(|finder| finder.discover_files(patterns, &root))
        .into_diagnostic()?;

    let reports = create_tokio_runtime()?.block_on(lint_files(&root, cli.config.as_deref(), &files))?;
    let summary = apply_all(&reports, dry_run);
    output_fix_summary(&summary, dry_run);

    Ok(summary.remaining > 0 || !summary.errors.is_empty())
}

fn apply_all(reports: &[FileReport], dry_run: bool) -> FixSummary {
    let mut summary = FixSummary {
        total_fixes: 0,
        fixes_by_file: Vec::new(),
        errors: Vec::new(),
        remaining: 0,
    };

    for report in reports {
        summary.remaining += report
            .violations
            .iter()
            .filter(|v| v.fix_info.is_none())
            .count();

        let result = apply_fixes(&report.document.text, &report.violations, &FixFilter::All);
        if !result.modified {
            continue;
        }
        if !dry_run && let Err(e) = std::fs::write(&report.path, &result.fixed_content) {
            error!("Failed to fix {}: {}", report.path.display(), e);
            summary.errors.push((report.path.clone(), e.to_string()));
            continue;
        }
        summary.total_fixes += result.fixes_applied;
        summary
            .fixes_by_file
            .push((report.path.clone(), result.fixes_applied));
    }
    summary
}

/// Outputs the fix summary.
pub fn output_fix_summary(summary: &FixSummary, dry_run: bool) {
    if summary.total_fixes == 0 && summary.errors.is_empty() {
        println!("No fixable issues found.");
    }

    if summary.total_fixes > 0 {
        let action = if dry_run { "Would fix" } else { "Fixed" };
        println!(
            "{} {} issues in {} files:",
            action,
            summary.total_fixes,
            summary.fixes_by_file.len()
        );
        for (path, count) in &summary.fixes_by_file {
            println!("  {}: {} fixes", path.display(), count);
        }
    }

    if summary.remaining > 0 {
        println!("{} issues need manual attention.", summary.remaining);
    }

    if !summary.errors.is_empty() {
        eprintln!("Failed to fix {} file(s):", summary.errors.len());
        for (path, err) in &summary.errors {
            eprintln!("  {}: {}", path.display(), err);
        }
    }
}
