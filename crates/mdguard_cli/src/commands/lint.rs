//! Lint command implementation

use std::path::{Path, PathBuf};

use miette::{IntoDiagnostic, Result};
use tracing::error;

use crate::cli::{Cli, OutputFormat};
use crate::finder::FileFinder;
use crate::linter::{FileReport, WorkspaceLinter};
use crate::output::output_results;
use crate::utils::create_tokio_runtime;

pub fn run_lint(cli: &Cli, patterns: &[String], format: OutputFormat) -> Result<bool> {
    let root = std::env::current_dir().into_diagnostic()?;
    let files = FileFinder::new()
        .and_then(|finder| finder.discover_files(patterns, &root))
        .into_diagnostic()?;

    let reports = create_tokio_runtime()?.block_on(lint_files(&root, cli.config.as_deref(), &files))?;
    output_results(&reports, format)
}

/// Lints `files`; files that cannot be read are reported and skipped.
pub async fn lint_files(
    root: &Path,
    config: Option<&Path>,
    files: &[PathBuf],
) -> Result<Vec<FileReport>> {
    let linter = WorkspaceLinter::new(root, config).await?;
    let mut reports = Vec::with_capacity(files.len());
    for path in files {
        match linter.lint_file(path).await {
            Ok(report) => reports.push(report),
            Err(e) => error!("Failed to lint {}: {}", path.display(), e),
        }
    }
    Ok(reports)
}
