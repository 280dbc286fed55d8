//! File discovery for the `lint` and `fix` commands.

use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use thiserror::Error;
use tracing::info;
use walkdir::WalkDir;

use mdguard_core::settings::default_lint_workspace_globs;
use mdguard_core::workspace::posix_path;

#[derive(Debug, Error)]
pub enum FinderError {
    #[error("Invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },
}

pub struct FileFinder {
    exclude_globs: GlobSet,
}

impl FileFinder {
    /// Finder skipping the negated entries of the workspace lint globs,
    /// such as `node_modules` and `.git`.
    pub fn new() -> Result<Self, FinderError> {
        let excludes: Vec<String> = default_lint_workspace_globs()
            .iter()
            .filter_map(|g| g.strip_prefix('!'))
            .map(str::to_string)
            .collect();
        Ok(Self {
            exclude_globs: Self::build_globset(&excludes)?,
        })
    }

    fn build_globset(patterns: &[String]) -> Result<GlobSet, FinderError> {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            let glob = Glob::new(pattern).map_err(|source| FinderError::InvalidPattern {
                pattern: pattern.clone(),
                source,
            })?;
            builder.add(glob);
        }
        builder.build().map_err(|source| FinderError::InvalidPattern {
            pattern: patterns.join(", "),
            source,
        })
    }

    fn is_excluded(&self, relative: &str) -> bool {
        self.exclude_globs.is_match(relative)
    }

    /// Existing files are taken as given; anything else is a glob matched
    /// against paths relative to `base_dir`.
    pub fn discover_files(
        &self,
        patterns: &[String],
        base_dir: &Path,
    ) -> Result<Vec<PathBuf>, FinderError> {
        let mut files = Vec::new();
        let mut globs = Vec::new();

        for pattern in patterns {
            let path = base_dir.join(pattern);
            if path.is_file() {
                files.push(path);
            } else {
                globs.push(pattern.clone());
            }
        }

        if !globs.is_empty() {
            let glob_set = Self::build_globset(&globs)?;
            let walker = WalkDir::new(base_dir).into_iter().filter_entry(|entry| {
                let relative = entry.path().strip_prefix(base_dir).unwrap_or(entry.path());
                relative.as_os_str().is_empty() || !self.is_excluded(&posix_path(relative))
            });
            for entry in walker.filter_map(|e| e.ok()) {
                let path = entry.path();
                let relative = posix_path(path.strip_prefix(base_dir).unwrap_or(path));
                if entry.file_type().is_file() && glob_set.is_match(&relative) {
                    files.push(path.to_path_buf());
                }
            }
        }

        files.sort();
        files.dedup();

        info!("Discovered {} files to lint", files.len());
        Ok(files)
    }
}
