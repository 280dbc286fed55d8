//! Ignore patterns.
//!
//! The `ignore` setting is either a list of globs or the name of an
//! ignore file. Globs match hidden files, `*` never crosses `/`, and `#` or
//! `!` are plain characters. Ignore files use gitignore syntax and are read
//! asynchronously; their predicate joins the set once the read completes.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use globset::{GlobBuilder, GlobMatcher};
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use crate::CoreError;
use crate::fs::FileSystem;

/// Value of the `ignore` setting.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IgnoreSetting {
    Globs(Vec<String>),
    /// Workspace-relative path of an ignore file.
    File(String),
}

impl Default for IgnoreSetting {
    fn default() -> Self {
        IgnoreSetting::Globs(Vec::new())
    }
}

/// One compiled ignore rule.
#[derive(Debug, Clone)]
pub enum IgnorePredicate {
    Glob(GlobMatcher),
    File(Gitignore),
}

impl IgnorePredicate {
    /// Tests a workspace-relative, forward-slash path.
    pub fn is_match(&self, path: &str) -> bool {
        match self {
            IgnorePredicate::Glob(glob) => glob.is_match(path),
            IgnorePredicate::File(gitignore) => {
                let path = Path::new(path);
                if path.has_root() {
                    gitignore.matched(path, false).is_ignore()
                } else {
                    gitignore
                        .matched_path_or_any_parents(path, false)
                        .is_ignore()
                }
            }
        }
    }
}

/// Ordered predicates; a path is ignored when any of them matches.
#[derive(Debug, Clone, Default)]
pub struct IgnoreSet {
    predicates: Vec<IgnorePredicate>,
}

impl IgnoreSet {
    pub fn is_ignored(&self, relative_path: &str) -> bool {
        self.predicates.iter().any(|p| p.is_match(relative_path))
    }

    pub fn push(&mut self, predicate: IgnorePredicate) {
        self.predicates.push(predicate);
    }

    pub fn len(&self) -> usize {
        self.predicates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }
}

/// Compiles ignore settings into predicates.
pub struct IgnoreMatcher;

impl IgnoreMatcher {
    /// Compiles `setting`, adding the ignore file predicate when its
    /// contents are already known.
    pub fn compile(setting: &IgnoreSetting, ignore_file_contents: Option<&str>) -> IgnoreSet {
        let mut set = IgnoreSet::default();
        match setting {
            IgnoreSetting::Globs(globs) => {
                for glob in globs {
                    if let Some(predicate) = Self::compile_glob(glob) {
                        set.push(predicate);
                    }
                }
            }
            IgnoreSetting::File(_) => {
                if let Some(contents) = ignore_file_contents {
                    set.push(Self::compile_ignore_file(contents));
                }
            }
        }
        set
    }

    /// Compiles one glob; invalid globs are logged and skipped.
    pub fn compile_glob(pattern: &str) -> Option<IgnorePredicate> {
        match GlobBuilder::new(pattern)
            .literal_separator(true)
            .backslash_escape(true)
            .build()
        {
            Ok(glob) => Some(IgnorePredicate::Glob(glob.compile_matcher())),
            Err(e) => {
                warn!("Invalid ignore glob '{}': {}", pattern, e);
                None
            }
        }
    }

    /// Compiles ignore-file contents into a single predicate.
    pub fn compile_ignore_file(contents: &str) -> IgnorePredicate {
        let mut builder = GitignoreBuilder::new("");
        for line in contents.lines() {
            if let Err(e) = builder.add_line(None, line) {
                warn!("Invalid ignore file line '{}': {}", line, e);
            }
        }
        let gitignore = builder.build().unwrap_or_else(|e| {
            warn!("Failed to build ignore file matcher: {}", e);
            Gitignore::empty()
        });
        IgnorePredicate::File(gitignore)
    }

    /// Reads and compiles an ignore file.
    ///
    /// A missing file is `Ok(None)`; other read failures are errors for the
    /// caller to log. Either way the file contributes no predicate.
    pub async fn load_ignore_file(
        fs: &dyn FileSystem,
        path: &Path,
    ) -> Result<Option<IgnorePredicate>, CoreError> {
        match fs.read_file(path).await {
            Ok(contents) => Ok(Some(Self::compile_ignore_file(&contents))),
            Err(e) if e.is_not_found() => {
                debug!("Ignore file '{}' not found", path.display());
                Ok(None)
            }
            Err(e) => Err(CoreError::ignore(format!(
                "Unable to read ignore file '{}': {}",
                path.display(),
                e
            ))),
        }
    }
}

/// Identifies one memoized ignore set: the workspace folder it applies to
/// and the setting it was compiled from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IgnoreKey {
    pub folder: Option<Url>,
    pub setting: IgnoreSetting,
}

/// Memoized ignore sets, one per [`IgnoreKey`].
///
/// Each invalidation starts a new epoch; a late ignore-file predicate from an
/// older epoch is dropped.
#[derive(Debug, Default)]
pub struct IgnoreCache {
    inner: Mutex<IgnoreCacheState>,
}

#[derive(Debug, Default)]
struct IgnoreCacheState {
    sets: HashMap<IgnoreKey, IgnoreEntry>,
    epoch: u64,
}

#[derive(Debug)]
struct IgnoreEntry {
    set: Arc<IgnoreSet>,
    file_read: bool,
}

impl IgnoreCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the memoized set of `key`, compiling it with `compile` on a
    /// miss, together with the current epoch.
    pub fn get_or_compile(
        &self,
        key: &IgnoreKey,
        compile: impl FnOnce() -> IgnoreSet,
    ) -> (Arc<IgnoreSet>, u64) {
        let mut state = self.inner.lock();
        let epoch = state.epoch;
        let entry = state.sets.entry(key.clone()).or_insert_with(|| IgnoreEntry {
            set: Arc::new(compile()),
            file_read: false,
        });
        (Arc::clone(&entry.set), epoch)
    }

    /// Claims the ignore-file read of `key` for `epoch`.
    ///
    /// True for exactly one caller per key and epoch.
    pub fn begin_file_read(&self, key: &IgnoreKey, epoch: u64) -> bool {
        let mut state = self.inner.lock();
        if state.epoch != epoch {
            return false;
        }
        match state.sets.get_mut(key) {
            Some(entry) if !entry.file_read => {
                entry.file_read = true;
                true
            }
            _ => false,
        }
    }

    /// Appends a predicate to the memoized set of `key`.
    ///
    /// Returns false when the cache was invalidated in the meantime.
    pub fn append(&self, key: &IgnoreKey, epoch: u64, predicate: IgnorePredicate) -> bool {
        let mut state = self.inner.lock();
        if state.epoch != epoch {
            return false;
        }
        let Some(entry) = state.sets.get_mut(key) else {
            return false;
        };
        let mut set = (*entry.set).clone();
        set.push(predicate);
        entry.set = Arc::new(set);
        true
    }

    pub fn invalidate(&self) {
        let mut state = self.inner.lock();
        state.sets.clear();
        state.epoch += 1;
    }
}
