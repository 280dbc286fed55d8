//! Configuration resolution.
//!
//! Walks from a document's directory towards the workspace folder looking for
//! the first recognised config file. Each visited directory is cached,
//! including directories with no config, so a second lookup in the same tree
//! costs no file-layer calls until [`ConfigResolver::invalidate`].

use std::collections::{HashMap, HashSet};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tracing::debug;

use crate::CoreError;
use crate::config::{
    CONFIG_FILE_NAMES, ConfigEntry, ConfigOrigin, ConfigParser, EXTENDS_KEY, RuleConfig,
    default_config, default_parsers, merge, parse_config,
};
use crate::document::Document;
use crate::fs::{FileSystem, FileType};
use crate::output::OutputLog;
use crate::settings::{SettingScope, Settings};
use crate::workspace::WorkspaceFolder;

/// Memoized resolution results.
#[derive(Debug, Default)]
pub struct ConfigCache {
    /// Directory to its config, `None` when the directory has none.
    directories: HashMap<PathBuf, Option<Arc<ConfigEntry>>>,
    /// Document URI to the settings-backed config.
    documents: HashMap<String, Arc<ConfigEntry>>,
}

impl ConfigCache {
    pub fn directory(&self, dir: &Path) -> Option<Option<Arc<ConfigEntry>>> {
        self.directories.get(dir).cloned()
    }

    /// Stores a directory result, keeping an entry stored first by a
    /// concurrent lookup.
    pub fn insert_directory(
        &mut self,
        dir: PathBuf,
        entry: Option<Arc<ConfigEntry>>,
    ) -> Option<Arc<ConfigEntry>> {
        self.directories.entry(dir).or_insert(entry).clone()
    }

    pub fn document(&self, key: &str) -> Option<Arc<ConfigEntry>> {
        self.documents.get(key).cloned()
    }

    pub fn insert_document(&mut self, key: String, entry: Arc<ConfigEntry>) -> Arc<ConfigEntry> {
        self.documents.entry(key).or_insert(entry).clone()
    }

    pub fn invalidate(&mut self) {
        self.directories.clear();
        self.documents.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.directories.is_empty() && self.documents.is_empty()
    }
}

/// Resolves the effective rule configuration of documents.
pub struct ConfigResolver {
    cache: Mutex<ConfigCache>,
    parsers: Vec<Box<dyn ConfigParser>>,
    home_dir: Option<PathBuf>,
    output: Arc<OutputLog>,
}

impl std::fmt::Debug for ConfigResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigResolver")
            .field("cache", &self.cache)
            .field(
                "parsers",
                &self.parsers.iter().map(|p| p.name()).collect::<Vec<_>>(),
            )
            .field("home_dir", &self.home_dir)
            .finish()
    }
}

impl Default for ConfigResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigResolver {
    pub fn new() -> Self {
        Self {
            cache: Mutex::new(ConfigCache::default()),
            parsers: default_parsers(),
            home_dir: dirs::home_dir(),
            output: Arc::new(OutputLog::default()),
        }
    }

    /// Log that receives configuration errors.
    pub fn with_output(mut self, output: Arc<OutputLog>) -> Self {
        self.output = output;
        self
    }

    pub fn with_parsers(mut self, parsers: Vec<Box<dyn ConfigParser>>) -> Self {
        self.parsers = parsers;
        self
    }

    pub fn with_home_dir(mut self, home_dir: Option<PathBuf>) -> Self {
        self.home_dir = home_dir;
        self
    }

    /// Drops every cached result.
    pub fn invalidate(&self) {
        self.cache.lock().invalidate();
        debug!("Configuration cache cleared");
    }

    pub fn is_cache_empty(&self) -> bool {
        self.cache.lock().is_empty()
    }

    /// Resolves the configuration for `document`.
    ///
    /// Never fails: unreadable or invalid sources are logged and skipped.
    pub async fn resolve(
        &self,
        fs: &dyn FileSystem,
        document: &Document,
        folder: Option<&WorkspaceFolder>,
        settings: &Settings,
    ) -> Arc<ConfigEntry> {
        if fs.is_available()
            && let Some(path) = document.fs_path()
            && let Some(start) = path.parent()
            && let Some(entry) = self.resolve_directories(fs, start, folder).await
        {
            return entry;
        }

        let key = document.uri.to_string();
        if let Some(entry) = self.cache.lock().document(&key) {
            return entry;
        }
        let entry = self.settings_entry(fs, folder, settings).await;
        self.cache.lock().insert_document(key, entry)
    }

    async fn resolve_directories(
        &self,
        fs: &dyn FileSystem,
        start: &Path,
        folder: Option<&WorkspaceFolder>,
    ) -> Option<Arc<ConfigEntry>> {
        let boundary = folder.and_then(WorkspaceFolder::fs_path);
        let mut dir = start.to_path_buf();
        loop {
            let cached = self.cache.lock().directory(&dir);
            let entry = match cached {
                Some(entry) => entry,
                None => {
                    let probed = self.probe_directory(fs, &dir).await;
                    self.cache.lock().insert_directory(dir.clone(), probed)
                }
            };
            if entry.is_some() {
                return entry;
            }

            if boundary.as_deref() == Some(dir.as_path()) {
                return None;
            }
            let parent = dir.parent()?.to_path_buf();
            if parent == dir {
                return None;
            }
            if let Some(boundary) = &boundary
                && !parent.starts_with(boundary)
            {
                return None;
            }
            dir = parent;
        }
    }

    /// Looks for the first recognised config file in `dir`.
    async fn probe_directory(&self, fs: &dyn FileSystem, dir: &Path) -> Option<Arc<ConfigEntry>> {
        let entries = match fs.read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) => {
                if !e.is_not_found() {
                    debug!("Unable to list '{}': {}", dir.display(), e);
                }
                return None;
            }
        };

        for name in CONFIG_FILE_NAMES {
            let Some(entry) = entries.iter().find(|e| e.name == *name) else {
                continue;
            };
            let path = dir.join(name);
            let is_file = match entry.file_type {
                FileType::File => true,
                FileType::SymbolicLink => matches!(fs.stat(&path).await, Ok(FileType::File)),
                FileType::Directory | FileType::Other => false,
            };
            if !is_file {
                continue;
            }

            match self.load_file(fs, &path).await {
                Ok(config) => {
                    debug!("Using configuration '{}'", path.display());
                    return Some(ConfigEntry::new(
                        merge(default_config(), config),
                        Some(ConfigOrigin::File(path)),
                    ));
                }
                Err(e) => {
                    self.output
                        .error(&format!("Ignoring configuration '{}': {}", path.display(), e));
                }
            }
        }
        None
    }

    /// Loads a config file and its `extends` chain.
    ///
    /// Relative `extends` targets resolve against the extending file's
    /// directory.
    pub async fn load_file(
        &self,
        fs: &dyn FileSystem,
        path: &Path,
    ) -> Result<RuleConfig, CoreError> {
        let content = fs.read_file(path).await?;
        let config = parse_config(path, &content, &self.parsers)?;
        let base = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let mut visited = HashSet::new();
        visited.insert(normalize(path));
        let expander = PathExpander {
            home_dir: self.home_dir.clone(),
            workspace_folder: None,
        };
        Ok(self.expand_extends(fs, config, base, &expander, visited).await)
    }

    /// Loads an explicitly named config file on top of the default.
    pub async fn load_explicit(
        &self,
        fs: &dyn FileSystem,
        path: &Path,
    ) -> Result<Arc<ConfigEntry>, CoreError> {
        let config = self.load_file(fs, path).await?;
        Ok(ConfigEntry::new(
            merge(default_config(), config),
            Some(ConfigOrigin::File(path.to_path_buf())),
        ))
    }

    /// Builds the entry backed by the `config` setting.
    async fn settings_entry(
        &self,
        fs: &dyn FileSystem,
        folder: Option<&WorkspaceFolder>,
        settings: &Settings,
    ) -> Arc<ConfigEntry> {
        let Some(scoped) = &settings.config else {
            return ConfigEntry::fallback();
        };
        let origin = match scoped.scope {
            SettingScope::Workspace | SettingScope::Folder => ConfigOrigin::WorkspaceSetting,
            SettingScope::User | SettingScope::Default => ConfigOrigin::UserSetting,
        };

        let folder_path = folder.and_then(WorkspaceFolder::fs_path);
        let use_home = matches!(scoped.scope, SettingScope::User | SettingScope::Default)
            || !folder.is_some_and(WorkspaceFolder::is_file_scheme);
        let base = if use_home {
            self.home_dir.clone().or_else(|| folder_path.clone())
        } else {
            folder_path.clone().or_else(|| self.home_dir.clone())
        }
        .unwrap_or_default();

        let expander = PathExpander {
            home_dir: self.home_dir.clone(),
            workspace_folder: folder_path,
        };
        let config = self
            .expand_extends(fs, scoped.value.clone(), base, &expander, HashSet::new())
            .await;
        ConfigEntry::new(merge(default_config(), config), Some(origin))
    }

    /// Follows `extends` links and merges the chain, bases first.
    ///
    /// A target that cannot be read or parsed ends the chain; everything
    /// loaded so far is kept.
    async fn expand_extends(
        &self,
        fs: &dyn FileSystem,
        config: RuleConfig,
        base: PathBuf,
        expander: &PathExpander,
        mut visited: HashSet<PathBuf>,
    ) -> RuleConfig {
        let mut layers = vec![config];
        let mut base = base;
        while let Some(Value::String(target)) = layers.last().and_then(|c| c.get(EXTENDS_KEY)) {
            let path = normalize(&base.join(expander.expand(target)));
            if !visited.insert(path.clone()) {
                self.output
                    .error(&format!("Ignoring circular extends of '{}'", path.display()));
                break;
            }
            let loaded = match fs.read_file(&path).await {
                Ok(content) => parse_config(&path, &content, &self.parsers),
                Err(e) => Err(e),
            };
            match loaded {
                Ok(config) => {
                    base = path.parent().map(Path::to_path_buf).unwrap_or_default();
                    layers.push(config);
                }
                Err(e) => {
                    self.output
                        .error(&format!("Ignoring extends '{}': {}", path.display(), e));
                    break;
                }
            }
        }

        let mut merged = layers.into_iter().rev().fold(RuleConfig::new(), merge);
        merged.remove(EXTENDS_KEY);
        merged
    }
}

/// Expands `~`, `${userHome}` and `${workspaceFolder}` in `extends` values.
#[derive(Debug, Clone)]
struct PathExpander {
    home_dir: Option<PathBuf>,
    workspace_folder: Option<PathBuf>,
}

impl PathExpander {
    fn expand(&self, value: &str) -> PathBuf {
        let mut expanded = value.to_string();
        if let Some(home) = &self.home_dir {
            let home = home.to_string_lossy();
            if expanded == "~" {
                expanded = home.to_string();
            } else if let Some(rest) = expanded.strip_prefix("~/") {
                expanded = format!("{}/{}", home, rest);
            }
            expanded = expanded.replace("${userHome}", &home);
        }
        if let Some(folder) = &self.workspace_folder {
            expanded = expanded.replace("${workspaceFolder}", &folder.to_string_lossy());
        }
        PathBuf::from(expanded)
    }
}

/// Lexically resolves `.` and `..` components.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
