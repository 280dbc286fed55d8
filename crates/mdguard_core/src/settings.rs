//! Scoped settings.
//!
//! Settings arrive as JSON objects per scope (user, workspace, workspace
//! folder). Lookups report which scope supplied the active value so the
//! custom rule gate can decide whether to prompt and the resolver can pick
//! the base directory for `extends`.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tracing::warn;
use url::Url;

use crate::config::RuleConfig;
use crate::ignore::IgnoreSetting;

pub const SECTION_CONFIG: &str = "config";
pub const SECTION_CUSTOM_RULES: &str = "customRules";
pub const SECTION_FOCUS_MODE: &str = "focusMode";
pub const SECTION_IGNORE: &str = "ignore";
pub const SECTION_LANGUAGES: &str = "languages";
pub const SECTION_LINT_WORKSPACE_GLOBS: &str = "lintWorkspaceGlobs";
pub const SECTION_RUN: &str = "run";

/// Where a setting value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingScope {
    Default,
    User,
    Workspace,
    Folder,
}

impl SettingScope {
    /// Whether values from this scope are shared with the workspace and
    /// must be confirmed before code is loaded from them.
    pub fn requires_trust(self) -> bool {
        matches!(self, SettingScope::Workspace | SettingScope::Folder)
    }
}

/// A value together with the scope that supplied it.
#[derive(Debug, Clone, PartialEq)]
pub struct Scoped<T> {
    pub value: T,
    pub scope: SettingScope,
}

impl<T> Scoped<T> {
    pub fn new(value: T, scope: SettingScope) -> Self {
        Self { value, scope }
    }
}

/// When a document is linted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RunMode {
    #[default]
    OnType,
    OnSave,
}

/// Cursor-window suppression of diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FocusMode {
    #[default]
    Disabled,
    /// Suppress diagnostics within this many lines of the cursor.
    Window(u32),
}

impl FocusMode {
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Bool(false) | Value::Null => FocusMode::Disabled,
            Value::Number(n) => n
                .as_u64()
                .and_then(|n| u32::try_from(n).ok())
                .map_or(FocusMode::Window(0), FocusMode::Window),
            _ => FocusMode::Window(0),
        }
    }

    pub fn is_enabled(self) -> bool {
        !matches!(self, FocusMode::Disabled)
    }
}

impl<'de> Deserialize<'de> for FocusMode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(FocusMode::from_value(&value))
    }
}

/// Effective settings for one resource.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub config: Option<Scoped<RuleConfig>>,
    pub custom_rules: Scoped<Vec<String>>,
    pub focus_mode: FocusMode,
    pub run: RunMode,
    pub ignore: IgnoreSetting,
    pub languages: Vec<String>,
    pub lint_workspace_globs: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            config: None,
            custom_rules: Scoped::new(Vec::new(), SettingScope::Default),
            focus_mode: FocusMode::Disabled,
            run: RunMode::OnType,
            ignore: IgnoreSetting::default(),
            languages: default_languages(),
            lint_workspace_globs: default_lint_workspace_globs(),
        }
    }
}

pub fn default_languages() -> Vec<String> {
    vec!["markdown".to_string()]
}

pub fn default_lint_workspace_globs() -> Vec<String> {
    [
        "**/*.{md,mkd,mdwn,mdown,markdown,markdn,mdtxt,mdtext,workbook}",
        "!**/*.code-search",
        "!**/bower_components",
        "!**/node_modules",
        "!**/.git",
        "!**/vendor",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Scope-aware settings lookup.
pub trait SettingsProvider: Send + Sync {
    /// Returns the active value of `section` for `resource` and its scope.
    fn get(&self, section: &str, resource: Option<&Url>) -> Option<Scoped<Value>>;

    /// Builds the typed settings for `resource`.
    ///
    /// Values of the wrong shape are logged and replaced by defaults.
    fn settings(&self, resource: Option<&Url>) -> Settings {
        let mut settings = Settings::default();

        if let Some(scoped) = self.get(SECTION_CONFIG, resource) {
            match serde_json::from_value::<RuleConfig>(scoped.value) {
                Ok(config) => settings.config = Some(Scoped::new(config, scoped.scope)),
                Err(e) => warn!("Ignoring invalid '{}' setting: {}", SECTION_CONFIG, e),
            }
        }
        if let Some(scoped) = self.get(SECTION_CUSTOM_RULES, resource) {
            match serde_json::from_value::<Vec<String>>(scoped.value) {
                Ok(rules) => settings.custom_rules = Scoped::new(rules, scoped.scope),
                Err(e) => warn!("Ignoring invalid '{}' setting: {}", SECTION_CUSTOM_RULES, e),
            }
        }
        if let Some(scoped) = self.get(SECTION_FOCUS_MODE, resource) {
            settings.focus_mode = FocusMode::from_value(&scoped.value);
        }
        if let Some(scoped) = self.get(SECTION_RUN, resource) {
            match serde_json::from_value::<RunMode>(scoped.value) {
                Ok(run) => settings.run = run,
                Err(e) => warn!("Ignoring invalid '{}' setting: {}", SECTION_RUN, e),
            }
        }
        if let Some(scoped) = self.get(SECTION_IGNORE, resource) {
            match serde_json::from_value::<IgnoreSetting>(scoped.value) {
                Ok(ignore) => settings.ignore = ignore,
                Err(e) => warn!("Ignoring invalid '{}' setting: {}", SECTION_IGNORE, e),
            }
        }
        if let Some(scoped) = self.get(SECTION_LANGUAGES, resource) {
            match serde_json::from_value::<Vec<String>>(scoped.value) {
                Ok(languages) => settings.languages = languages,
                Err(e) => warn!("Ignoring invalid '{}' setting: {}", SECTION_LANGUAGES, e),
            }
        }
        if let Some(scoped) = self.get(SECTION_LINT_WORKSPACE_GLOBS, resource) {
            match serde_json::from_value::<Vec<String>>(scoped.value) {
                Ok(globs) => settings.lint_workspace_globs = globs,
                Err(e) => warn!(
                    "Ignoring invalid '{}' setting: {}",
                    SECTION_LINT_WORKSPACE_GLOBS, e
                ),
            }
        }
        settings
    }
}

/// In-memory settings layered by scope.
///
/// Folder layers win over the workspace layer, which wins over the user
/// layer.
#[derive(Debug, Clone, Default)]
pub struct SettingsStore {
    user: Map<String, Value>,
    workspace: Map<String, Value>,
    folders: Vec<(Url, Map<String, Value>)>,
}

impl SettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a settings payload.
    ///
    /// A payload with any of the `user`, `workspace` or `folders` keys is
    /// read as explicit layers; any other object is taken as user settings.
    pub fn from_value(value: &Value) -> Self {
        let Some(object) = value.as_object() else {
            return Self::default();
        };
        let layered = ["user", "workspace", "folders"]
            .iter()
            .any(|k| object.contains_key(*k));
        if !layered {
            return Self {
                user: object.clone(),
                ..Self::default()
            };
        }

        let layer = |key: &str| {
            object
                .get(key)
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default()
        };
        let folders = object
            .get("folders")
            .and_then(Value::as_object)
            .map(|folders| {
                folders
                    .iter()
                    .filter_map(|(uri, layer)| {
                        let uri = Url::parse(uri).ok()?;
                        Some((uri, layer.as_object()?.clone()))
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            user: layer("user"),
            workspace: layer("workspace"),
            folders,
        }
    }

    pub fn set(&mut self, scope: SettingScope, section: &str, value: Value) {
        match scope {
            SettingScope::User => {
                self.user.insert(section.to_string(), value);
            }
            SettingScope::Workspace => {
                self.workspace.insert(section.to_string(), value);
            }
            SettingScope::Folder | SettingScope::Default => {
                warn!("Cannot set '{}' in scope {:?} without a folder", section, scope);
            }
        }
    }

    pub fn set_folder(&mut self, folder: Url, section: &str, value: Value) {
        if let Some((_, layer)) = self.folders.iter_mut().find(|(uri, _)| *uri == folder) {
            layer.insert(section.to_string(), value);
        } else {
            let mut layer = Map::new();
            layer.insert(section.to_string(), value);
            self.folders.push((folder, layer));
        }
    }

    fn folder_layer(&self, resource: &Url) -> Option<&Map<String, Value>> {
        self.folders
            .iter()
            .filter(|(folder, _)| {
                let prefix = folder.as_str().trim_end_matches('/');
                resource
                    .as_str()
                    .strip_prefix(prefix)
                    .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
            })
            .max_by_key(|(folder, _)| folder.as_str().len())
            .map(|(_, layer)| layer)
    }
}

impl SettingsProvider for SettingsStore {
    fn get(&self, section: &str, resource: Option<&Url>) -> Option<Scoped<Value>> {
        if let Some(value) = resource
            .and_then(|r| self.folder_layer(r))
            .and_then(|layer| layer.get(section))
        {
            return Some(Scoped::new(value.clone(), SettingScope::Folder));
        }
        if let Some(value) = self.workspace.get(section) {
            return Some(Scoped::new(value.clone(), SettingScope::Workspace));
        }
        self.user
            .get(section)
            .map(|value| Scoped::new(value.clone(), SettingScope::User))
    }
}
