//! Configuration management for LSP server.

use serde_json::Value;
use tower_lsp::lsp_types::Url;

use mdguard_core::SettingsStore;
use mdguard_core::config::CONFIG_FILE_NAMES;
use mdguard_core::ignore::IgnoreSetting;

/// Settings section clients nest their payload under.
pub const SETTINGS_SECTION: &str = "mdguard";

pub const COMMAND_FIX_LINE: &str = "mdguard.fixLine";
pub const COMMAND_FIX_ALL: &str = "mdguard.fixAll";
pub const COMMAND_TOGGLE_LINTING: &str = "mdguard.toggleLinting";
pub const COMMAND_OPEN_INFORMATION: &str = "mdguard.openRuleInformation";

pub const COMMANDS: &[&str] = &[
    COMMAND_FIX_LINE,
    COMMAND_FIX_ALL,
    COMMAND_TOGGLE_LINTING,
    COMMAND_OPEN_INFORMATION,
];

/// Documentation of the configuration file format.
pub const CONFIGURATION_DOCS: &str =
    "https://github.com/DavidAnson/markdownlint/blob/main/README.md#configuration";

/// Builds the settings store from a client payload, accepting both
/// `{ "mdguard": { ... } }` and the bare settings object.
pub fn settings_from_payload(payload: Option<&Value>) -> SettingsStore {
    match payload {
        Some(value) => {
            let settings = value.get(SETTINGS_SECTION).unwrap_or(value);
            SettingsStore::from_value(settings)
        }
        None => SettingsStore::new(),
    }
}

/// Whether a watched-file event should invalidate cached state.
pub fn affects_lint_state(uri: &Url, ignore: &IgnoreSetting) -> bool {
    let Some(name) = uri.path_segments().and_then(|mut s| s.next_back()) else {
        return false;
    };
    if CONFIG_FILE_NAMES.contains(&name) {
        return true;
    }
    match ignore {
        IgnoreSetting::File(file) => uri.path().ends_with(file.trim_start_matches("./")),
        IgnoreSetting::Globs(_) => false,
    }
}
