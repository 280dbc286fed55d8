//! Trust-gated custom rule loading.
//!
//! Custom rules named by shared (workspace or folder) settings run only after
//! the user allows them. The gate keeps one authoritative [`GateState`] per
//! folder and location list; concurrent requests share a single prompt
//! through an async lock and read the outcome it left behind.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::CoreError;
use crate::config::{ConfigParser, JsoncParser};
use crate::fs::FileSystem;
use crate::output::OutputLog;
use crate::settings::Scoped;

/// A validated custom rule.
///
/// `function` is the rule's check, a regular expression matched against
/// each line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomRule {
    pub names: Vec<String>,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub information: Option<String>,
    pub tags: Vec<String>,
    pub function: String,
}

impl CustomRule {
    /// Validates one candidate exported by a rule module.
    pub fn from_value(value: &Value) -> Result<Self, String> {
        let object = value.as_object().ok_or("not an object")?;
        let names = string_array(object.get("names")).ok_or("'names' must be a string array")?;
        if names.is_empty() {
            return Err("'names' must not be empty".to_string());
        }
        let description = object
            .get("description")
            .and_then(Value::as_str)
            .ok_or("'description' must be a string")?;
        let tags = string_array(object.get("tags")).ok_or("'tags' must be a string array")?;
        let function = object
            .get("function")
            .and_then(Value::as_str)
            .filter(|f| !f.is_empty())
            .ok_or("'function' must be a non-empty string")?;
        let information = object
            .get("information")
            .and_then(Value::as_str)
            .map(str::to_string);

        Ok(Self {
            names,
            description: description.to_string(),
            information,
            tags,
            function: function.to_string(),
        })
    }
}

fn string_array(value: Option<&Value>) -> Option<Vec<String>> {
    value?
        .as_array()?
        .iter()
        .map(|v| v.as_str().map(str::to_string))
        .collect()
}

/// Answer to the trust prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustChoice {
    AllowOnce,
    AlwaysAllow,
    Block,
}

#[async_trait]
pub trait TrustPrompter: Send + Sync {
    /// Asks whether the listed rule locations may run. `None` means the
    /// prompt was dismissed.
    async fn prompt(&self, locations: &[String]) -> Option<TrustChoice>;
}

/// Durable allow-list of workspaces.
pub trait TrustStore: Send + Sync {
    fn is_trusted(&self, workspace: &str) -> bool;

    fn trust(&self, workspace: &str) -> Result<(), CoreError>;
}

/// Allow-list kept in a JSON file under the user's config directory.
#[derive(Debug, Clone)]
pub struct FileTrustStore {
    path: PathBuf,
}

impl FileTrustStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// `<config dir>/mdguard/trusted-workspaces.json`.
    pub fn default_location() -> Option<Self> {
        dirs::config_dir().map(|dir| Self::new(dir.join("mdguard").join("trusted-workspaces.json")))
    }

    fn read(&self) -> Vec<String> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                warn!("Ignoring invalid trust store '{}': {}", self.path.display(), e);
                Vec::new()
            }),
            Err(_) => Vec::new(),
        }
    }
}

impl TrustStore for FileTrustStore {
    fn is_trusted(&self, workspace: &str) -> bool {
        self.read().iter().any(|w| w == workspace)
    }

    fn trust(&self, workspace: &str) -> Result<(), CoreError> {
        let mut workspaces = self.read();
        if workspaces.iter().any(|w| w == workspace) {
            return Ok(());
        }
        workspaces.push(workspace.to_string());
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&workspaces)
            .map_err(|e| CoreError::config(e.to_string()))?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}

/// Allow-list that lives as long as the process.
#[derive(Debug, Default)]
pub struct MemoryTrustStore {
    workspaces: Mutex<Vec<String>>,
}

impl TrustStore for MemoryTrustStore {
    fn is_trusted(&self, workspace: &str) -> bool {
        self.workspaces.lock().iter().any(|w| w == workspace)
    }

    fn trust(&self, workspace: &str) -> Result<(), CoreError> {
        let mut workspaces = self.workspaces.lock();
        if !workspaces.iter().any(|w| w == workspace) {
            workspaces.push(workspace.to_string());
        }
        Ok(())
    }
}

/// Install directories of other host components, for `{id}/path` locations.
pub trait ExtensionDirectory: Send + Sync {
    fn extension_path(&self, id: &str) -> Option<PathBuf>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoExtensions;

impl ExtensionDirectory for NoExtensions {
    fn extension_path(&self, _id: &str) -> Option<PathBuf> {
        None
    }
}

/// Loads the export of one rule module.
#[async_trait]
pub trait RuleModuleLoader: Send + Sync {
    /// Returns a single rule object or an array of them.
    async fn load(&self, path: &Path) -> Result<Value, CoreError>;
}

/// Loads rule modules written as JSON or JSONC.
pub struct JsonRuleLoader {
    fs: Arc<dyn FileSystem>,
}

impl JsonRuleLoader {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self { fs }
    }
}

#[async_trait]
impl RuleModuleLoader for JsonRuleLoader {
    async fn load(&self, path: &Path) -> Result<Value, CoreError> {
        let content = self.fs.read_file(path).await.map_err(|e| {
            CoreError::custom_rule(format!("Unable to read '{}': {}", path.display(), e))
        })?;
        JsoncParser.parse(&content).map_err(|e| {
            CoreError::custom_rule(format!("Unable to parse '{}': {}", path.display(), e))
        })
    }
}

/// State of the gate for one set of rule locations.
#[derive(Debug, Clone)]
pub enum GateState {
    Unloaded,
    Prompting,
    Loaded(Arc<[CustomRule]>),
    Blocked,
}

/// Where custom rules are requested from.
#[derive(Debug, Clone, Copy)]
pub struct RuleRequest<'a> {
    pub locations: &'a Scoped<Vec<String>>,
    /// Identity of the workspace, for the allow-list.
    pub workspace: Option<&'a str>,
    /// Directory that plain relative locations resolve against.
    pub base_dir: Option<&'a Path>,
}

/// Requests with equal keys share one state.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct GateKey {
    base_dir: Option<PathBuf>,
    locations: Vec<String>,
    requires_trust: bool,
}

impl GateKey {
    fn of(request: &RuleRequest<'_>) -> Self {
        Self {
            base_dir: request.base_dir.map(Path::to_path_buf),
            locations: request.locations.value.clone(),
            requires_trust: request.locations.scope.requires_trust(),
        }
    }
}

#[derive(Debug, Default)]
struct GateInner {
    states: HashMap<GateKey, GateState>,
    epoch: u64,
}

pub struct CustomRuleGate {
    inner: Mutex<GateInner>,
    prompt_lock: tokio::sync::Mutex<()>,
    prompter: Arc<dyn TrustPrompter>,
    store: Arc<dyn TrustStore>,
    extensions: Arc<dyn ExtensionDirectory>,
    loader: Arc<dyn RuleModuleLoader>,
    output: Arc<OutputLog>,
}

impl std::fmt::Debug for CustomRuleGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CustomRuleGate")
            .field("inner", &*self.inner.lock())
            .finish_non_exhaustive()
    }
}

impl CustomRuleGate {
    pub fn new(
        prompter: Arc<dyn TrustPrompter>,
        store: Arc<dyn TrustStore>,
        extensions: Arc<dyn ExtensionDirectory>,
        loader: Arc<dyn RuleModuleLoader>,
    ) -> Self {
        Self {
            inner: Mutex::new(GateInner::default()),
            prompt_lock: tokio::sync::Mutex::new(()),
            prompter,
            store,
            extensions,
            loader,
            output: Arc::new(OutputLog::default()),
        }
    }

    /// Log that receives rule loading errors.
    pub fn with_output(mut self, output: Arc<OutputLog>) -> Self {
        self.output = output;
        self
    }

    /// State of the locations named by `request`.
    pub fn state(&self, request: &RuleRequest<'_>) -> GateState {
        self.inner
            .lock()
            .states
            .get(&GateKey::of(request))
            .cloned()
            .unwrap_or(GateState::Unloaded)
    }

    /// Every state back to `Unloaded`; called when settings change.
    pub fn invalidate(&self) {
        let mut inner = self.inner.lock();
        inner.states.clear();
        inner.epoch += 1;
    }

    /// Returns the custom rules for `request`, prompting once if needed.
    pub async fn rules(&self, request: RuleRequest<'_>) -> Arc<[CustomRule]> {
        let key = GateKey::of(&request);
        if let Some(rules) = self.settled(&key) {
            return rules;
        }

        let epoch = self.inner.lock().epoch;
        if request.locations.value.is_empty() {
            return self.settle(&key, epoch, GateState::Loaded(Arc::from(Vec::new())));
        }

        let needs_prompt = key.requires_trust
            && !request.workspace.is_some_and(|w| self.store.is_trusted(w));
        if !needs_prompt {
            let rules = self.load_all(&request).await;
            return self.settle(&key, epoch, GateState::Loaded(rules));
        }

        let _prompt = self.prompt_lock.lock().await;
        if let Some(rules) = self.settled(&key) {
            return rules;
        }
        let epoch = {
            let mut inner = self.inner.lock();
            inner.states.insert(key.clone(), GateState::Prompting);
            inner.epoch
        };

        let choice = self
            .prompter
            .prompt(&request.locations.value)
            .await
            .unwrap_or(TrustChoice::Block);
        info!("Custom rules trust choice: {:?}", choice);

        match choice {
            TrustChoice::Block => self.settle(&key, epoch, GateState::Blocked),
            TrustChoice::AllowOnce | TrustChoice::AlwaysAllow => {
                if choice == TrustChoice::AlwaysAllow
                    && let Some(workspace) = request.workspace
                    && let Err(e) = self.store.trust(workspace)
                {
                    self.output.error(&format!(
                        "Unable to remember trusted workspace '{}': {}",
                        workspace, e
                    ));
                }
                let rules = self.load_all(&request).await;
                self.settle(&key, epoch, GateState::Loaded(rules))
            }
        }
    }

    fn settled(&self, key: &GateKey) -> Option<Arc<[CustomRule]>> {
        match self.inner.lock().states.get(key)? {
            GateState::Loaded(rules) => Some(Arc::clone(rules)),
            GateState::Blocked => Some(Arc::from(Vec::new())),
            GateState::Unloaded | GateState::Prompting => None,
        }
    }

    /// Stores `state` for `key` unless the gate was invalidated since
    /// `epoch`, and returns the rules it carries.
    fn settle(&self, key: &GateKey, epoch: u64, state: GateState) -> Arc<[CustomRule]> {
        let rules = match &state {
            GateState::Loaded(rules) => Arc::clone(rules),
            _ => Arc::from(Vec::new()),
        };
        let mut inner = self.inner.lock();
        if inner.epoch == epoch {
            inner.states.insert(key.clone(), state);
        }
        rules
    }

    /// Loads every location from scratch; failures skip that location only.
    async fn load_all(&self, request: &RuleRequest<'_>) -> Arc<[CustomRule]> {
        let mut rules = Vec::new();
        for location in &request.locations.value {
            let path = self.resolve_location(location, request.base_dir);
            let export = match self.loader.load(&path).await {
                Ok(export) => export,
                Err(e) => {
                    self.output
                        .error(&format!("Skipping custom rule location '{}': {}", location, e));
                    continue;
                }
            };
            let candidates = match export {
                Value::Array(items) => items,
                other => vec![other],
            };
            for candidate in &candidates {
                match CustomRule::from_value(candidate) {
                    Ok(rule) => rules.push(rule),
                    Err(reason) => {
                        self.output.error(&format!(
                            "Skipping invalid custom rule in '{}': {}",
                            location, reason
                        ));
                    }
                }
            }
        }
        debug!("Loaded {} custom rule(s)", rules.len());
        Arc::from(rules)
    }

    fn resolve_location(&self, location: &str, base_dir: Option<&Path>) -> PathBuf {
        if let Some((id, relative)) = split_extension_reference(location)
            && let Some(root) = self.extensions.extension_path(id)
        {
            return root.join(relative);
        }
        let path = PathBuf::from(location);
        match base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path,
        }
    }
}

/// Splits `{extensionId}/relative/path` into its two parts.
fn split_extension_reference(location: &str) -> Option<(&str, &str)> {
    let (id, relative) = location.strip_prefix('{')?.split_once("}/")?;
    (!id.is_empty() && !id.contains('}')).then_some((id, relative))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::NativeFs;
    use crate::settings::SettingScope;
    use crate::test_utils::CapturedOutput;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::{TempDir, tempdir};

    struct ScriptedPrompter {
        choice: Option<TrustChoice>,
        prompts: AtomicUsize,
    }

    impl ScriptedPrompter {
        fn new(choice: Option<TrustChoice>) -> Arc<Self> {
            Arc::new(Self {
                choice,
                prompts: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl TrustPrompter for ScriptedPrompter {
        async fn prompt(&self, _locations: &[String]) -> Option<TrustChoice> {
            self.prompts.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.choice
        }
    }

    struct MapExtensions(PathBuf);

    impl ExtensionDirectory for MapExtensions {
        fn extension_path(&self, id: &str) -> Option<PathBuf> {
            (id == "acme.rules").then(|| self.0.clone())
        }
    }

    fn rule_json(name: &str) -> Value {
        json!({
            "names": [name, "custom-rule"],
            "description": "Custom rule",
            "tags": ["custom"],
            "function": "(?i)lorem ipsum"
        })
    }

    fn rules_dir() -> TempDir {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("one.json"), rule_json("CR001").to_string()).unwrap();
        std::fs::write(
            dir.path().join("many.jsonc"),
            json!([rule_json("CR002"), { "names": [] }, rule_json("CR003")]).to_string(),
        )
        .unwrap();
        dir
    }

    fn gate(prompter: Arc<ScriptedPrompter>, store: Arc<MemoryTrustStore>, dir: &Path) -> CustomRuleGate {
        CustomRuleGate::new(
            prompter,
            store,
            Arc::new(MapExtensions(dir.to_path_buf())),
            Arc::new(JsonRuleLoader::new(Arc::new(NativeFs))),
        )
    }

    fn names(rules: &[CustomRule]) -> Vec<&str> {
        rules.iter().map(|r| r.names[0].as_str()).collect()
    }

    #[test]
    fn extension_references() {
        assert_eq!(
            split_extension_reference("{acme.rules}/lib/rule.json"),
            Some(("acme.rules", "lib/rule.json"))
        );
        assert_eq!(split_extension_reference("{}/rule.json"), None);
        assert_eq!(split_extension_reference("./rule.json"), None);
    }

    #[test]
    fn candidate_validation() {
        assert!(CustomRule::from_value(&rule_json("CR001")).is_ok());
        assert!(CustomRule::from_value(&json!({ "names": ["A"], "description": "d", "tags": [] })).is_err());
        assert!(CustomRule::from_value(&json!({ "names": [], "description": "d", "tags": [], "function": "x" })).is_err());
        assert!(CustomRule::from_value(&json!({ "names": ["A"], "description": 1, "tags": [], "function": "x" })).is_err());
        assert!(CustomRule::from_value(&json!("rule")).is_err());
    }

    #[tokio::test]
    async fn user_scope_loads_without_prompt() {
        let dir = rules_dir();
        let prompter = ScriptedPrompter::new(Some(TrustChoice::Block));
        let (capture, output) = CapturedOutput::log();
        let gate = gate(prompter.clone(), Arc::default(), dir.path()).with_output(output);
        let locations = Scoped::new(
            vec!["one.json".to_string(), "many.jsonc".to_string(), "missing.json".to_string()],
            SettingScope::User,
        );
        let request = RuleRequest {
            locations: &locations,
            workspace: Some("file:///ws/"),
            base_dir: Some(dir.path()),
        };

        let rules = gate.rules(request).await;

        assert_eq!(names(&rules), vec!["CR001", "CR002", "CR003"]);
        assert_eq!(prompter.prompts.load(Ordering::SeqCst), 0);
        assert!(matches!(gate.state(&request), GateState::Loaded(_)));

        let errors = capture.errors();
        assert_eq!(errors.len(), 2, "{:?}", errors);
        assert!(errors[0].contains("many.jsonc"));
        assert!(errors[1].contains("missing.json"));
    }

    #[tokio::test]
    async fn concurrent_requests_share_one_prompt() {
        let dir = rules_dir();
        let prompter = ScriptedPrompter::new(Some(TrustChoice::AllowOnce));
        let gate = gate(prompter.clone(), Arc::default(), dir.path());
        let locations = Scoped::new(vec!["one.json".to_string()], SettingScope::Workspace);
        let request = RuleRequest {
            locations: &locations,
            workspace: Some("file:///ws/"),
            base_dir: Some(dir.path()),
        };

        let (a, b) = tokio::join!(gate.rules(request), gate.rules(request));

        assert_eq!(prompter.prompts.load(Ordering::SeqCst), 1);
        assert_eq!(names(&a), vec!["CR001"]);
        assert_eq!(names(&b), vec!["CR001"]);
    }

    #[tokio::test]
    async fn block_keeps_rules_empty_until_invalidated() {
        let dir = rules_dir();
        let prompter = ScriptedPrompter::new(Some(TrustChoice::Block));
        let gate = gate(prompter.clone(), Arc::default(), dir.path());
        let locations = Scoped::new(vec!["one.json".to_string()], SettingScope::Folder);
        let request = RuleRequest {
            locations: &locations,
            workspace: Some("file:///ws/"),
            base_dir: Some(dir.path()),
        };

        assert!(gate.rules(request).await.is_empty());
        assert!(matches!(gate.state(&request), GateState::Blocked));
        assert!(gate.rules(request).await.is_empty());
        assert_eq!(prompter.prompts.load(Ordering::SeqCst), 1);

        gate.invalidate();
        assert!(matches!(gate.state(&request), GateState::Unloaded));
        gate.rules(request).await;
        assert_eq!(prompter.prompts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn dismissed_prompt_blocks() {
        let dir = rules_dir();
        let gate = gate(ScriptedPrompter::new(None), Arc::default(), dir.path());
        let locations = Scoped::new(vec!["one.json".to_string()], SettingScope::Workspace);

        let request = RuleRequest {
            locations: &locations,
            workspace: None,
            base_dir: Some(dir.path()),
        };

        assert!(gate.rules(request).await.is_empty());
        assert!(matches!(gate.state(&request), GateState::Blocked));
    }

    #[tokio::test]
    async fn always_allow_is_remembered() {
        let dir = rules_dir();
        let store = Arc::new(MemoryTrustStore::default());
        let prompter = ScriptedPrompter::new(Some(TrustChoice::AlwaysAllow));
        let gate = gate(prompter.clone(), store.clone(), dir.path());
        let locations = Scoped::new(vec!["{acme.rules}/one.json".to_string()], SettingScope::Workspace);
        let request = RuleRequest {
            locations: &locations,
            workspace: Some("file:///ws/"),
            base_dir: None,
        };

        assert_eq!(names(&gate.rules(request).await), vec!["CR001"]);
        assert!(store.is_trusted("file:///ws/"));

        gate.invalidate();
        assert_eq!(names(&gate.rules(request).await), vec!["CR001"]);
        assert_eq!(prompter.prompts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn reload_after_invalidate_does_not_accumulate() {
        let dir = rules_dir();
        let gate = gate(ScriptedPrompter::new(None), Arc::default(), dir.path());
        let locations = Scoped::new(vec!["many.jsonc".to_string()], SettingScope::User);
        let request = RuleRequest {
            locations: &locations,
            workspace: None,
            base_dir: Some(dir.path()),
        };

        gate.rules(request).await;
        gate.invalidate();
        let rules = gate.rules(request).await;
        assert_eq!(names(&rules), vec!["CR002", "CR003"]);
    }

    #[tokio::test]
    async fn folders_keep_their_own_rules() {
        let dir = rules_dir();
        let other = tempdir().unwrap();
        let gate = gate(ScriptedPrompter::new(None), Arc::default(), dir.path());
        let with_rules = Scoped::new(vec!["one.json".to_string()], SettingScope::User);
        let without_rules = Scoped::new(Vec::new(), SettingScope::User);

        let first = gate
            .rules(RuleRequest {
                locations: &without_rules,
                workspace: None,
                base_dir: Some(other.path()),
            })
            .await;
        let second = gate
            .rules(RuleRequest {
                locations: &with_rules,
                workspace: None,
                base_dir: Some(dir.path()),
            })
            .await;

        assert!(first.is_empty());
        assert_eq!(names(&second), vec!["CR001"]);
    }

    #[test]
    fn file_trust_store_persists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/trusted.json");
        let store = FileTrustStore::new(path.clone());

        assert!(!store.is_trusted("file:///ws/"));
        store.trust("file:///ws/").unwrap();
        store.trust("file:///ws/").unwrap();

        assert!(FileTrustStore::new(path.clone()).is_trusted("file:///ws/"));
        let saved: Vec<String> = serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(saved, vec!["file:///ws/".to_string()]);
    }
}
