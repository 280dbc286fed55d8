//! Per-document lint scheduling.
//!
//! Every document moves `Idle -> Pending -> Running -> Idle`. Edits arm a
//! debounce timer that later edits re-arm; open, save and re-lint requests
//! run at once and cancel any pending timer. Each pass takes a fresh
//! generation from one process-wide counter and only publishes if the
//! document still carries it, so no newer pass, invalidation or close
//! happened meanwhile. Running passes are never aborted.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tokio::task::AbortHandle;
use tracing::{debug, info};
use url::Url;

use crate::custom_rules::{CustomRuleGate, RuleRequest};
use crate::diagnostic::{Diagnostic, DiagnosticBuilder, Range};
use crate::document::Document;
use crate::engine::RuleEngine;
use crate::fixer::{self, FixFilter, TextEdit};
use crate::fs::{FileSystem, NullFs};
use crate::ignore::{IgnoreCache, IgnoreKey, IgnoreMatcher, IgnoreSet, IgnoreSetting};
use crate::invoker::{LintContext, LintInvoker};
use crate::output::OutputLog;
use crate::resolver::ConfigResolver;
use crate::settings::{RunMode, Settings, SettingsProvider};
use crate::violation::{FixDescriptor, RuleViolation};
use crate::workspace::{WorkspaceFolder, WorkspaceFolders};

/// Delay between the last edit and the lint pass it triggers.
pub const DEBOUNCE_DELAY: Duration = Duration::from_millis(500);

/// Receives diagnostics for documents.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Replaces the diagnostics of `document`.
    async fn publish(&self, document: &Document, diagnostics: Vec<Diagnostic>);

    async fn clear(&self, uri: &Url);

    async fn clear_all(&self);
}

/// What the host currently shows.
pub trait HostView: Send + Sync {
    fn visible_documents(&self) -> Vec<Document>;

    /// Document and 0-based line of the active cursor.
    fn active_cursor(&self) -> Option<(Url, u32)>;
}

/// Collaborators of a [`LintScheduler`].
pub struct SchedulerParts {
    pub engine: Arc<dyn RuleEngine>,
    pub fs: Arc<dyn FileSystem>,
    pub settings: Arc<dyn SettingsProvider>,
    pub publisher: Arc<dyn Publisher>,
    pub host: Arc<dyn HostView>,
    pub gate: Arc<CustomRuleGate>,
    pub output: Arc<OutputLog>,
}

#[derive(Debug, Default)]
struct ScheduleState {
    pending: Option<AbortHandle>,
    generation: u64,
}

pub struct LintScheduler {
    invoker: LintInvoker,
    resolver: ConfigResolver,
    ignores: IgnoreCache,
    gate: Arc<CustomRuleGate>,
    fs: Arc<dyn FileSystem>,
    settings: Arc<dyn SettingsProvider>,
    publisher: Arc<dyn Publisher>,
    host: Arc<dyn HostView>,
    output: Arc<OutputLog>,
    workspace: RwLock<WorkspaceFolders>,
    schedules: Mutex<HashMap<Url, ScheduleState>>,
    generations: AtomicU64,
    run_modes: Mutex<HashMap<Url, RunMode>>,
    enabled: AtomicBool,
}

impl std::fmt::Debug for LintScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LintScheduler")
            .field("workspace", &*self.workspace.read())
            .field("enabled", &self.is_enabled())
            .finish_non_exhaustive()
    }
}

impl LintScheduler {
    pub fn new(parts: SchedulerParts) -> Self {
        Self::with_resolver(parts, ConfigResolver::new())
    }

    pub fn with_resolver(parts: SchedulerParts, resolver: ConfigResolver) -> Self {
        Self {
            invoker: LintInvoker::new(parts.engine, Arc::clone(&parts.output)),
            resolver: resolver.with_output(Arc::clone(&parts.output)),
            ignores: IgnoreCache::new(),
            gate: parts.gate,
            fs: parts.fs,
            settings: parts.settings,
            publisher: parts.publisher,
            host: parts.host,
            output: parts.output,
            workspace: RwLock::new(WorkspaceFolders::default()),
            schedules: Mutex::new(HashMap::new()),
            generations: AtomicU64::new(0),
            run_modes: Mutex::new(HashMap::new()),
            enabled: AtomicBool::new(true),
        }
    }

    pub fn set_workspace_folders(&self, folders: WorkspaceFolders) {
        *self.workspace.write() = folders;
    }

    pub fn workspace_folders(&self) -> WorkspaceFolders {
        self.workspace.read().clone()
    }

    pub fn settings_for(&self, uri: &Url) -> Settings {
        self.settings.settings(Some(uri))
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Turns linting on or off. Turning it off clears every diagnostic;
    /// turning it on re-lints the visible documents.
    pub async fn set_enabled(self: &Arc<Self>, enabled: bool) {
        let was = self.enabled.swap(enabled, Ordering::SeqCst);
        if was == enabled {
            return;
        }
        info!("Linting {}", if enabled { "enabled" } else { "disabled" });
        if enabled {
            self.refresh().await;
        } else {
            self.supersede_all(true);
            self.publisher.clear_all().await;
        }
    }

    /// Flips linting on or off; returns the new state.
    pub async fn toggle(self: &Arc<Self>) -> bool {
        let enabled = !self.is_enabled();
        self.set_enabled(enabled).await;
        enabled
    }

    /// Run mode of `uri`, cached until the configuration is invalidated.
    pub fn run_mode(&self, uri: &Url) -> RunMode {
        if let Some(mode) = self.run_modes.lock().get(uri) {
            return *mode;
        }
        let mode = self.settings_for(uri).run;
        self.run_modes.lock().insert(uri.clone(), mode);
        mode
    }

    /// Lints `document` now, dropping any pending debounced lint of it.
    pub async fn lint(self: &Arc<Self>, document: &Document) {
        self.cancel_pending(&document.uri);
        self.lint_now(document).await;
    }

    /// Lints `document` once no further request arrives for
    /// [`DEBOUNCE_DELAY`].
    pub fn request_lint(self: &Arc<Self>, document: Document) {
        let uri = document.uri.clone();
        let this = Arc::clone(self);
        let timer = tokio::spawn(async move {
            tokio::time::sleep(DEBOUNCE_DELAY).await;
            // The pass runs in its own task so re-arming the timer cannot
            // abort it.
            tokio::spawn(async move { this.lint_now(&document).await });
        });

        let mut schedules = self.schedules.lock();
        let state = schedules.entry(uri).or_default();
        if let Some(previous) = state.pending.replace(timer.abort_handle()) {
            previous.abort();
        }
    }

    /// Edit notification: schedules a lint when the run mode is `onType`.
    pub fn did_change(self: &Arc<Self>, document: Document) {
        if self.run_mode(&document.uri) == RunMode::OnType {
            self.request_lint(document);
        }
    }

    /// Save notification: lints when the run mode is `onSave`.
    pub async fn did_save(self: &Arc<Self>, document: &Document) {
        if self.run_mode(&document.uri) == RunMode::OnSave {
            self.lint(document).await;
        }
    }

    /// Cursor movement: re-lints with debounce when focus mode is on.
    pub fn cursor_moved(self: &Arc<Self>, document: Document) {
        if self.settings_for(&document.uri).focus_mode.is_enabled() {
            self.request_lint(document);
        }
    }

    /// Cancels pending work for `uri` and clears its diagnostics. Passes
    /// still running for it never publish.
    pub async fn close(&self, uri: &Url) {
        if let Some(state) = self.schedules.lock().remove(uri)
            && let Some(pending) = state.pending
        {
            pending.abort();
        }
        self.run_modes.lock().remove(uri);
        self.publisher.clear(uri).await;
    }

    /// Edit fixing one violation on line `line_index` (0-based).
    pub fn apply_fix_to_line(
        &self,
        document: &Document,
        line_index: usize,
        fix: &FixDescriptor,
    ) -> Option<TextEdit> {
        fixer::fix_line_edit(document, line_index, fix)
    }

    /// Whole-document edit applying every fix, or only those of
    /// `rule_filter`. `None` when nothing changes.
    pub async fn apply_all_fixes(
        self: &Arc<Self>,
        document: &Document,
        rule_filter: Option<&str>,
    ) -> Option<TextEdit> {
        self.fix_document(document, &FixFilter::rule(rule_filter))
            .await
    }

    /// Edits applying the fixes of violations on the lines of `range`.
    pub async fn format_range(self: &Arc<Self>, document: &Document, range: Range) -> Vec<TextEdit> {
        let filter = FixFilter::Lines {
            start: range.start.line as usize,
            end: range.end.line as usize,
        };
        self.fix_document(document, &filter)
            .await
            .into_iter()
            .collect()
    }

    /// Drops cached configurations and run modes.
    pub fn invalidate_config(&self) {
        self.resolver.invalidate();
        self.run_modes.lock().clear();
    }

    pub fn invalidate_ignores(&self) {
        self.ignores.invalidate();
    }

    pub fn invalidate_custom_rules(&self) {
        self.gate.invalidate();
    }

    /// Drops every cache, clears all diagnostics and re-lints the visible
    /// documents.
    pub async fn invalidate_all(self: &Arc<Self>) {
        self.invalidate_config();
        self.invalidate_ignores();
        self.invalidate_custom_rules();
        self.refresh().await;
    }

    /// Clears all diagnostics and re-lints the visible documents, keeping
    /// caches.
    pub async fn refresh(self: &Arc<Self>) {
        self.supersede_all(false);
        self.output.reset();
        self.publisher.clear_all().await;
        for document in self.host.visible_documents() {
            self.lint(&document).await;
        }
    }

    /// Lints `document` without publishing.
    pub async fn violations(self: &Arc<Self>, document: &Document) -> Vec<RuleViolation> {
        let settings = self.settings_for(&document.uri);
        if !document.is_lintable(&settings.languages) {
            return Vec::new();
        }
        self.collect(document, &settings).await
    }

    async fn fix_document(self: &Arc<Self>, document: &Document, filter: &FixFilter) -> Option<TextEdit> {
        let violations = self.violations(document).await;
        let result = fixer::apply_fixes(&document.text, &violations, filter);
        if !result.modified {
            return None;
        }
        debug!("{}: {} fix(es) applied", document.uri, result.fixes_applied);
        Some(fixer::full_document_edit(document, result.fixed_content))
    }

    async fn lint_now(self: &Arc<Self>, document: &Document) {
        let generation = self.begin_pass(&document.uri);
        self.run(document, generation).await;
    }

    async fn run(self: &Arc<Self>, document: &Document, generation: u64) {
        if !self.is_enabled() {
            return;
        }
        let settings = self.settings_for(&document.uri);
        if !document.is_lintable(&settings.languages) {
            return;
        }
        debug!("Linting {}", document.uri);

        let violations = self.collect(document, &settings).await;
        let cursor = self
            .host
            .active_cursor()
            .filter(|(uri, _)| *uri == document.uri)
            .map(|(_, line)| line);
        let diagnostics = DiagnosticBuilder::new()
            .with_focus(settings.focus_mode, cursor)
            .build(document, &violations);

        if !self.is_enabled() || !self.is_current(&document.uri, generation) {
            debug!("Discarding superseded lint of {}", document.uri);
            return;
        }
        self.publisher.publish(document, diagnostics).await;
    }

    async fn collect(self: &Arc<Self>, document: &Document, settings: &Settings) -> Vec<RuleViolation> {
        let workspace = self.workspace_folders();
        let folder = workspace.folder_for(&document.uri).cloned();
        let fs: Arc<dyn FileSystem> = if document.has_file_system() {
            Arc::clone(&self.fs)
        } else {
            Arc::new(NullFs)
        };

        let entry = self
            .resolver
            .resolve(fs.as_ref(), document, folder.as_ref(), settings)
            .await;
        let ignores = self.ignore_set(&settings.ignore, folder.as_ref(), fs);

        let identity = workspace.identity();
        let base_dir = folder.as_ref().and_then(WorkspaceFolder::fs_path);
        let custom_rules = self
            .gate
            .rules(RuleRequest {
                locations: &settings.custom_rules,
                workspace: identity.as_deref(),
                base_dir: base_dir.as_deref(),
            })
            .await;

        let relative_path = workspace.relative_path(document);
        self.invoker
            .invoke(
                document,
                LintContext {
                    relative_path: &relative_path,
                    config: &entry,
                    custom_rules,
                    ignores: &ignores,
                    plugins: Vec::new(),
                },
            )
            .await
    }

    /// The memoized ignore set of `folder`. The first lookup with a usable
    /// file layer also starts reading the ignore file, which re-lints the
    /// visible documents once loaded.
    fn ignore_set(
        self: &Arc<Self>,
        setting: &IgnoreSetting,
        folder: Option<&WorkspaceFolder>,
        document_fs: Arc<dyn FileSystem>,
    ) -> Arc<IgnoreSet> {
        let key = IgnoreKey {
            folder: folder.map(|f| f.uri.clone()),
            setting: setting.clone(),
        };
        let (set, epoch) = self
            .ignores
            .get_or_compile(&key, || IgnoreMatcher::compile(setting, None));
        let IgnoreSetting::File(name) = setting else {
            return set;
        };

        // The folder's file layer serves the ignore file even when the
        // document itself has none.
        let fs = match folder {
            Some(folder) if folder.has_file_system() => Arc::clone(&self.fs),
            _ => document_fs,
        };
        if !fs.is_available() || !self.ignores.begin_file_read(&key, epoch) {
            return set;
        }

        let path = ignore_file_path(name, folder);
        let this = Arc::clone(self);
        tokio::spawn(async move {
            match IgnoreMatcher::load_ignore_file(fs.as_ref(), &path).await {
                Ok(Some(predicate)) => {
                    if this.ignores.append(&key, epoch, predicate) {
                        debug!("Loaded ignore file '{}'", path.display());
                        this.refresh().await;
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    this.output.error(&e.to_string());
                }
            }
        });
        set
    }

    fn next_generation(&self) -> u64 {
        self.generations.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn begin_pass(&self, uri: &Url) -> u64 {
        let generation = self.next_generation();
        self.schedules
            .lock()
            .entry(uri.clone())
            .or_default()
            .generation = generation;
        generation
    }

    fn is_current(&self, uri: &Url, generation: u64) -> bool {
        self.schedules
            .lock()
            .get(uri)
            .is_some_and(|state| state.generation == generation)
    }

    fn cancel_pending(&self, uri: &Url) {
        if let Some(pending) = self
            .schedules
            .lock()
            .get_mut(uri)
            .and_then(|state| state.pending.take())
        {
            pending.abort();
        }
    }

    fn supersede_all(&self, cancel_pending: bool) {
        let mut schedules = self.schedules.lock();
        for state in schedules.values_mut() {
            state.generation = self.next_generation();
            if cancel_pending && let Some(pending) = state.pending.take() {
                pending.abort();
            }
        }
    }
}

fn ignore_file_path(name: &str, folder: Option<&WorkspaceFolder>) -> PathBuf {
    let path = Path::new(name);
    match folder.and_then(WorkspaceFolder::fs_path) {
        Some(root) if path.is_relative() => root.join(path),
        _ => path.to_path_buf(),
    }
}
