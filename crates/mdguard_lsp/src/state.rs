//! LSP Backend state management.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use tower_lsp::lsp_types::Url;

use mdguard_core::settings::Scoped;
use mdguard_core::{Document, HostView, LintScheduler, SettingsProvider, SettingsStore};

/// Open documents and the active cursor.
#[derive(Debug, Default)]
pub(crate) struct DocumentStore {
    documents: RwLock<HashMap<Url, Document>>,
    cursor: RwLock<Option<(Url, u32)>>,
}

impl DocumentStore {
    pub fn get(&self, uri: &Url) -> Option<Document> {
        self.documents.read().get(uri).cloned()
    }

    pub fn insert(&self, document: Document) {
        self.documents.write().insert(document.uri.clone(), document);
    }

    /// Replaces the text of an open document; returns the updated snapshot.
    pub fn update(&self, uri: &Url, text: String, version: Option<i32>) -> Option<Document> {
        let mut documents = self.documents.write();
        let document = documents.get_mut(uri)?;
        document.text = text;
        if let Some(version) = version {
            document.version = version;
        }
        Some(document.clone())
    }

    pub fn remove(&self, uri: &Url) -> Option<Document> {
        let mut cursor = self.cursor.write();
        if cursor.as_ref().is_some_and(|(active, _)| active == uri) {
            *cursor = None;
        }
        self.documents.write().remove(uri)
    }

    pub fn set_cursor(&self, uri: Url, line: u32) {
        *self.cursor.write() = Some((uri, line));
    }
}

impl HostView for DocumentStore {
    /// Every open document counts as visible.
    fn visible_documents(&self) -> Vec<Document> {
        self.documents.read().values().cloned().collect()
    }

    fn active_cursor(&self) -> Option<(Url, u32)> {
        self.cursor.read().clone()
    }
}

/// Settings pushed by the client, replaced wholesale on every change.
#[derive(Debug, Default)]
pub(crate) struct SharedSettings {
    store: RwLock<SettingsStore>,
}

impl SharedSettings {
    pub fn replace(&self, store: SettingsStore) {
        *self.store.write() = store;
    }
}

impl SettingsProvider for SharedSettings {
    fn get(&self, section: &str, resource: Option<&Url>) -> Option<Scoped<Value>> {
        self.store.read().get(section, resource)
    }
}

/// Shared backend state.
pub(crate) struct BackendState {
    pub documents: Arc<DocumentStore>,
    pub settings: Arc<SharedSettings>,
    pub scheduler: Arc<LintScheduler>,
}

impl fmt::Debug for BackendState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendState")
            .field("documents", &"<DocumentStore>")
            .field("scheduler", &self.scheduler)
            .finish()
    }
}

/// Type alias for shared state.
pub(crate) type SharedState = Arc<BackendState>;
