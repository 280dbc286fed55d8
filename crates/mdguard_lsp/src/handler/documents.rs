//! Document lifecycle handlers (open, change, save, close).

use std::sync::Arc;

use tower_lsp::lsp_types::*;
use tracing::debug;

use mdguard_core::Document;

use crate::state::SharedState;

/// Handles the `textDocument/didOpen` notification.
pub async fn handle_did_open(state: &SharedState, params: DidOpenTextDocumentParams) {
    debug!("Document opened: {}", params.text_document.uri);

    let item = params.text_document;
    let document = Document::new(item.uri, item.text, item.language_id, item.version);
    state.documents.insert(document.clone());

    // Linting may wait on a trust prompt answered by the client.
    let scheduler = Arc::clone(&state.scheduler);
    tokio::spawn(async move { scheduler.lint(&document).await });
}

/// Handles the `textDocument/didChange` notification.
///
/// Full sync: the last content change carries the whole text.
pub async fn handle_did_change(state: &SharedState, params: DidChangeTextDocumentParams) {
    debug!("Document changed: {}", params.text_document.uri);

    let Some(change) = params.content_changes.into_iter().next_back() else {
        return;
    };
    let uri = params.text_document.uri;
    if let Some(document) = state
        .documents
        .update(&uri, change.text, Some(params.text_document.version))
    {
        state.scheduler.did_change(document);
    }
}

/// Handles the `textDocument/didSave` notification.
pub async fn handle_did_save(state: &SharedState, params: DidSaveTextDocumentParams) {
    debug!("Document saved: {}", params.text_document.uri);

    let uri = params.text_document.uri;
    let document = match params.text {
        Some(text) => state.documents.update(&uri, text, None),
        None => state.documents.get(&uri),
    };
    let Some(document) = document else {
        return;
    };

    let scheduler = Arc::clone(&state.scheduler);
    tokio::spawn(async move { scheduler.did_save(&document).await });
}

/// Handles the `textDocument/didClose` notification.
pub async fn handle_did_close(state: &SharedState, params: DidCloseTextDocumentParams) {
    debug!("Document closed: {}", params.text_document.uri);

    let uri = params.text_document.uri;
    state.documents.remove(&uri);
    state.scheduler.close(&uri).await;
}

/// Handles the `mdguard/didChangeActiveSelection` notification.
pub async fn handle_active_selection(state: &SharedState, params: ActiveSelectionParams) {
    state.documents.set_cursor(params.uri.clone(), params.line);
    if let Some(document) = state.documents.get(&params.uri) {
        state.scheduler.cursor_moved(document);
    }
}

/// Parameters of `mdguard/didChangeActiveSelection`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct ActiveSelectionParams {
    pub uri: Url,
    /// 0-based line of the cursor.
    pub line: u32,
}
