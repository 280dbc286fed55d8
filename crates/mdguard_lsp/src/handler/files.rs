//! Watched files and configuration change handlers.

use tower_lsp::lsp_types::*;
use tracing::{debug, info};

use crate::config::{affects_lint_state, settings_from_payload};
use crate::state::SharedState;

/// Handles the `workspace/didChangeWatchedFiles` notification.
pub async fn handle_did_change_watched_files(
    state: &SharedState,
    params: DidChangeWatchedFilesParams,
) {
    debug!("Watched files changed: {:?}", params.changes);

    let changed = params.changes.iter().any(|change| {
        let ignore = state.scheduler.settings_for(&change.uri).ignore;
        affects_lint_state(&change.uri, &ignore)
    });

    if changed {
        info!("Configuration or ignore file changed, re-linting...");
        state.scheduler.invalidate_all().await;
    }
}

/// Handles the `workspace/didChangeConfiguration` notification.
pub async fn handle_did_change_configuration(
    state: &SharedState,
    params: DidChangeConfigurationParams,
) {
    debug!("Configuration changed");

    state
        .settings
        .replace(settings_from_payload(Some(&params.settings)));
    state.scheduler.invalidate_all().await;
}
