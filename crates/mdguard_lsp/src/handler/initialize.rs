//! Initialize and shutdown handlers.

use tower_lsp::jsonrpc::Result;
use tower_lsp::lsp_types::*;
use tracing::{info, warn};

use mdguard_core::workspace::{WorkspaceFolder as MdguardFolder, WorkspaceFolders};

use crate::config::{COMMANDS, settings_from_payload};
use crate::state::BackendState;

/// Handles the `initialize` LSP request.
pub async fn handle_initialize(
    state: &BackendState,
    params: InitializeParams,
) -> Result<InitializeResult> {
    info!("mdguard LSP server initializing...");

    state.scheduler.set_workspace_folders(workspace_folders(&params));
    state
        .settings
        .replace(settings_from_payload(params.initialization_options.as_ref()));

    Ok(InitializeResult {
        capabilities: ServerCapabilities {
            text_document_sync: Some(TextDocumentSyncCapability::Options(
                TextDocumentSyncOptions {
                    open_close: Some(true),
                    change: Some(TextDocumentSyncKind::FULL),
                    save: Some(TextDocumentSyncSaveOptions::SaveOptions(SaveOptions {
                        include_text: Some(true),
                    })),
                    ..Default::default()
                },
            )),
            code_action_provider: Some(CodeActionProviderCapability::Options(CodeActionOptions {
                code_action_kinds: Some(vec![
                    CodeActionKind::QUICKFIX,
                    CodeActionKind::SOURCE_FIX_ALL,
                ]),
                resolve_provider: Some(false),
                work_done_progress_options: Default::default(),
            })),
            document_range_formatting_provider: Some(OneOf::Left(true)),
            execute_command_provider: Some(ExecuteCommandOptions {
                commands: COMMANDS.iter().map(|c| c.to_string()).collect(),
                work_done_progress_options: Default::default(),
            }),
            ..Default::default()
        },
        server_info: Some(ServerInfo {
            name: "mdguard-lsp".to_string(),
            version: Some(env!("CARGO_PKG_VERSION").to_string()),
        }),
    })
}

#[allow(deprecated)]
fn workspace_folders(params: &InitializeParams) -> WorkspaceFolders {
    let folders = match &params.workspace_folders {
        Some(folders) => folders
            .iter()
            .map(|f| MdguardFolder::new(f.uri.clone(), f.name.clone()))
            .collect(),
        None => params
            .root_uri
            .iter()
            .map(|uri| MdguardFolder::new(uri.clone(), ""))
            .collect(),
    };
    WorkspaceFolders::new(folders)
}

/// Handles the `initialized` LSP notification.
///
/// Asks the client to watch configuration and ignore files.
pub async fn handle_initialized(client: &tower_lsp::Client) {
    let watchers = [
        "**/.markdownlint{,-cli2}.{json,jsonc,yaml,yml}",
        "**/.markdownlintignore",
    ]
    .iter()
    .map(|pattern| FileSystemWatcher {
        glob_pattern: GlobPattern::String(pattern.to_string()),
        kind: None,
    })
    .collect();

    let registration = Registration {
        id: "mdguard-watched-files".to_string(),
        method: "workspace/didChangeWatchedFiles".to_string(),
        register_options: serde_json::to_value(DidChangeWatchedFilesRegistrationOptions {
            watchers,
        })
        .ok(),
    };
    if let Err(e) = client.register_capability(vec![registration]).await {
        warn!("Client refused file watching: {}", e);
    }

    client
        .log_message(MessageType::INFO, "mdguard LSP server initialized!")
        .await;
}

/// Handles the `shutdown` LSP request.
pub async fn handle_shutdown() -> Result<()> {
    info!("mdguard LSP server shutting down...");
    Ok(())
}
