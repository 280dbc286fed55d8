//! `workspace/executeCommand` handler.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tower_lsp::Client;
use tower_lsp::jsonrpc::{Error, Result};
use tower_lsp::lsp_types::*;
use tracing::{debug, warn};

use mdguard_core::FixDescriptor;

use crate::config::{
    COMMAND_FIX_ALL, COMMAND_FIX_LINE, COMMAND_OPEN_INFORMATION, COMMAND_TOGGLE_LINTING,
};
use crate::conversion::to_lsp_edit;
use crate::handler::code_action::workspace_edit;
use crate::state::SharedState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FixLineArgs {
    uri: Url,
    /// 0-based line of the violation.
    line: usize,
    fix_info: FixDescriptor,
}

#[derive(Debug, Deserialize)]
struct FixAllArgs {
    uri: Url,
    #[serde(default)]
    rule: Option<String>,
}

/// Handles the `workspace/executeCommand` request.
pub async fn handle_execute_command(
    client: &Client,
    state: &SharedState,
    params: ExecuteCommandParams,
) -> Result<Option<Value>> {
    debug!("Execute command: {}", params.command);

    match params.command.as_str() {
        COMMAND_FIX_LINE => {
            let args: FixLineArgs = first_argument(params.arguments)?;
            let Some(document) = state.documents.get(&args.uri) else {
                return Ok(None);
            };
            if let Some(edit) =
                state
                    .scheduler
                    .apply_fix_to_line(&document, args.line, &args.fix_info)
            {
                apply(client, &args.uri, edit).await;
            }
            Ok(None)
        }
        COMMAND_FIX_ALL => {
            let args: FixAllArgs = first_argument(params.arguments)?;
            let Some(document) = state.documents.get(&args.uri) else {
                return Ok(None);
            };
            if let Some(edit) = state
                .scheduler
                .apply_all_fixes(&document, args.rule.as_deref())
                .await
            {
                apply(client, &args.uri, edit).await;
            }
            Ok(None)
        }
        COMMAND_TOGGLE_LINTING => {
            let enabled = state.scheduler.toggle().await;
            let message = if enabled {
                "mdguard linting enabled"
            } else {
                "mdguard linting disabled"
            };
            client.show_message(MessageType::INFO, message).await;
            Ok(Some(Value::Bool(enabled)))
        }
        COMMAND_OPEN_INFORMATION => {
            let uri: Url = first_argument(params.arguments)?;
            let shown = client
                .show_document(ShowDocumentParams {
                    uri,
                    external: Some(true),
                    take_focus: Some(true),
                    selection: None,
                })
                .await
                .unwrap_or_else(|e| {
                    warn!("showDocument failed: {}", e);
                    false
                });
            Ok(Some(Value::Bool(shown)))
        }
        other => Err(Error::invalid_params(format!("Unknown command: {}", other))),
    }
}

async fn apply(client: &Client, uri: &Url, edit: mdguard_core::TextEdit) {
    let edit = workspace_edit(uri, vec![to_lsp_edit(edit)]);
    match client.apply_edit(edit).await {
        Ok(response) if !response.applied => {
            warn!(
                "Client rejected edit: {}",
                response.failure_reason.unwrap_or_default()
            );
        }
        Ok(_) => {}
        Err(e) => warn!("applyEdit failed: {}", e),
    }
}

fn first_argument<T: DeserializeOwned>(arguments: Vec<Value>) -> Result<T> {
    let value = arguments
        .into_iter()
        .next()
        .ok_or_else(|| Error::invalid_params("Missing command argument"))?;
    serde_json::from_value(value).map_err(|e| Error::invalid_params(e.to_string()))
}
