//! Range formatting handler.

use tower_lsp::jsonrpc::Result;
use tower_lsp::lsp_types::*;
use tracing::debug;

use crate::conversion::{from_lsp_range, to_lsp_edit};
use crate::state::SharedState;

/// Handles the `textDocument/rangeFormatting` request by applying the fixes
/// of violations on the requested lines.
pub async fn handle_range_formatting(
    state: &SharedState,
    params: DocumentRangeFormattingParams,
) -> Result<Option<Vec<TextEdit>>> {
    debug!("Range formatting request: {}", params.text_document.uri);

    let Some(document) = state.documents.get(&params.text_document.uri) else {
        return Ok(None);
    };
    let edits = state
        .scheduler
        .format_range(&document, from_lsp_range(params.range))
        .await;
    Ok(Some(edits.into_iter().map(to_lsp_edit).collect()))
}
