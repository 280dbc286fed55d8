//! Code action handler for fixes and rule information.

use std::collections::{HashMap, HashSet};

use serde_json::json;
use tower_lsp::jsonrpc::Result;
use tower_lsp::lsp_types::*;
use tracing::debug;

use mdguard_core::Document;

use crate::config::{COMMAND_OPEN_INFORMATION, CONFIGURATION_DOCS};
use crate::conversion::{DiagnosticData, SOURCE, ranges_intersect, to_lsp_edit};
use crate::state::SharedState;

/// Kind of the whole-document fix action.
pub const SOURCE_FIX_ALL_MDGUARD: &str = "source.fixAll.mdguard";

/// Handles the `textDocument/codeAction` request.
pub async fn handle_code_action(
    state: &SharedState,
    params: CodeActionParams,
) -> Result<Option<CodeActionResponse>> {
    debug!("Code action request: {}", params.text_document.uri);

    let uri = &params.text_document.uri;
    let Some(document) = state.documents.get(uri) else {
        return Ok(None);
    };

    let fix_all_kind = CodeActionKind::new(SOURCE_FIX_ALL_MDGUARD);
    let (wants_fix_all, wants_quickfix) = match &params.context.only {
        Some(only) => (
            is_requested(only, &fix_all_kind),
            is_requested(only, &CodeActionKind::QUICKFIX),
        ),
        None => (true, true),
    };

    let mut actions = Vec::new();
    if wants_quickfix {
        add_quickfix_actions(state, &document, &params, &mut actions).await;
    }
    if wants_fix_all
        && let Some(edit) = state.scheduler.apply_all_fixes(&document, None).await
    {
        actions.push(CodeActionOrCommand::CodeAction(CodeAction {
            title: "Fix all supported mdguard violations in the document".to_string(),
            kind: Some(fix_all_kind),
            edit: Some(workspace_edit(uri, vec![to_lsp_edit(edit)])),
            ..Default::default()
        }));
    }

    Ok(Some(actions))
}

async fn add_quickfix_actions(
    state: &SharedState,
    document: &Document,
    params: &CodeActionParams,
    actions: &mut Vec<CodeActionOrCommand>,
) {
    let uri = &params.text_document.uri;
    let mut fixed_rules = HashSet::new();
    let mut any = false;

    for diagnostic in &params.context.diagnostics {
        if diagnostic.source.as_deref() != Some(SOURCE)
            || !ranges_intersect(&diagnostic.range, &params.range)
        {
            continue;
        }
        let Some(data) = DiagnosticData::from_diagnostic(diagnostic) else {
            continue;
        };
        any = true;

        if let Some(fix) = &data.fix_info
            && let Some(edit) = state.scheduler.apply_fix_to_line(
                document,
                diagnostic.range.start.line as usize,
                fix,
            )
        {
            actions.push(CodeActionOrCommand::CodeAction(CodeAction {
                title: format!("Fix this violation of {}", data.rule_alias),
                kind: Some(CodeActionKind::QUICKFIX),
                diagnostics: Some(vec![diagnostic.clone()]),
                edit: Some(workspace_edit(uri, vec![to_lsp_edit(edit)])),
                is_preferred: Some(true),
                ..Default::default()
            }));

            if fixed_rules.insert(data.rule.clone())
                && let Some(edit) = state
                    .scheduler
                    .apply_all_fixes(document, Some(data.rule.as_str()))
                    .await
            {
                actions.push(CodeActionOrCommand::CodeAction(CodeAction {
                    title: format!(
                        "Fix all violations of {} in the document",
                        data.rule_alias
                    ),
                    kind: Some(CodeActionKind::QUICKFIX),
                    edit: Some(workspace_edit(uri, vec![to_lsp_edit(edit)])),
                    ..Default::default()
                }));
            }
        }

        if let Some(description) = &diagnostic.code_description {
            actions.push(information_action(
                format!("More information about {}", data.rule),
                description.href.as_str(),
                Some(diagnostic.clone()),
            ));
        }
    }

    if any {
        actions.push(information_action(
            "Learn how to configure mdguard rules".to_string(),
            CONFIGURATION_DOCS,
            None,
        ));
    }
}

fn information_action(
    title: String,
    href: &str,
    diagnostic: Option<Diagnostic>,
) -> CodeActionOrCommand {
    CodeActionOrCommand::CodeAction(CodeAction {
        title: title.clone(),
        kind: Some(CodeActionKind::QUICKFIX),
        diagnostics: diagnostic.map(|d| vec![d]),
        command: Some(Command {
            title,
            command: COMMAND_OPEN_INFORMATION.to_string(),
            arguments: Some(vec![json!(href)]),
        }),
        ..Default::default()
    })
}

/// Whether `kind` falls under one of the requested kinds.
fn is_requested(only: &[CodeActionKind], kind: &CodeActionKind) -> bool {
    only.iter().any(|requested| {
        let requested = requested.as_str();
        kind.as_str() == requested
            || kind
                .as_str()
                .strip_prefix(requested)
                .is_some_and(|rest| rest.starts_with('.'))
    })
}

pub(crate) fn workspace_edit(uri: &Url, edits: Vec<TextEdit>) -> WorkspaceEdit {
    WorkspaceEdit {
        changes: Some(HashMap::from([(uri.clone(), edits)])),
        ..Default::default()
    }
}
