//! Core collaborators backed by the LSP client.

use std::collections::HashMap;

use async_trait::async_trait;
use tower_lsp::Client;
use tower_lsp::lsp_types::{MessageActionItem, MessageType, Url};
use tracing::warn;

use mdguard_core::custom_rules::{TrustChoice, TrustPrompter};
use mdguard_core::{Diagnostic as MdguardDiagnostic, Document, OutputSink, Publisher};

use crate::conversion::to_lsp_diagnostic;

/// Publishes diagnostics through `textDocument/publishDiagnostics`.
pub(crate) struct ClientPublisher {
    client: Client,
    open: parking_lot::Mutex<Vec<Url>>,
}

impl ClientPublisher {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            open: parking_lot::Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Publisher for ClientPublisher {
    async fn publish(&self, document: &Document, diagnostics: Vec<MdguardDiagnostic>) {
        let diagnostics = diagnostics.iter().map(to_lsp_diagnostic).collect();
        {
            let mut open = self.open.lock();
            if !open.contains(&document.uri) {
                open.push(document.uri.clone());
            }
        }
        self.client
            .publish_diagnostics(document.uri.clone(), diagnostics, Some(document.version))
            .await;
    }

    async fn clear(&self, uri: &Url) {
        self.open.lock().retain(|u| u != uri);
        self.client
            .publish_diagnostics(uri.clone(), Vec::new(), None)
            .await;
    }

    async fn clear_all(&self) {
        let uris = std::mem::take(&mut *self.open.lock());
        for uri in uris {
            self.client.publish_diagnostics(uri, Vec::new(), None).await;
        }
    }
}

pub(crate) const ALLOW_ONCE: &str = "Allow";
pub(crate) const ALWAYS_ALLOW: &str = "Always allow";
pub(crate) const BLOCK: &str = "Block";

/// Asks the user through `window/showMessageRequest`.
pub(crate) struct ClientPrompter {
    client: Client,
}

impl ClientPrompter {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

/// Maps the title of the chosen action to a trust choice.
pub(crate) fn trust_choice(title: &str) -> Option<TrustChoice> {
    match title {
        ALLOW_ONCE => Some(TrustChoice::AllowOnce),
        ALWAYS_ALLOW => Some(TrustChoice::AlwaysAllow),
        BLOCK => Some(TrustChoice::Block),
        _ => None,
    }
}

fn action(title: &str) -> MessageActionItem {
    MessageActionItem {
        title: title.to_string(),
        properties: HashMap::new(),
    }
}

#[async_trait]
impl TrustPrompter for ClientPrompter {
    async fn prompt(&self, locations: &[String]) -> Option<TrustChoice> {
        let message = format!(
            "This workspace includes custom rules for mdguard: {}. Allow them to run?",
            locations.join(", ")
        );
        let actions = vec![action(ALLOW_ONCE), action(ALWAYS_ALLOW), action(BLOCK)];
        match self
            .client
            .show_message_request(MessageType::WARNING, message, Some(actions))
            .await
        {
            Ok(choice) => choice.and_then(|item| trust_choice(&item.title)),
            Err(e) => {
                warn!("Trust prompt failed: {}", e);
                None
            }
        }
    }
}

/// Output log lines go to `window/logMessage`; surfacing uses
/// `window/showMessage`.
pub(crate) struct ClientOutput {
    client: Client,
}

impl ClientOutput {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl OutputSink for ClientOutput {
    fn append_line(&self, line: &str) {
        let client = self.client.clone();
        let line = line.to_string();
        tokio::spawn(async move {
            client.log_message(MessageType::LOG, line).await;
        });
    }

    fn show(&self) {
        let client = self.client.clone();
        tokio::spawn(async move {
            client
                .show_message(
                    MessageType::ERROR,
                    "mdguard reported an error; see the output log for details.",
                )
                .await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_titles_map_to_choices() {
        assert_eq!(trust_choice(ALLOW_ONCE), Some(TrustChoice::AllowOnce));
        assert_eq!(trust_choice(ALWAYS_ALLOW), Some(TrustChoice::AlwaysAllow));
        assert_eq!(trust_choice(BLOCK), Some(TrustChoice::Block));
        assert_eq!(trust_choice("Dismiss"), None);
    }
}
