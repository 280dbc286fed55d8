//! mdguard LSP Server
//!
//! Language Server Protocol front end for the mdguard lint orchestration
//! layer. Documents, settings and diagnostics flow through a
//! [`LintScheduler`]; this crate only translates between the protocol and
//! the core types.

use std::sync::Arc;

use tower_lsp::jsonrpc::Result;
use tower_lsp::lsp_types::*;
use tower_lsp::{Client, ClientSocket, LanguageServer, LspService, Server};
use tracing::{info, warn};

use mdguard_core::{
    BuiltinEngine, CustomRuleGate, FileSystem, FileTrustStore, JsonRuleLoader, LintScheduler,
    MemoryTrustStore, NativeFs, NoExtensions, OutputLog, SchedulerParts, TrustStore,
};

mod client;
pub mod config;
pub mod conversion;
mod handler;
mod state;

pub use handler::{ActiveSelectionParams, SOURCE_FIX_ALL_MDGUARD};

use client::{ClientOutput, ClientPrompter, ClientPublisher};
use state::{BackendState, DocumentStore, SharedSettings, SharedState};

/// Custom notification sent by clients when the cursor moves.
pub const ACTIVE_SELECTION_METHOD: &str = "mdguard/didChangeActiveSelection";

/// The LSP backend for mdguard.
#[derive(Debug, Clone)]
pub struct Backend {
    /// LSP client for sending notifications.
    client: Client,
    /// Shared state
    state: SharedState,
}

impl Backend {
    /// Creates a new backend with the given client.
    pub fn new(client: Client) -> Self {
        let fs: Arc<dyn FileSystem> = Arc::new(NativeFs);
        let store: Arc<dyn TrustStore> = match FileTrustStore::default_location() {
            Some(store) => Arc::new(store),
            None => {
                warn!("No config directory; workspace trust is kept in memory");
                Arc::new(MemoryTrustStore::default())
            }
        };
        let output = Arc::new(OutputLog::new(Some(Arc::new(ClientOutput::new(
            client.clone(),
        )))));
        let gate = CustomRuleGate::new(
            Arc::new(ClientPrompter::new(client.clone())),
            store,
            Arc::new(NoExtensions),
            Arc::new(JsonRuleLoader::new(Arc::clone(&fs))),
        )
        .with_output(Arc::clone(&output));

        let documents = Arc::new(DocumentStore::default());
        let settings = Arc::new(SharedSettings::default());
        let scheduler = LintScheduler::new(SchedulerParts {
            engine: Arc::new(BuiltinEngine),
            fs,
            settings: settings.clone(),
            publisher: Arc::new(ClientPublisher::new(client.clone())),
            host: documents.clone(),
            gate: Arc::new(gate),
            output,
        });

        Self {
            client,
            state: Arc::new(BackendState {
                documents,
                settings,
                scheduler: Arc::new(scheduler),
            }),
        }
    }

    /// Handles [`ACTIVE_SELECTION_METHOD`].
    pub async fn did_change_active_selection(&self, params: ActiveSelectionParams) {
        handler::handle_active_selection(&self.state, params).await;
    }
}

#[tower_lsp::async_trait]
impl LanguageServer for Backend {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        handler::handle_initialize(&self.state, params).await
    }

    async fn initialized(&self, _: InitializedParams) {
        handler::handle_initialized(&self.client).await;
    }

    async fn shutdown(&self) -> Result<()> {
        handler::handle_shutdown().await
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        handler::handle_did_open(&self.state, params).await;
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        handler::handle_did_change(&self.state, params).await;
    }

    async fn did_save(&self, params: DidSaveTextDocumentParams) {
        handler::handle_did_save(&self.state, params).await;
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        handler::handle_did_close(&self.state, params).await;
    }

    async fn did_change_configuration(&self, params: DidChangeConfigurationParams) {
        handler::handle_did_change_configuration(&self.state, params).await;
    }

    async fn did_change_watched_files(&self, params: DidChangeWatchedFilesParams) {
        handler::handle_did_change_watched_files(&self.state, params).await;
    }

    async fn code_action(&self, params: CodeActionParams) -> Result<Option<CodeActionResponse>> {
        handler::handle_code_action(&self.state, params).await
    }

    async fn execute_command(
        &self,
        params: ExecuteCommandParams,
    ) -> Result<Option<serde_json::Value>> {
        handler::handle_execute_command(&self.client, &self.state, params).await
    }

    async fn range_formatting(
        &self,
        params: DocumentRangeFormattingParams,
    ) -> Result<Option<Vec<TextEdit>>> {
        handler::handle_range_formatting(&self.state, params).await
    }
}

/// Builds the service with the custom notifications registered.
pub fn build_service() -> (LspService<Backend>, ClientSocket) {
    LspService::build(Backend::new)
        .custom_method(ACTIVE_SELECTION_METHOD, Backend::did_change_active_selection)
        .finish()
}

/// Runs the LSP server over stdio.
pub async fn run() {
    info!("mdguard LSP server starting...");

    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();

    let (service, socket) = build_service();
    Server::new(stdin, stdout, socket).serve(service).await;
}
