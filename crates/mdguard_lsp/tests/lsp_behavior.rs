mod common;

use std::time::Duration;

use common::{recv_until, send_msg};
use serde_json::{Value, json};
use tokio::io::{DuplexStream, ReadHalf, WriteHalf};
use tower_lsp::Server;

const URI: &str = "untitled:Untitled-1";

struct Session {
    reader: ReadHalf<DuplexStream>,
    writer: WriteHalf<DuplexStream>,
}

impl Session {
    async fn start() -> Self {
        let (client, server) = tokio::io::duplex(64 * 1024);
        let (server_read, server_write) = tokio::io::split(server);
        let (service, socket) = mdguard_lsp::build_service();
        tokio::spawn(Server::new(server_read, server_write, socket).serve(service));

        let (reader, writer) = tokio::io::split(client);
        let mut session = Self { reader, writer };
        session
            .request(1, "initialize", json!({ "capabilities": {} }))
            .await;
        session.notify("initialized", json!({})).await;
        session
    }

    async fn notify(&mut self, method: &str, params: Value) {
        let msg = json!({ "jsonrpc": "2.0", "method": method, "params": params });
        send_msg(&mut self.writer, &msg.to_string()).await;
    }

    async fn request(&mut self, id: u64, method: &str, params: Value) -> Value {
        let msg = json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params });
        send_msg(&mut self.writer, &msg.to_string()).await;
        recv_until(&mut self.reader, &mut self.writer, |msg| {
            (msg.get("method").is_none() && msg["id"] == json!(id)).then(|| msg["result"].clone())
        })
        .await
    }

    async fn next_diagnostics(&mut self) -> Vec<Value> {
        let wait = recv_until(&mut self.reader, &mut self.writer, |msg| {
            (msg["method"] == "textDocument/publishDiagnostics" && msg["params"]["uri"] == URI)
                .then(|| msg["params"]["diagnostics"].as_array().cloned().unwrap_or_default())
        });
        tokio::time::timeout(Duration::from_secs(5), wait)
            .await
            .expect("no diagnostics published")
    }

    /// Runs the toggle command; returns its result and the diagnostics
    /// published while it ran.
    async fn toggle(&mut self, id: u64) -> (Value, Vec<Value>) {
        let msg = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": "workspace/executeCommand",
            "params": { "command": "mdguard.toggleLinting", "arguments": [] },
        });
        send_msg(&mut self.writer, &msg.to_string()).await;

        let mut result = None;
        let mut published = None;
        recv_until(&mut self.reader, &mut self.writer, |msg| {
            if msg["method"] == "textDocument/publishDiagnostics" && msg["params"]["uri"] == URI {
                published = msg["params"]["diagnostics"].as_array().cloned();
            } else if msg.get("method").is_none() && msg["id"] == json!(id) {
                result = Some(msg["result"].clone());
            }
            (result.is_some() && published.is_some()).then_some(())
        })
        .await;
        (result.unwrap(), published.unwrap())
    }

    async fn open(&mut self, text: &str) {
        self.notify(
            "textDocument/didOpen",
            json!({
                "textDocument": {
                    "uri": URI,
                    "languageId": "markdown",
                    "version": 1,
                    "text": text,
                }
            }),
        )
        .await;
    }
}

#[tokio::test]
async fn initialize_advertises_fix_capabilities() {
    let (client, server) = tokio::io::duplex(64 * 1024);
    let (server_read, server_write) = tokio::io::split(server);
    let (service, socket) = mdguard_lsp::build_service();
    tokio::spawn(Server::new(server_read, server_write, socket).serve(service));
    let (mut reader, mut writer) = tokio::io::split(client);

    let msg = json!({ "jsonrpc": "2.0", "id": 1, "method": "initialize", "params": { "capabilities": {} } });
    send_msg(&mut writer, &msg.to_string()).await;
    let result = recv_until(&mut reader, &mut writer, |msg| {
        (msg["id"] == json!(1)).then(|| msg["result"].clone())
    })
    .await;

    let capabilities = &result["capabilities"];
    assert_eq!(capabilities["textDocumentSync"]["change"], json!(1));
    assert_eq!(capabilities["documentRangeFormattingProvider"], json!(true));
    assert!(
        capabilities["executeCommandProvider"]["commands"]
            .as_array()
            .unwrap()
            .contains(&json!("mdguard.toggleLinting"))
    );
    assert_eq!(result["serverInfo"]["name"], "mdguard-lsp");
}

#[tokio::test]
async fn did_open_publishes_violations() {
    let mut session = Session::start().await;
    session.open("#  Title\n").await;

    let diagnostics = session.next_diagnostics().await;
    assert_eq!(diagnostics.len(), 1);
    let diagnostic = &diagnostics[0];
    assert_eq!(diagnostic["code"], "MD019");
    assert_eq!(diagnostic["source"], "mdguard");
    assert_eq!(diagnostic["severity"], json!(2));
    assert_eq!(diagnostic["range"]["start"], json!({ "line": 0, "character": 0 }));
    assert!(
        diagnostic["message"]
            .as_str()
            .unwrap()
            .starts_with("MD019/no-multiple-space-atx: ")
    );
}

#[tokio::test]
async fn code_actions_fix_the_violation() {
    let mut session = Session::start().await;
    session.open("#  Title\n").await;
    let diagnostics = session.next_diagnostics().await;

    let actions = session
        .request(
            2,
            "textDocument/codeAction",
            json!({
                "textDocument": { "uri": URI },
                "range": { "start": { "line": 0, "character": 0 }, "end": { "line": 0, "character": 0 } },
                "context": { "diagnostics": diagnostics },
            }),
        )
        .await;
    let actions = actions.as_array().unwrap();
    let titles: Vec<&str> = actions
        .iter()
        .map(|a| a["title"].as_str().unwrap())
        .collect();

    assert!(titles.contains(&"Fix this violation of MD019/no-multiple-space-atx"));
    assert!(titles.contains(&"Fix all violations of MD019/no-multiple-space-atx in the document"));
    assert!(titles.contains(&"More information about MD019"));
    assert!(titles.contains(&"Learn how to configure mdguard rules"));
    assert!(titles.contains(&"Fix all supported mdguard violations in the document"));

    let fix = &actions[0];
    let edits = &fix["edit"]["changes"][URI];
    assert_eq!(edits[0]["newText"], "# Title");
    assert_eq!(
        edits[0]["range"],
        json!({ "start": { "line": 0, "character": 0 }, "end": { "line": 0, "character": 8 } })
    );
}

#[tokio::test]
async fn range_formatting_applies_fixes_on_requested_lines() {
    let mut session = Session::start().await;
    session.open("#  One\n\n#  Two\n").await;
    session.next_diagnostics().await;

    let edits = session
        .request(
            2,
            "textDocument/rangeFormatting",
            json!({
                "textDocument": { "uri": URI },
                "range": { "start": { "line": 0, "character": 0 }, "end": { "line": 0, "character": 3 } },
                "options": { "tabSize": 4, "insertSpaces": true },
            }),
        )
        .await;
    let edits = edits.as_array().unwrap();
    assert_eq!(edits.len(), 1);
    assert_eq!(edits[0]["newText"], "# One\n\n#  Two\n");
}

#[tokio::test]
async fn toggling_clears_and_restores_diagnostics() {
    let mut session = Session::start().await;
    session.open("#  Title\n").await;
    assert_eq!(session.next_diagnostics().await.len(), 1);

    let (enabled, diagnostics) = session.toggle(2).await;
    assert_eq!(enabled, json!(false));
    assert!(diagnostics.is_empty());

    let (enabled, diagnostics) = session.toggle(3).await;
    assert_eq!(enabled, json!(true));
    assert_eq!(diagnostics.len(), 1);
}

#[tokio::test]
async fn closing_clears_diagnostics() {
    let mut session = Session::start().await;
    session.open("#  Title\n").await;
    assert_eq!(session.next_diagnostics().await.len(), 1);

    session
        .notify("textDocument/didClose", json!({ "textDocument": { "uri": URI } }))
        .await;
    assert!(session.next_diagnostics().await.is_empty());
}
