//! End-to-end MCP sessions over an in-process transport, with the Google
//! APIs replaced by a local mock and a stored token standing in for login.

use axum::Router;
use axum::http::{StatusCode, Uri};
use axum::response::IntoResponse;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use std::sync::Arc;
use tempfile::TempDir;

use sheetbridge_core::config::{GoogleApiConfig, OAuthConfig, ServerConfig};
use sheetbridge_core::oauth::{Authenticator, TokenSet, TokenStore};
use sheetbridge_mcp::McpServer;
use sheetbridge_mcp::protocol::{JsonRpcResponse, MCP_PROTOCOL_VERSION, RequestId};
use sheetbridge_mcp::transport::{ChannelTransport, Transport};
use sheetbridge_tools::register_sheet_tools;
use sheetbridge_tools::registry::ToolRegistry;
use sheetbridge_tools::sheets::SheetsService;

/// Sheets API stand-in: spreadsheet `abc` exists, everything else is 404.
async fn google(uri: Uri) -> impl IntoResponse {
    let path = uri.path();
    if !path.starts_with("/v4/spreadsheets/abc") {
        return (
            StatusCode::NOT_FOUND,
            axum::Json(json!({ "error": { "code": 404, "message": "Requested entity was not found." } })),
        );
    }
    if path.contains("/values/") {
        (
            StatusCode::OK,
            axum::Json(json!({ "values": [["Region", "Sales"], ["North", 120]] })),
        )
    } else {
        (
            StatusCode::OK,
            axum::Json(json!({ "sheets": [{ "properties": { "title": "Q1" } }] })),
        )
    }
}

struct Session {
    client: ChannelTransport,
    server: tokio::task::JoinHandle<()>,
    next_id: i64,
    _dir: TempDir,
}

impl Session {
    async fn start() -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, Router::new().fallback(google))
                .await
                .unwrap();
        });

        let dir = TempDir::new().unwrap();
        let token_path = dir.path().join("tokens.json");
        TokenStore::new(&token_path)
            .save(&TokenSet::new("ya29.session").with_expiry_date(i64::MAX / 2))
            .unwrap();

        let oauth = OAuthConfig {
            client_id: "test-client".into(),
            token_path: Some(token_path),
            ..Default::default()
        };
        let google = GoogleApiConfig {
            sheets_base_url: format!("http://{}/v4", addr),
            drive_base_url: format!("http://{}/drive/v3", addr),
            ..Default::default()
        };
        let auth = Authenticator::new(oauth, reqwest::Client::new());
        let service = Arc::new(SheetsService::new(auth, &google));
        let mut registry = ToolRegistry::new();
        register_sheet_tools(&mut registry, service.clone()).unwrap();

        let server = McpServer::new(Arc::new(registry), service, &ServerConfig::default());
        let (client, mut server_transport) = ChannelTransport::pair(16);
        let server = tokio::spawn(async move {
            server.run(&mut server_transport).await.unwrap();
        });

        Self {
            client,
            server,
            next_id: 0,
            _dir: dir,
        }
    }

    async fn request(&mut self, method: &str, params: Value) -> JsonRpcResponse {
        self.next_id += 1;
        let message = json!({
            "jsonrpc": "2.0",
            "id": self.next_id,
            "method": method,
            "params": params,
        });
        self.client.write_message(&message.to_string()).await.unwrap();
        let raw = self.client.read_message().await.unwrap().unwrap();
        let response: JsonRpcResponse = serde_json::from_str(&raw).unwrap();
        assert_eq!(response.id, RequestId::Number(self.next_id));
        response
    }

    async fn notify(&mut self, method: &str) {
        let message = json!({ "jsonrpc": "2.0", "method": method });
        self.client.write_message(&message.to_string()).await.unwrap();
    }

    async fn initialize(&mut self) {
        let resp = self
            .request(
                "initialize",
                json!({
                    "protocolVersion": MCP_PROTOCOL_VERSION,
                    "capabilities": {},
                    "clientInfo": { "name": "integration-test" }
                }),
            )
            .await;
        assert!(resp.error.is_none());
        self.notify("notifications/initialized").await;
    }

    async fn finish(self) {
        drop(self.client);
        self.server.await.unwrap();
    }
}

#[tokio::test]
async fn test_requests_before_initialize_are_rejected() {
    let mut session = Session::start().await;
    let resp = session.request("tools/list", json!({})).await;
    assert_eq!(resp.error.unwrap().code, -32003);
    session.finish().await;
}

#[tokio::test]
async fn test_tool_call_returns_pretty_json_text() {
    let mut session = Session::start().await;
    session.initialize().await;

    let listed = session.request("tools/list", json!({})).await;
    assert_eq!(listed.result.unwrap()["tools"].as_array().unwrap().len(), 13);

    let resp = session
        .request(
            "tools/call",
            json!({ "name": "get_sheet_data", "arguments": { "sheetId": "abc", "range": "A1:B2" } }),
        )
        .await;
    let result = resp.result.unwrap();
    assert_eq!(result["content"][0]["type"], "text");
    let text = result["content"][0]["text"].as_str().unwrap();
    assert!(text.contains('\n'), "expected pretty-printed JSON: {}", text);
    let data: Value = serde_json::from_str(text).unwrap();
    assert_eq!(
        data,
        json!({
            "sheetId": "abc",
            "sheetName": "Q1",
            "range": "A1:B2",
            "values": [["Region", "Sales"], ["North", "120"]]
        })
    );
    assert!(result.get("isError").is_none());

    session.finish().await;
}

#[tokio::test]
async fn test_remote_not_found_is_invalid_params() {
    let mut session = Session::start().await;
    session.initialize().await;

    let resp = session
        .request(
            "tools/call",
            json!({ "name": "get_spreadsheet_info", "arguments": { "sheetId": "zzz" } }),
        )
        .await;
    let error = resp.error.unwrap();
    assert_eq!(error.code, -32602);
    assert_eq!(error.message, "Spreadsheet with ID 'zzz' not found");

    session.finish().await;
}

#[tokio::test]
async fn test_sheet_resource_read() {
    let mut session = Session::start().await;
    session.initialize().await;

    let resp = session
        .request("resources/read", json!({ "uri": "sheet://abc" }))
        .await;
    let contents = &resp.result.unwrap()["contents"];
    assert_eq!(contents[0]["uri"], "sheet://abc");
    assert_eq!(contents[0]["mimeType"], "application/json");
    let data: Value = serde_json::from_str(contents[0]["text"].as_str().unwrap()).unwrap();
    assert_eq!(data["range"], "A1:Z1000");
    assert_eq!(data["sheetName"], "Q1");

    let bad = session
        .request("resources/read", json!({ "uri": "gdrive://abc" }))
        .await;
    assert_eq!(bad.error.unwrap().code, -32600);

    session.finish().await;
}

#[tokio::test]
async fn test_prompt_and_unknown_method() {
    let mut session = Session::start().await;
    session.initialize().await;

    let resp = session
        .request(
            "prompts/get",
            json!({ "name": "create_report_template", "arguments": { "title": "Weekly" } }),
        )
        .await;
    let text = resp.result.unwrap()["messages"][0]["content"]["text"]
        .as_str()
        .unwrap()
        .to_string();
    assert!(text.contains("titled \"Weekly\""));

    let resp = session.request("completion/complete", json!({})).await;
    assert_eq!(resp.error.unwrap().code, -32601);

    session.finish().await;
}
