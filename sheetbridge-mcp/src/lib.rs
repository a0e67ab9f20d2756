//! # Sheetbridge MCP
//!
//! Model Context Protocol (MCP) server exposing Google Sheets tools,
//! `sheet://` resources, and analysis prompts over JSON-RPC 2.0.
//!
//! ## Architecture
//!
//! ```text
//! Client <-> Transport (stdio/channel) <-> McpServer <-> RequestHandler
//!                                                        |-- ToolRegistry
//!                                                        |-- SheetResources
//!                                                        +-- prompts
//! ```

pub mod error;
pub mod handlers;
pub mod prompts;
pub mod protocol;
pub mod resources;
pub mod transport;

use error::McpError;
use handlers::RequestHandler;
use protocol::{IncomingMessage, JsonRpcResponse, RequestId, ServerInfo};
use resources::SheetResources;
use sheetbridge_core::config::ServerConfig;
use sheetbridge_tools::registry::ToolRegistry;
use sheetbridge_tools::sheets::SheetsService;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use transport::Transport;

const FALLBACK_ERROR: &str =
    r#"{"jsonrpc":"2.0","id":null,"error":{"code":-32603,"message":"Internal error"}}"#;

/// Methods that may wait on Google (and so on a pending browser login).
/// These run on their own task; everything else is answered in order.
const CONCURRENT_METHODS: &[&str] = &["tools/call", "resources/read"];

/// The MCP server that processes JSON-RPC messages over a transport.
///
/// `tools/call` and `resources/read` are spawned so a request stuck behind an
/// interactive login does not block `ping` or a second call joining the same
/// login. Their responses are written as they complete, not in arrival order.
pub struct McpServer {
    handler: RequestHandler,
}

impl McpServer {
    pub fn new(
        tool_registry: Arc<ToolRegistry>,
        service: Arc<SheetsService>,
        server: &ServerConfig,
    ) -> Self {
        let handler = RequestHandler::new(
            tool_registry,
            SheetResources::new(service),
            ServerInfo {
                name: server.name.clone(),
                version: server.version.clone(),
            },
        );
        Self { handler }
    }

    /// Process messages until the transport reaches EOF or fails.
    ///
    /// On EOF, requests still running are allowed to finish and their
    /// responses are written before the transport is closed.
    pub async fn run<T: Transport>(&self, transport: &mut T) -> Result<(), McpError> {
        info!("MCP server starting");
        let mut in_flight: JoinSet<Option<JsonRpcResponse>> = JoinSet::new();

        loop {
            tokio::select! {
                Some(joined) = in_flight.join_next() => {
                    if let Some(response) = joined_response(joined) {
                        write_response(transport, &response).await?;
                    }
                }
                read = transport.read_message() => {
                    let message = match read {
                        Ok(Some(msg)) => msg,
                        Ok(None) => {
                            info!("Transport closed (EOF), shutting down MCP server");
                            break;
                        }
                        Err(e @ McpError::ParseError { .. }) => {
                            warn!(error = %e, "Unreadable MCP message");
                            let response = JsonRpcResponse::from_mcp_error(RequestId::Null, e);
                            write_response(transport, &response).await?;
                            continue;
                        }
                        Err(e) => {
                            error!(error = %e, "Transport read error");
                            in_flight.abort_all();
                            break;
                        }
                    };

                    if message.trim().is_empty() {
                        continue;
                    }

                    let incoming = match parse_message(&message) {
                        Ok(incoming) => incoming,
                        Err(e) => {
                            warn!(error = %e, "Rejected MCP message");
                            let response = JsonRpcResponse::from_mcp_error(RequestId::Null, e);
                            write_response(transport, &response).await?;
                            continue;
                        }
                    };

                    let concurrent = incoming.id.is_some()
                        && CONCURRENT_METHODS.contains(&incoming.method.as_str());
                    if concurrent {
                        debug!(method = %incoming.method, "Spawning request");
                        let handler = self.handler.clone();
                        in_flight.spawn(async move { handle_incoming(&handler, incoming).await });
                    } else if let Some(response) = handle_incoming(&self.handler, incoming).await {
                        write_response(transport, &response).await?;
                    }
                }
            }
        }

        while let Some(joined) = in_flight.join_next().await {
            if let Some(response) = joined_response(joined) {
                write_response(transport, &response).await?;
            }
        }

        transport.close().await?;
        info!("MCP server stopped");
        Ok(())
    }

    /// Process a single incoming JSON-RPC message inline.
    /// Returns `Some(response)` for requests, `None` for notifications.
    async fn process_message(&self, raw: &str) -> Result<Option<JsonRpcResponse>, McpError> {
        let incoming = parse_message(raw)?;
        Ok(handle_incoming(&self.handler, incoming).await)
    }

    pub fn is_initialized(&self) -> bool {
        self.handler.is_initialized()
    }
}

fn parse_message(raw: &str) -> Result<IncomingMessage, McpError> {
    let incoming: IncomingMessage = serde_json::from_str(raw).map_err(|e| McpError::ParseError {
        message: format!("Invalid JSON-RPC message: {}", e),
    })?;

    if incoming.jsonrpc != "2.0" {
        return Err(McpError::InvalidRequest {
            message: format!("Expected jsonrpc version 2.0, got: {}", incoming.jsonrpc),
        });
    }
    Ok(incoming)
}

async fn handle_incoming(
    handler: &RequestHandler,
    incoming: IncomingMessage,
) -> Option<JsonRpcResponse> {
    let IncomingMessage {
        id, method, params, ..
    } = incoming;
    match id {
        None => {
            debug!(method = %method, "Processing notification");
            if let Err(e) = handler.route(&method, params).await {
                warn!(method = %method, error = %e, "Notification handler error");
            }
            None
        }
        Some(id) => {
            debug!(method = %method, "Processing request");
            let response = match handler.route(&method, params).await {
                Ok(result) => JsonRpcResponse::success(id, result),
                Err(e) => JsonRpcResponse::from_mcp_error(id, e),
            };
            Some(response)
        }
    }
}

/// Response of a finished request task. A panicked task has lost its
/// request id, so nothing can be answered for it.
fn joined_response(
    joined: Result<Option<JsonRpcResponse>, tokio::task::JoinError>,
) -> Option<JsonRpcResponse> {
    joined
        .inspect_err(|e| {
            if !e.is_cancelled() {
                error!(error = %e, "MCP request task failed");
            }
        })
        .ok()
        .flatten()
}

async fn write_response<T: Transport>(
    transport: &mut T,
    response: &JsonRpcResponse,
) -> Result<(), McpError> {
    let json = serde_json::to_string(response).unwrap_or_else(|e| {
        error!(error = %e, "Failed to serialize MCP response");
        FALLBACK_ERROR.to_string()
    });
    transport.write_message(&json).await
}
