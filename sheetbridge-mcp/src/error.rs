//! MCP-specific error types.

use sheetbridge_core::error::{SheetsError, ToolError};

/// Errors that can occur during MCP server operation.
///
/// Each variant carries the message sent to the client verbatim.
#[derive(Debug, thiserror::Error)]
pub enum McpError {
    #[error("Parse error: {message}")]
    ParseError { message: String },

    #[error("{message}")]
    InvalidRequest { message: String },

    #[error("{message}")]
    MethodNotFound { message: String },

    #[error("{message}")]
    InvalidParams { message: String },

    #[error("{message}")]
    InternalError { message: String },

    #[error("Tool execution failed: {message}")]
    ToolError { message: String },

    #[error("Resource not found: {uri}")]
    ResourceNotFound { uri: String },

    #[error("Transport error: {message}")]
    TransportError { message: String },

    #[error("Server not initialized")]
    NotInitialized,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl McpError {
    pub fn method_not_found(method: &str) -> Self {
        McpError::MethodNotFound {
            message: format!("Method not found: {}", method),
        }
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        McpError::InvalidParams {
            message: message.into(),
        }
    }

    /// Convert to a JSON-RPC error code.
    pub fn error_code(&self) -> i64 {
        match self {
            McpError::ParseError { .. } => -32700,
            McpError::InvalidRequest { .. } => -32600,
            McpError::MethodNotFound { .. } => -32601,
            McpError::InvalidParams { .. } => -32602,
            McpError::InternalError { .. } => -32603,
            McpError::ToolError { .. } => -32000,
            McpError::ResourceNotFound { .. } => -32001,
            McpError::TransportError { .. } => -32002,
            McpError::NotInitialized => -32003,
            McpError::Io(_) => -32603,
            McpError::Json(_) => -32700,
        }
    }
}

impl From<SheetsError> for McpError {
    fn from(err: SheetsError) -> Self {
        let message = err.to_string();
        match err {
            SheetsError::Authentication { .. } => McpError::InvalidRequest { message },
            SheetsError::Validation { .. } | SheetsError::NotFound { .. } => {
                McpError::InvalidParams { message }
            }
            SheetsError::RateLimited | SheetsError::Api { .. } | SheetsError::Network { .. } => {
                McpError::InternalError { message }
            }
        }
    }
}

impl From<ToolError> for McpError {
    fn from(err: ToolError) -> Self {
        match err {
            ToolError::NotFound { name } => McpError::MethodNotFound {
                message: format!("Unknown tool: {}", name),
            },
            ToolError::InvalidArguments { .. } => McpError::InvalidParams {
                message: err.to_string(),
            },
            ToolError::Sheets { source, .. } => source.into(),
            ToolError::Timeout { .. } | ToolError::ExecutionFailed { .. } => McpError::ToolError {
                message: err.to_string(),
            },
            ToolError::AlreadyRegistered { .. } => McpError::InternalError {
                message: err.to_string(),
            },
        }
    }
}
