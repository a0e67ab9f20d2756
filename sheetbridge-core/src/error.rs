//! Error types for the Sheetbridge core.
//!
//! Uses `thiserror` for public API error types with structured variants
//! covering the OAuth flow, token persistence, configuration, the Google
//! APIs, and tools.

use std::path::PathBuf;

/// Top-level error type for the Sheetbridge core library.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("Token store error: {0}")]
    Store(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Failures inside a single authentication attempt.
///
/// These carry provider detail and stay inside the core; callers of the
/// authenticator only ever see [`AuthError`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OAuthError {
    #[error("OAuth authorization denied: {reason}")]
    AuthorizationDenied { reason: String },

    #[error("Authorization code not received")]
    CodeNotReceived,

    #[error("CSRF validation failed: state mismatch")]
    StateMismatch,

    #[error("Failed to bind callback listener on {addr}: {message}")]
    Bind { addr: String, message: String },

    #[error("OAuth callback timed out after {secs} seconds")]
    CallbackTimeout { secs: u64 },

    #[error("OAuth flow cancelled")]
    Cancelled,

    #[error("Token exchange failed: {message}")]
    Exchange { message: String },

    #[error("Token refresh rejected: {message}")]
    RefreshRejected { message: String },

    #[error("Invalid token response: {message}")]
    InvalidTokenResponse { message: String },

    #[error("Invalid authorization URL: {message}")]
    InvalidUrl { message: String },
}

impl OAuthError {
    /// Whether this failure came from the local callback checks (denial,
    /// missing code, CSRF) rather than from the network or the provider.
    pub fn is_callback_rejection(&self) -> bool {
        matches!(
            self,
            OAuthError::AuthorizationDenied { .. }
                | OAuthError::CodeNotReceived
                | OAuthError::StateMismatch
        )
    }
}

/// Errors surfaced by the authenticator to API callers.
///
/// Deliberately coarse: joined callers all receive the same value and no
/// provider-internal detail crosses this boundary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Failed to authenticate with Google APIs")]
    AuthenticationFailed,

    #[error("OAuth client ID is not configured")]
    MissingClientId,
}

/// Errors from the on-disk token store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Failed to write token file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize tokens: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Errors from the configuration system.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Configuration load error: {0}")]
    Load(#[from] Box<figment::Error>),
}

/// Errors from the Google Sheets and Drive REST APIs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SheetsError {
    #[error("{message}")]
    Authentication { message: String },

    #[error("{message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    #[error("{}", not_found_message(.resource, .id))]
    NotFound { resource: String, id: Option<String> },

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("An unexpected error occurred while communicating with Google APIs (HTTP {status})")]
    Api { status: u16, message: String },

    #[error("Network error talking to Google APIs: {message}")]
    Network { message: String },
}

fn not_found_message(resource: &str, id: &Option<String>) -> String {
    match id {
        Some(id) => format!("{} with ID '{}' not found", resource, id),
        None => format!("{} not found", resource),
    }
}

impl SheetsError {
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        SheetsError::Validation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Classify a non-success HTTP status from Google.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        match status {
            401 | 403 => SheetsError::Authentication {
                message: "Invalid or expired credentials".to_string(),
            },
            404 => SheetsError::NotFound {
                resource: "Resource".to_string(),
                id: None,
            },
            429 => SheetsError::RateLimited,
            400..=499 => SheetsError::Validation {
                message: "Invalid request to Google API".to_string(),
                field: None,
            },
            _ => SheetsError::Api {
                status,
                message: message.into(),
            },
        }
    }
}

impl From<AuthError> for SheetsError {
    fn from(err: AuthError) -> Self {
        SheetsError::Authentication {
            message: err.to_string(),
        }
    }
}

/// Errors from tool registration and execution.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Tool not found: {name}")]
    NotFound { name: String },

    #[error("Tool already registered: {name}")]
    AlreadyRegistered { name: String },

    #[error("Invalid arguments for tool '{name}': {reason}")]
    InvalidArguments { name: String, reason: String },

    #[error("Tool '{name}' execution failed: {message}")]
    ExecutionFailed { name: String, message: String },

    #[error("Tool '{name}' timed out after {timeout_secs}s")]
    Timeout { name: String, timeout_secs: u64 },

    #[error("Tool '{name}' failed: {source}")]
    Sheets {
        name: String,
        #[source]
        source: SheetsError,
    },
}

/// Convenience type alias for results using [`BridgeError`].
pub type Result<T> = std::result::Result<T, BridgeError>;
