//! # Sheetbridge Core
//!
//! Core library for the Sheetbridge Google Sheets MCP server.
//! Provides configuration, the error taxonomy, shared tool types, atomic
//! owner-only persistence, and the OAuth 2.0 + PKCE token lifecycle.

pub mod config;
pub mod error;
pub mod oauth;
pub mod persistence;
pub mod types;

// Re-export commonly used types at the crate root.
pub use config::{BridgeConfig, GoogleApiConfig, LoggingConfig, OAuthConfig, ServerConfig};
pub use error::{
    AuthError, BridgeError, ConfigError, OAuthError, Result, SheetsError, StoreError, ToolError,
};
pub use oauth::{AuthStatus, Authenticator, AuthorizedClient, TokenSet, TokenStore};
pub use types::{RiskLevel, ToolDefinition, ToolOutput};
