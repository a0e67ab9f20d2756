//! Configuration system for Sheetbridge.
//!
//! Uses `figment` for layered configuration: defaults -> user config file ->
//! explicit config file -> environment. The user config lives at
//! `~/.config/sheetbridge/config.toml` (platform equivalent via `directories`).
//!
//! Environment variables use the `SHEETBRIDGE_` prefix with `__` as the nesting
//! separator (`SHEETBRIDGE_OAUTH__CLIENT_ID`). The flat `GOOGLE_CLIENT_ID`,
//! `GOOGLE_CLIENT_SECRET`, `GOOGLE_REDIRECT_URI` and `PORT` variables are also
//! accepted so existing deployments keep working.

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;

/// Google's OAuth 2.0 authorization endpoint.
pub const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
/// Google's OAuth 2.0 token endpoint.
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
/// Read/write access to spreadsheets.
pub const SCOPE_SPREADSHEETS: &str = "https://www.googleapis.com/auth/spreadsheets";
/// Drive access limited to files created or opened by this app.
pub const SCOPE_DRIVE_FILE: &str = "https://www.googleapis.com/auth/drive.file";

const LEGACY_ENV_KEYS: [&str; 4] = [
    "GOOGLE_CLIENT_ID",
    "GOOGLE_CLIENT_SECRET",
    "GOOGLE_REDIRECT_URI",
    "PORT",
];

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub oauth: OAuthConfig,
    #[serde(default)]
    pub google: GoogleApiConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Identity reported to MCP clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub name: String,
    pub version: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "gsheets-server".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// OAuth client and callback listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthConfig {
    /// OAuth client ID from the Google Cloud console.
    pub client_id: String,
    /// OAuth client secret. Desktop clients still receive one from Google.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    pub authorization_url: String,
    pub token_url: String,
    pub scopes: Vec<String>,
    /// Interface the callback listener binds to. Must be a loopback IP.
    pub callback_host: String,
    /// Fixed port for the callback listener; must match the registered redirect URI.
    pub callback_port: u16,
    pub callback_path: String,
    /// Overrides the redirect URI derived from port and path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_uri: Option<String>,
    /// Abandon a pending flow if no callback arrives in time. Unset waits forever.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_timeout_secs: Option<u64>,
    /// Where tokens are persisted. Defaults to `<config_dir>/tokens.json`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_path: Option<PathBuf>,
    /// Treat access tokens as expired this many seconds early.
    pub expiry_skew_secs: u64,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: None,
            authorization_url: GOOGLE_AUTH_URL.to_string(),
            token_url: GOOGLE_TOKEN_URL.to_string(),
            scopes: vec![SCOPE_SPREADSHEETS.to_string(), SCOPE_DRIVE_FILE.to_string()],
            callback_host: "127.0.0.1".to_string(),
            callback_port: 3000,
            callback_path: "/oauth/callback".to_string(),
            redirect_uri: None,
            callback_timeout_secs: None,
            token_path: None,
            expiry_skew_secs: 0,
        }
    }
}

impl OAuthConfig {
    /// The redirect URI sent to the provider.
    pub fn redirect_uri(&self) -> String {
        self.redirect_uri_for(self.callback_port)
    }

    /// The redirect URI for a listener actually bound to `port`.
    ///
    /// Differs from [`redirect_uri`](Self::redirect_uri) only when
    /// `callback_port` is 0 and the OS picked the port.
    pub fn redirect_uri_for(&self, port: u16) -> String {
        match &self.redirect_uri {
            Some(uri) => uri.clone(),
            None => format!("http://localhost:{}{}", port, self.callback_path),
        }
    }

    pub fn callback_timeout(&self) -> Option<Duration> {
        self.callback_timeout_secs.map(Duration::from_secs)
    }

    /// Resolved token file location.
    pub fn token_path(&self) -> PathBuf {
        self.token_path.clone().unwrap_or_else(default_token_path)
    }

    /// Check that the settings can drive a login flow.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.client_id.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "oauth.client_id".to_string(),
            });
        }
        if !self.callback_path.starts_with('/') {
            return Err(ConfigError::Invalid {
                message: format!(
                    "oauth.callback_path must start with '/', got '{}'",
                    self.callback_path
                ),
            });
        }
        match self.callback_host.parse::<std::net::IpAddr>() {
            Ok(ip) if ip.is_loopback() => {}
            _ => {
                return Err(ConfigError::Invalid {
                    message: format!(
                        "oauth.callback_host must be a loopback address, got '{}'",
                        self.callback_host
                    ),
                });
            }
        }
        if url::Url::parse(&self.authorization_url).is_err() {
            return Err(ConfigError::Invalid {
                message: format!(
                    "oauth.authorization_url is not a valid URL: {}",
                    self.authorization_url
                ),
            });
        }
        Ok(())
    }
}

/// Google REST endpoints used by the spreadsheet tools.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleApiConfig {
    pub sheets_base_url: String,
    pub drive_base_url: String,
    pub request_timeout_secs: u64,
}

impl Default for GoogleApiConfig {
    fn default() -> Self {
        Self {
            sheets_base_url: "https://sheets.googleapis.com/v4".to_string(),
            drive_base_url: "https://www.googleapis.com/drive/v3".to_string(),
            request_timeout_secs: 30,
        }
    }
}

impl GoogleApiConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Log output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive for stderr output.
    pub level: String,
    /// Also write JSON logs to a daily rolling file in the data directory.
    pub json_file: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_file: true,
        }
    }
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("dev", "sheetbridge", "sheetbridge")
}

/// Per-user configuration directory (`~/.config/sheetbridge` on Linux).
pub fn config_dir() -> PathBuf {
    project_dirs()
        .map(|d| d.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".sheetbridge"))
}

/// Per-user data directory, used for log files.
pub fn data_dir() -> PathBuf {
    project_dirs()
        .map(|d| d.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".sheetbridge"))
}

/// Default location of the persisted token file.
pub fn default_token_path() -> PathBuf {
    config_dir().join("tokens.json")
}

/// Environment provider for the flat variable names used by older deployments.
fn legacy_env() -> Env {
    Env::raw().only(&LEGACY_ENV_KEYS).map(|key| {
        let mapped = match key.as_str().to_ascii_uppercase().as_str() {
            "GOOGLE_CLIENT_ID" => "oauth.client_id",
            "GOOGLE_CLIENT_SECRET" => "oauth.client_secret",
            "GOOGLE_REDIRECT_URI" => "oauth.redirect_uri",
            "PORT" => "oauth.callback_port",
            _ => return key.into(),
        };
        mapped.into()
    })
}

/// Build the layered figment without extracting it.
///
/// Priority (highest to lowest):
/// 1. `SHEETBRIDGE_*` environment variables
/// 2. Legacy `GOOGLE_*` / `PORT` variables
/// 3. Explicit config file (`--config`)
/// 4. User config (`<config_dir>/config.toml`)
/// 5. Built-in defaults
pub fn figment(explicit: Option<&Path>) -> Figment {
    let mut figment = Figment::from(Serialized::defaults(BridgeConfig::default()));

    let user_config = config_dir().join("config.toml");
    if user_config.exists() {
        figment = figment.merge(Toml::file(&user_config));
    }

    if let Some(path) = explicit {
        figment = figment.merge(Toml::file(path));
    }

    figment
        .merge(legacy_env())
        .merge(Env::prefixed("SHEETBRIDGE_").split("__"))
}

/// Load configuration from all layers.
pub fn load_config(explicit: Option<&Path>) -> Result<BridgeConfig, ConfigError> {
    figment(explicit)
        .extract()
        .map_err(|e| ConfigError::Load(Box::new(e)))
}

/// Check whether a user-level configuration file exists.
pub fn config_exists() -> bool {
    config_dir().join("config.toml").exists()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config() {
        let config = BridgeConfig::default();
        assert_eq!(config.server.name, "gsheets-server");
        assert_eq!(config.oauth.callback_host, "127.0.0.1");
        assert_eq!(config.oauth.callback_port, 3000);
        assert_eq!(config.oauth.callback_path, "/oauth/callback");
        assert_eq!(
            config.oauth.scopes,
            vec![SCOPE_SPREADSHEETS.to_string(), SCOPE_DRIVE_FILE.to_string()]
        );
        assert!(config.oauth.callback_timeout().is_none());
        assert_eq!(config.google.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_redirect_uri_derived_from_port_and_path() {
        let config = OAuthConfig {
            callback_port: 4123,
            ..Default::default()
        };
        assert_eq!(config.redirect_uri(), "http://localhost:4123/oauth/callback");
    }

    #[test]
    fn test_redirect_uri_override() {
        let config = OAuthConfig {
            redirect_uri: Some("http://127.0.0.1:9999/cb".into()),
            ..Default::default()
        };
        assert_eq!(config.redirect_uri(), "http://127.0.0.1:9999/cb");
    }

    #[test]
    fn test_validate_requires_client_id() {
        let config = OAuthConfig::default();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::MissingField { ref field } if field == "oauth.client_id"));

        let config = OAuthConfig {
            client_id: "abc.apps.googleusercontent.com".into(),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_relative_callback_path() {
        let config = OAuthConfig {
            client_id: "id".into(),
            callback_path: "oauth/callback".into(),
            ..Default::default()
        };
        assert!(matches!(
            config.validate().unwrap_err(),
            ConfigError::Invalid { .. }
        ));
    }

    #[test]
    fn test_validate_rejects_non_loopback_callback_host() {
        for host in ["0.0.0.0", "192.168.1.20", "::", "localhost", ""] {
            let config = OAuthConfig {
                client_id: "id".into(),
                callback_host: host.into(),
                ..Default::default()
            };
            assert!(
                matches!(config.validate(), Err(ConfigError::Invalid { .. })),
                "{host} should be rejected"
            );
        }

        for host in ["127.0.0.1", "127.0.0.2", "::1"] {
            let config = OAuthConfig {
                client_id: "id".into(),
                callback_host: host.into(),
                ..Default::default()
            };
            assert!(config.validate().is_ok(), "{host} should be accepted");
        }
    }

    #[test]
    fn test_token_path_override() {
        let config = OAuthConfig {
            token_path: Some(PathBuf::from("/tmp/custom/tokens.json")),
            ..Default::default()
        };
        assert_eq!(config.token_path(), PathBuf::from("/tmp/custom/tokens.json"));
        assert!(default_token_path().ends_with("tokens.json"));
    }

    #[test]
    fn test_toml_layer_overrides_defaults() {
        let figment = Figment::from(Serialized::defaults(BridgeConfig::default())).merge(
            Toml::string(
                r#"
                [oauth]
                client_id = "from-toml"
                callback_port = 8123
                callback_timeout_secs = 90

                [logging]
                level = "debug"
                "#,
            ),
        );
        let config: BridgeConfig = figment.extract().unwrap();
        assert_eq!(config.oauth.client_id, "from-toml");
        assert_eq!(config.oauth.callback_port, 8123);
        assert_eq!(
            config.oauth.callback_timeout(),
            Some(Duration::from_secs(90))
        );
        assert_eq!(config.logging.level, "debug");
        // Untouched sections keep their defaults.
        assert_eq!(config.oauth.callback_path, "/oauth/callback");
        assert_eq!(config.server.name, "gsheets-server");
    }

    #[test]
    fn test_explicit_file_layer() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("bridge.toml");
        std::fs::write(
            &path,
            "[oauth]\nclient_id = \"file-client\"\ntoken_path = \"/tmp/t.json\"\n",
        )
        .unwrap();

        let config: BridgeConfig = Figment::from(Serialized::defaults(BridgeConfig::default()))
            .merge(Toml::file(&path))
            .extract()
            .unwrap();
        assert_eq!(config.oauth.client_id, "file-client");
        assert_eq!(config.oauth.token_path(), PathBuf::from("/tmp/t.json"));
    }

    #[test]
    fn test_unset_optionals_are_not_serialized() {
        let json = serde_json::to_value(BridgeConfig::default()).unwrap();
        let oauth = json["oauth"].as_object().unwrap();
        assert!(!oauth.contains_key("client_secret"));
        assert!(!oauth.contains_key("token_path"));
        assert_eq!(json["server"]["name"], "gsheets-server");
    }
}
