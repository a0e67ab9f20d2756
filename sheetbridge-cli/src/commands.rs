//! Subcommand handlers.

use std::sync::Arc;
use tracing::{info, warn};

use sheetbridge_core::config::{BridgeConfig, GoogleApiConfig};
use sheetbridge_core::oauth::{AuthStatus, Authenticator};
use sheetbridge_mcp::McpServer;
use sheetbridge_mcp::transport::StdioTransport;
use sheetbridge_tools::register_sheet_tools;
use sheetbridge_tools::registry::ToolRegistry;
use sheetbridge_tools::sheets::SheetsService;

use crate::AuthAction;

fn http_client(google: &GoogleApiConfig) -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(google.request_timeout())
        .user_agent(concat!("sheetbridge/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {}", e))
}

/// Resolves when SIGINT or SIGTERM arrives.
async fn shutdown_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;
        tokio::select! {
            _ = sigint.recv() => info!(signal = "SIGINT", "Shutdown signal"),
            _ = sigterm.recv() => info!(signal = "SIGTERM", "Shutdown signal"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Shutdown signal");
    }

    Ok(())
}

/// Run the MCP server on stdio until the client hangs up or a signal arrives.
///
/// The login flow is not started here; the first tool call that needs a
/// token triggers it.
pub(crate) async fn serve(config: BridgeConfig) -> anyhow::Result<()> {
    config
        .oauth
        .validate()
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;

    let authenticator = Authenticator::new(config.oauth.clone(), http_client(&config.google)?);
    let service = Arc::new(SheetsService::new(authenticator.clone(), &config.google));

    let mut registry = ToolRegistry::new();
    register_sheet_tools(&mut registry, service.clone())?;
    info!(
        tools = registry.len(),
        redirect_uri = %config.oauth.redirect_uri(),
        "Starting {} v{}",
        config.server.name,
        config.server.version
    );

    let server = McpServer::new(Arc::new(registry), service, &config.server);
    let mut transport = StdioTransport::stdio();

    let result = tokio::select! {
        result = server.run(&mut transport) => result.map_err(anyhow::Error::from),
        signal = shutdown_signal() => signal.map_err(anyhow::Error::from),
    };

    authenticator.shutdown();
    result
}

pub(crate) async fn handle_auth(action: AuthAction, config: BridgeConfig) -> anyhow::Result<()> {
    let authenticator = Authenticator::new(config.oauth.clone(), http_client(&config.google)?);

    match action {
        AuthAction::Login => {
            config
                .oauth
                .validate()
                .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;

            if let AuthStatus::Valid { .. } = authenticator.status() {
                println!("Already authenticated. Run `sheetbridge auth logout` to log in again.");
                return Ok(());
            }

            println!("Redirect URI: {}", config.oauth.redirect_uri());
            println!("(Make sure this URI is registered for your OAuth client)");
            println!();
            println!("Waiting for Google login in your browser...");

            let outcome = tokio::select! {
                outcome = authenticator.ensure_authenticated() => Some(outcome),
                signal = shutdown_signal() => {
                    if let Err(e) = signal {
                        warn!(error = %e, "Signal handler failed");
                    }
                    None
                }
            };
            authenticator.shutdown();

            match outcome {
                Some(Ok(_)) => {
                    println!(
                        "Authenticated. Tokens saved to {}.",
                        authenticator.store().path().display()
                    );
                    Ok(())
                }
                Some(Err(e)) => Err(anyhow::anyhow!("Login failed: {}", e)),
                None => Err(anyhow::anyhow!("Login cancelled")),
            }
        }

        AuthAction::Status { json } => {
            println!("{}", render_status(&authenticator, json)?);
            Ok(())
        }

        AuthAction::Logout => {
            let removed = authenticator
                .logout()
                .map_err(|e| anyhow::anyhow!("Failed to delete stored tokens: {}", e))?;
            if removed {
                println!("Removed {}.", authenticator.store().path().display());
            } else {
                println!("No stored tokens found.");
            }
            Ok(())
        }
    }
}

fn render_status(authenticator: &Authenticator, json: bool) -> anyhow::Result<String> {
    let status = authenticator.status();
    let path = authenticator.store().path();
    if json {
        let mut value = serde_json::to_value(&status)?;
        value["token_path"] = serde_json::Value::String(path.display().to_string());
        Ok(serde_json::to_string_pretty(&value)?)
    } else {
        Ok(format!("Google: {}\nToken file: {}", status, path.display()))
    }
}
