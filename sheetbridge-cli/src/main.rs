//! Sheetbridge CLI: runs the Google Sheets MCP server on stdio and manages
//! the stored Google login.

mod commands;

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use sheetbridge_core::config::LoggingConfig;

/// Sheetbridge: Google Sheets for MCP clients
#[derive(Parser, Debug)]
#[command(name = "sheetbridge", version, about, long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Subcommand (defaults to `serve`)
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand, Debug, PartialEq, Eq)]
enum Commands {
    /// Run the MCP server over stdin/stdout
    Serve,
    /// Manage the stored Google login
    Auth {
        #[command(subcommand)]
        action: AuthAction,
    },
}

#[derive(clap::Subcommand, Debug, PartialEq, Eq)]
enum AuthAction {
    /// Log in through the browser and store the tokens
    Login,
    /// Show whether a usable token is stored
    Status {
        /// Print machine-readable JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete the stored tokens
    Logout,
}

/// Stderr filter directive. `RUST_LOG` wins over flags, flags over config.
fn filter_directive(verbose: u8, quiet: bool, logging: &LoggingConfig) -> String {
    match verbose {
        0 if quiet => "error".to_string(),
        0 => logging.level.clone(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    }
}

/// Install stderr logging plus, when enabled, a daily JSON log file.
///
/// Stdout carries the MCP protocol, so nothing is ever logged there.
fn init_tracing(
    directive: &str,
    logging: &LoggingConfig,
) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let stderr_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(stderr_filter);

    let (json_layer, guard) = if logging.json_file {
        let log_dir = sheetbridge_core::config::data_dir().join("logs");
        match std::fs::create_dir_all(&log_dir) {
            Ok(()) => {
                let file_appender = tracing_appender::rolling::daily(&log_dir, "sheetbridge.log");
                let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
                let layer = tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(non_blocking)
                    .with_filter(EnvFilter::new("debug"));
                (Some(layer), Some(guard))
            }
            Err(e) => {
                eprintln!("Cannot create log directory {}: {}", log_dir.display(), e);
                (None, None)
            }
        }
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    guard
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let config = sheetbridge_core::config::load_config(cli.config.as_deref())
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;

    let directive = filter_directive(cli.verbose, cli.quiet, &config.logging);
    let _guard = init_tracing(&directive, &config.logging);

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => commands::serve(config).await,
        Commands::Auth { action } => commands::handle_auth(action, config).await,
    }
}
