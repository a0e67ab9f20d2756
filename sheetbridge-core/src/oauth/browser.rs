//! Opening the authorization URL for the operator.

use tracing::{info, warn};

/// Something that can present a URL to the person at the keyboard.
pub trait BrowserLauncher: Send + Sync {
    fn open(&self, url: &str) -> Result<(), String>;
}

/// Opens URLs in the system's default browser.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemBrowser;

impl BrowserLauncher for SystemBrowser {
    fn open(&self, url: &str) -> Result<(), String> {
        open::that(url).map_err(|e| e.to_string())
    }
}

/// Prints the URL on stderr. Stdout belongs to the MCP transport.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleBrowser;

impl BrowserLauncher for ConsoleBrowser {
    fn open(&self, url: &str) -> Result<(), String> {
        eprintln!();
        eprintln!("Open this URL in your browser to authorize Google Sheets access:");
        eprintln!("  {}", url);
        eprintln!();
        Ok(())
    }
}

/// Tries `primary`, falling back to printing the URL. Never fails.
pub struct FallbackBrowser {
    primary: Box<dyn BrowserLauncher>,
    fallback: Box<dyn BrowserLauncher>,
}

impl FallbackBrowser {
    pub fn new(primary: Box<dyn BrowserLauncher>, fallback: Box<dyn BrowserLauncher>) -> Self {
        Self { primary, fallback }
    }

    /// System browser with a console fallback.
    pub fn system() -> Self {
        Self::new(Box::new(SystemBrowser), Box::new(ConsoleBrowser))
    }
}

impl Default for FallbackBrowser {
    fn default() -> Self {
        Self::system()
    }
}

impl BrowserLauncher for FallbackBrowser {
    fn open(&self, url: &str) -> Result<(), String> {
        match self.primary.open(url) {
            Ok(()) => {
                info!("Opened browser for Google authorization");
            }
            Err(e) => {
                warn!(error = %e, "Could not open a browser, printing the authorization URL instead");
                if let Err(e) = self.fallback.open(url) {
                    warn!(error = %e, "Could not print the authorization URL");
                }
            }
        }
        Ok(())
    }
}
