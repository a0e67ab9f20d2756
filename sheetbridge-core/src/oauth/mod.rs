//! OAuth 2.0 authorization code flow with PKCE for Google APIs.
//!
//! Leaf-first:
//!
//! | Module | Role |
//! |--------|------|
//! | [`pkce`] | Verifier, S256 challenge, anti-CSRF state, authorization URL |
//! | [`callback`] | One-shot loopback listener for the redirect |
//! | [`exchange`] | Token endpoint: code exchange and refresh |
//! | [`store`] | Owner-only token file |
//! | [`browser`] | Best-effort browser launch with console fallback |
//! | [`orchestrator`] | [`Authenticator`], the façade used before every API call |

pub mod browser;
pub mod callback;
pub mod exchange;
pub mod orchestrator;
pub mod pkce;
pub mod store;
pub mod token;

pub use browser::{BrowserLauncher, ConsoleBrowser, FallbackBrowser, SystemBrowser};
pub use callback::{CallbackListener, CallbackParams, evaluate_callback};
pub use exchange::{HttpTokenClient, TokenEndpoint};
pub use orchestrator::{AuthStatus, Authenticator, AuthorizedClient};
pub use pkce::{PkceChallenge, generate_challenge};
pub use store::TokenStore;
pub use token::TokenSet;
