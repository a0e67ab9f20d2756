//! The authenticator: decides when to refresh or log in, and makes sure only
//! one of those runs at a time.
//!
//! Token acquisition (refresh with fallback, or a full browser login) runs as
//! a spawned task whose result is shared. Every caller of
//! [`Authenticator::ensure_authenticated`] that arrives while it is running
//! joins the same task, so at most one callback listener and one refresh
//! request exist per authenticator.

use chrono::{DateTime, Utc};
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use serde::Serialize;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::browser::{BrowserLauncher, FallbackBrowser};
use super::callback::CallbackListener;
use super::exchange::{HttpTokenClient, TokenEndpoint};
use super::pkce;
use super::store::TokenStore;
use super::token::TokenSet;
use crate::config::OAuthConfig;
use crate::error::{AuthError, OAuthError, StoreError};

type Acquisition = Shared<BoxFuture<'static, Result<TokenSet, AuthError>>>;

/// Non-secret view of the held token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AuthStatus {
    Missing,
    Valid { expires_at: Option<DateTime<Utc>> },
    Expired { refreshable: bool },
}

impl std::fmt::Display for AuthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthStatus::Missing => write!(f, "not authenticated"),
            AuthStatus::Valid {
                expires_at: Some(at),
            } => write!(f, "authenticated (access token valid until {})", at),
            AuthStatus::Valid { expires_at: None } => write!(f, "authenticated"),
            AuthStatus::Expired { refreshable: true } => {
                write!(f, "access token expired (will refresh on next use)")
            }
            AuthStatus::Expired { refreshable: false } => {
                write!(f, "access token expired (login required)")
            }
        }
    }
}

/// Handle for issuing authenticated requests.
///
/// Holds a snapshot of the access token taken after the authenticator made
/// sure it was valid. Cheap to clone; the underlying connection pool is shared.
#[derive(Clone)]
pub struct AuthorizedClient {
    http: reqwest::Client,
    access_token: String,
}

impl AuthorizedClient {
    pub fn new(http: reqwest::Client, access_token: impl Into<String>) -> Self {
        Self {
            http,
            access_token: access_token.into(),
        }
    }

    pub fn get(&self, url: &str) -> reqwest::RequestBuilder {
        self.http.get(url).bearer_auth(&self.access_token)
    }

    pub fn post(&self, url: &str) -> reqwest::RequestBuilder {
        self.http.post(url).bearer_auth(&self.access_token)
    }

    pub fn put(&self, url: &str) -> reqwest::RequestBuilder {
        self.http.put(url).bearer_auth(&self.access_token)
    }

    pub fn patch(&self, url: &str) -> reqwest::RequestBuilder {
        self.http.patch(url).bearer_auth(&self.access_token)
    }

    pub fn delete(&self, url: &str) -> reqwest::RequestBuilder {
        self.http.delete(url).bearer_auth(&self.access_token)
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }
}

impl std::fmt::Debug for AuthorizedClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizedClient").finish_non_exhaustive()
    }
}

struct Inner {
    config: OAuthConfig,
    http: reqwest::Client,
    store: TokenStore,
    endpoint: Arc<dyn TokenEndpoint>,
    browser: Arc<dyn BrowserLauncher>,
    token: RwLock<Option<TokenSet>>,
    in_flight: Mutex<Option<Acquisition>>,
    shutdown: CancellationToken,
}

/// OAuth façade consulted before every remote call.
#[derive(Clone)]
pub struct Authenticator {
    inner: Arc<Inner>,
}

impl Authenticator {
    /// Build an authenticator for Google using the system browser, loading
    /// any tokens already stored at `config.token_path()`.
    pub fn new(config: OAuthConfig, http: reqwest::Client) -> Self {
        let store = TokenStore::new(config.token_path());
        let endpoint = Arc::new(HttpTokenClient::new(http.clone(), &config));
        Self::with_parts(
            config,
            http,
            store,
            endpoint,
            Arc::new(FallbackBrowser::system()),
        )
    }

    /// Build an authenticator from explicit collaborators.
    pub fn with_parts(
        config: OAuthConfig,
        http: reqwest::Client,
        store: TokenStore,
        endpoint: Arc<dyn TokenEndpoint>,
        browser: Arc<dyn BrowserLauncher>,
    ) -> Self {
        let token = store.load();
        if token.is_some() {
            info!(path = %store.path().display(), "Using stored Google credentials");
        }
        Self {
            inner: Arc::new(Inner {
                config,
                http,
                store,
                endpoint,
                browser,
                token: RwLock::new(token),
                in_flight: Mutex::new(None),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    pub fn config(&self) -> &OAuthConfig {
        &self.inner.config
    }

    pub fn store(&self) -> &TokenStore {
        &self.inner.store
    }

    /// Return a valid token, refreshing or logging in first if needed.
    ///
    /// Concurrent callers share a single in-flight acquisition and all see
    /// its result. Failures are reported uniformly as
    /// [`AuthError::AuthenticationFailed`]; details go to the log.
    pub async fn ensure_authenticated(&self) -> Result<TokenSet, AuthError> {
        if let Some(token) = self.usable_token() {
            return Ok(token);
        }

        let acquisition = {
            let mut slot = self
                .inner
                .in_flight
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            // A flow may have finished between the check above and taking the lock.
            if let Some(token) = self.usable_token() {
                return Ok(token);
            }
            match slot.as_ref() {
                Some(running) => {
                    debug!("Joining in-flight authentication");
                    running.clone()
                }
                None => {
                    let task = tokio::spawn(self.clone().acquire());
                    let shared = async move {
                        task.await.unwrap_or_else(|e| {
                            error!(error = %e, "Authentication task failed");
                            Err(AuthError::AuthenticationFailed)
                        })
                    }
                    .boxed()
                    .shared();
                    *slot = Some(shared.clone());
                    shared
                }
            }
        };

        acquisition.await
    }

    /// Ensure a valid token and hand out a request handle bound to it.
    pub async fn authorized_client(&self) -> Result<AuthorizedClient, AuthError> {
        let token = self.ensure_authenticated().await?;
        Ok(AuthorizedClient::new(
            self.inner.http.clone(),
            token.access_token,
        ))
    }

    pub fn status(&self) -> AuthStatus {
        match self.current_token() {
            None => AuthStatus::Missing,
            Some(token) if token.is_expired(self.expiry_skew()) => AuthStatus::Expired {
                refreshable: token.can_refresh(),
            },
            Some(token) => AuthStatus::Valid {
                expires_at: token.expires_at(),
            },
        }
    }

    /// Forget the held token and delete the token file.
    pub fn logout(&self) -> Result<bool, StoreError> {
        *self.inner.token.write().unwrap_or_else(|e| e.into_inner()) = None;
        let removed = self.inner.store.delete()?;
        info!(removed, "Logged out");
        Ok(removed)
    }

    /// Abort any pending login and release the callback port.
    pub fn shutdown(&self) {
        self.inner.shutdown.cancel();
    }

    pub fn current_token(&self) -> Option<TokenSet> {
        self.inner
            .token
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn expiry_skew(&self) -> Duration {
        Duration::from_secs(self.inner.config.expiry_skew_secs)
    }

    fn usable_token(&self) -> Option<TokenSet> {
        self.current_token()
            .filter(|t| t.has_access_token() && !t.is_expired(self.expiry_skew()))
    }

    fn set_token(&self, token: TokenSet) {
        *self.inner.token.write().unwrap_or_else(|e| e.into_inner()) = Some(token);
    }

    fn clear_in_flight(&self) {
        *self
            .inner
            .in_flight
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = None;
    }

    /// Body of the shared acquisition task.
    async fn acquire(self) -> Result<TokenSet, AuthError> {
        let result = if self.inner.config.client_id.trim().is_empty() {
            error!("Cannot authenticate: oauth.client_id is not configured");
            Err(AuthError::MissingClientId)
        } else {
            let held = self.current_token();
            self.obtain(held).await.map_err(|e| {
                error!(error = %e, "Google authentication failed");
                AuthError::AuthenticationFailed
            })
        };

        if let Ok(token) = &result {
            self.set_token(token.clone());
        }
        self.clear_in_flight();
        result
    }

    async fn obtain(&self, held: Option<TokenSet>) -> Result<TokenSet, OAuthError> {
        let refresh_token = held
            .filter(|t| t.has_access_token() && t.can_refresh())
            .and_then(|t| t.refresh_token);

        if let Some(refresh_token) = refresh_token {
            match self.inner.endpoint.refresh(&refresh_token).await {
                Ok(token) => {
                    info!("Refreshed Google access token");
                    self.persist(&token).await;
                    return Ok(token);
                }
                Err(e) => {
                    warn!(error = %e, "Token refresh failed, starting a new login");
                }
            }
        }

        self.login().await
    }

    /// Full authorization-code + PKCE flow.
    async fn login(&self) -> Result<TokenSet, OAuthError> {
        let config = &self.inner.config;
        let pkce = pkce::generate_challenge();

        // Bind before the browser opens so the redirect cannot beat the listener.
        let listener = CallbackListener::bind(
            &config.callback_host,
            config.callback_port,
            &config.callback_path,
        )
        .await?;
        let redirect_uri = config.redirect_uri_for(listener.local_addr().port());
        let auth_url = pkce::build_authorization_url(config, &pkce, &redirect_uri)?;

        info!("Starting Google authorization in the browser");
        debug!(url = %auth_url, "Authorization URL");
        let browser = self.inner.browser.clone();
        let url = auth_url.to_string();
        // Fire and forget: the listener does not depend on the browser opening.
        tokio::task::spawn_blocking(move || {
            let _ = browser.open(&url);
        });

        let code = listener
            .wait(
                pkce.state.clone(),
                config.callback_timeout(),
                self.inner.shutdown.child_token(),
            )
            .await?;

        let token = self
            .inner
            .endpoint
            .exchange(&code, &pkce.verifier, &redirect_uri)
            .await?;
        info!("Google authorization complete");
        self.persist(&token).await;
        Ok(token)
    }

    /// Save tokens off the runtime; a write failure leaves the in-memory
    /// token usable.
    async fn persist(&self, token: &TokenSet) {
        let store = self.inner.store.clone();
        let token = token.clone();
        match tokio::task::spawn_blocking(move || store.save(&token)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!(error = %e, "Could not save tokens, they will not survive a restart")
            }
            Err(e) => warn!(error = %e, "Token save task failed"),
        }
    }
}
