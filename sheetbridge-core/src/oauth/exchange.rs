//! Token endpoint client: authorization-code exchange and refresh.

use async_trait::async_trait;
use tracing::debug;

use super::token::{TokenSet, now_millis};
use crate::config::OAuthConfig;
use crate::error::OAuthError;

/// The provider's token endpoint.
///
/// Neither operation retries. A failed exchange fails the whole attempt; a
/// failed refresh is reported as [`OAuthError::RefreshRejected`] so the
/// authenticator can fall back to a full login.
#[async_trait]
pub trait TokenEndpoint: Send + Sync {
    /// Trade an authorization code and its PKCE verifier for tokens.
    async fn exchange(
        &self,
        code: &str,
        verifier: &str,
        redirect_uri: &str,
    ) -> Result<TokenSet, OAuthError>;

    /// Mint a new access token from a refresh token.
    async fn refresh(&self, refresh_token: &str) -> Result<TokenSet, OAuthError>;
}

/// [`TokenEndpoint`] over HTTP, form-encoded as RFC 6749 requires.
#[derive(Clone)]
pub struct HttpTokenClient {
    client: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: Option<String>,
}

impl HttpTokenClient {
    pub fn new(client: reqwest::Client, config: &OAuthConfig) -> Self {
        Self {
            client,
            token_url: config.token_url.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
        }
    }

    fn client_auth_params(&self) -> String {
        let mut body = format!("&client_id={}", urlencoding::encode(&self.client_id));
        if let Some(ref secret) = self.client_secret {
            body.push_str(&format!("&client_secret={}", urlencoding::encode(secret)));
        }
        body
    }

    /// POST a form body and return the raw response text on 2xx.
    async fn post_form(&self, body: String) -> Result<String, String> {
        let response = self
            .client
            .post(&self.token_url)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .header("Accept", "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| format!("request failed: {}", e))?;

        let status = response.status();
        let body_text = response
            .text()
            .await
            .map_err(|e| format!("failed to read response: {}", e))?;

        if !status.is_success() {
            return Err(format!(
                "HTTP {}: {}",
                status,
                summarize_error_body(&body_text)
            ));
        }
        Ok(body_text)
    }
}

#[async_trait]
impl TokenEndpoint for HttpTokenClient {
    async fn exchange(
        &self,
        code: &str,
        verifier: &str,
        redirect_uri: &str,
    ) -> Result<TokenSet, OAuthError> {
        let mut body = format!(
            "grant_type={}&code={}&redirect_uri={}&code_verifier={}",
            urlencoding::encode("authorization_code"),
            urlencoding::encode(code),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(verifier),
        );
        body.push_str(&self.client_auth_params());

        debug!(token_url = %self.token_url, "Exchanging authorization code for tokens");

        let text = self
            .post_form(body)
            .await
            .map_err(|message| OAuthError::Exchange { message })?;
        TokenSet::from_token_response(&text, now_millis())
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenSet, OAuthError> {
        let mut body = format!(
            "grant_type={}&refresh_token={}",
            urlencoding::encode("refresh_token"),
            urlencoding::encode(refresh_token),
        );
        body.push_str(&self.client_auth_params());

        debug!(token_url = %self.token_url, "Refreshing access token");

        let text = self
            .post_form(body)
            .await
            .map_err(|message| OAuthError::RefreshRejected { message })?;
        let token = TokenSet::from_token_response(&text, now_millis()).map_err(|e| {
            OAuthError::RefreshRejected {
                message: e.to_string(),
            }
        })?;

        // Google usually does not rotate the refresh token.
        Ok(token.or_refresh_token(refresh_token))
    }
}

/// Pull `error`/`error_description` out of an OAuth error body, if present.
fn summarize_error_body(body: &str) -> String {
    let Ok(json) = serde_json::from_str::<serde_json::Value>(body) else {
        return body.chars().take(200).collect();
    };
    match (json["error"].as_str(), json["error_description"].as_str()) {
        (Some(error), Some(description)) => format!("{} ({})", error, description),
        (Some(error), None) => error.to_string(),
        _ => body.chars().take(200).collect(),
    }
}
