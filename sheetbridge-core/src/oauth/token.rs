//! The token pair held by the authenticator and mirrored on disk.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::OAuthError;

/// An access/refresh token pair.
///
/// Immutable once built: exchange and refresh produce new values which the
/// authenticator swaps into its slot. Serializes to the on-disk format
/// `{ access_token, refresh_token, expiry_date }` with `expiry_date` in epoch
/// milliseconds.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSet {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Absolute expiry in epoch milliseconds, when the provider reported one.
    #[serde(default)]
    pub expiry_date: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl std::fmt::Debug for TokenSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSet")
            .field("access_token", &"<redacted>")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "<redacted>"),
            )
            .field("expiry_date", &self.expiry_date)
            .field("token_type", &self.token_type)
            .field("scope", &self.scope)
            .finish()
    }
}

impl TokenSet {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            expiry_date: None,
            token_type: None,
            scope: None,
        }
    }

    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }

    pub fn with_expiry_date(mut self, epoch_millis: i64) -> Self {
        self.expiry_date = Some(epoch_millis);
        self
    }

    /// Build a token set from a token endpoint JSON body.
    ///
    /// `expires_in` (seconds) is converted to an absolute expiry relative to
    /// `now_millis`.
    pub fn from_token_response(body: &str, now_millis: i64) -> Result<Self, OAuthError> {
        let json: serde_json::Value =
            serde_json::from_str(body).map_err(|e| OAuthError::InvalidTokenResponse {
                message: format!("Invalid JSON in token response: {}", e),
            })?;

        let access_token = json["access_token"]
            .as_str()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| OAuthError::InvalidTokenResponse {
                message: "Token response missing 'access_token'".to_string(),
            })?
            .to_string();

        let refresh_token = json["refresh_token"]
            .as_str()
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string());
        let expiry_date = json["expires_in"]
            .as_i64()
            .map(|secs| now_millis.saturating_add(secs.saturating_mul(1000)));
        let token_type = json["token_type"].as_str().map(|s| s.to_string());
        let scope = json["scope"].as_str().map(|s| s.to_string());

        Ok(Self {
            access_token,
            refresh_token,
            expiry_date,
            token_type,
            scope,
        })
    }

    /// Keep `previous` as the refresh token when the provider did not rotate it.
    pub fn or_refresh_token(mut self, previous: &str) -> Self {
        if self.refresh_token.is_none() {
            self.refresh_token = Some(previous.to_string());
        }
        self
    }

    /// Whether an access token is present at all.
    pub fn has_access_token(&self) -> bool {
        !self.access_token.is_empty()
    }

    pub fn can_refresh(&self) -> bool {
        self.refresh_token.as_deref().is_some_and(|t| !t.is_empty())
    }

    /// Whether the access token is expired at `now_millis`, treating it as
    /// expired `skew` early. Unknown expiry counts as valid.
    pub fn is_expired_at(&self, now_millis: i64, skew: Duration) -> bool {
        match self.expiry_date {
            Some(expiry) => {
                let skew_ms = i64::try_from(skew.as_millis()).unwrap_or(i64::MAX);
                now_millis.saturating_add(skew_ms) >= expiry
            }
            None => false,
        }
    }

    pub fn is_expired(&self, skew: Duration) -> bool {
        self.is_expired_at(now_millis(), skew)
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expiry_date
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
    }
}

/// Current wall-clock time in epoch milliseconds.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}
