//! PKCE verifier/challenge and anti-CSRF state generation.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use std::fmt::Write;

use crate::config::OAuthConfig;
use crate::error::OAuthError;

const VERIFIER_BYTES: usize = 32;
const STATE_BYTES: usize = 16;

/// Secrets for one authentication attempt.
#[derive(Clone)]
pub struct PkceChallenge {
    /// Sent only to the token endpoint.
    pub verifier: String,
    /// `BASE64URL(SHA256(verifier))`, sent in the authorization URL.
    pub challenge: String,
    /// Round-tripped through the redirect and checked by the callback listener.
    pub state: String,
}

impl std::fmt::Debug for PkceChallenge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PkceChallenge")
            .field("challenge", &self.challenge)
            .finish_non_exhaustive()
    }
}

/// Generate a fresh verifier, its S256 challenge, and a state token from the
/// OS random source.
pub fn generate_challenge() -> PkceChallenge {
    let verifier = generate_verifier();
    let challenge = challenge_for(&verifier);
    PkceChallenge {
        verifier,
        challenge,
        state: generate_state(),
    }
}

/// 32 random bytes, base64url without padding (43 characters).
pub fn generate_verifier() -> String {
    let mut bytes = [0u8; VERIFIER_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// The S256 code challenge for `verifier`.
pub fn challenge_for(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

/// 16 random bytes, lowercase hex (32 characters).
pub fn generate_state() -> String {
    let mut bytes = [0u8; STATE_BYTES];
    OsRng.fill_bytes(&mut bytes);
    bytes.iter().fold(String::with_capacity(STATE_BYTES * 2), |mut out, b| {
        let _ = write!(out, "{:02x}", b);
        out
    })
}

/// Build the provider authorization URL for this attempt.
pub fn build_authorization_url(
    config: &OAuthConfig,
    pkce: &PkceChallenge,
    redirect_uri: &str,
) -> Result<url::Url, OAuthError> {
    let mut auth_url =
        url::Url::parse(&config.authorization_url).map_err(|e| OAuthError::InvalidUrl {
            message: format!("{}: {}", config.authorization_url, e),
        })?;

    {
        let mut params = auth_url.query_pairs_mut();
        params.append_pair("response_type", "code");
        params.append_pair("client_id", &config.client_id);
        params.append_pair("redirect_uri", redirect_uri);
        if !config.scopes.is_empty() {
            params.append_pair("scope", &config.scopes.join(" "));
        }
        params.append_pair("access_type", "offline");
        params.append_pair("prompt", "consent");
        params.append_pair("code_challenge", &pkce.challenge);
        params.append_pair("code_challenge_method", "S256");
        params.append_pair("state", &pkce.state);
    }

    Ok(auth_url)
}
