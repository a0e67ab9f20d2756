//! On-disk token persistence.

use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::token::TokenSet;
use crate::error::StoreError;
use crate::persistence;

/// Persists a single [`TokenSet`] as owner-only JSON.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the stored tokens.
    ///
    /// Missing, unreadable, or malformed files all yield `None`: the user
    /// simply has to authenticate again.
    pub fn load(&self) -> Option<TokenSet> {
        match persistence::load_json::<TokenSet>(&self.path) {
            Ok(Some(token)) if token.has_access_token() => {
                debug!(path = %self.path.display(), "Loaded stored tokens");
                Some(token)
            }
            Ok(Some(_)) => {
                warn!(path = %self.path.display(), "Stored token file has no access token, ignoring");
                None
            }
            Ok(None) => None,
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Stored token file is unreadable, ignoring"
                );
                None
            }
        }
    }

    /// Atomically replace the stored tokens (dir `0700`, file `0600`).
    pub fn save(&self, token: &TokenSet) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(token)?;
        persistence::atomic_write_private(&self.path, &json).map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })?;
        debug!(path = %self.path.display(), "Saved tokens");
        Ok(())
    }

    /// Remove the stored tokens. Returns whether a file was removed.
    pub fn delete(&self) -> Result<bool, StoreError> {
        persistence::remove_if_exists(&self.path).map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })
    }
}
