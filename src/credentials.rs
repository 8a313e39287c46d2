//! Credential access for backend requests
//!
//! The assistant never owns authentication; it reads a bearer token from an
//! injected store and attaches it when present. A missing token is not an
//! error here — the backend's 401 is surfaced through the transport instead.

use std::path::PathBuf;

/// Read-only source of the backend bearer token
pub trait CredentialStore: Send + Sync {
    /// Current bearer token, if any
    fn bearer_token(&self) -> Option<String>;
}

/// Token store backed by the `PAUZ_TOKEN` env var with a file fallback
///
/// The file holds the raw token, optionally followed by a trailing newline.
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    /// Create a store reading from the given token file
    #[must_use]
    pub const fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl CredentialStore for FileTokenStore {
    fn bearer_token(&self) -> Option<String> {
        if let Ok(token) = std::env::var("PAUZ_TOKEN") {
            if !token.is_empty() {
                return Some(token);
            }
        }

        match std::fs::read_to_string(&self.path) {
            Ok(contents) => {
                let token = contents.trim();
                if token.is_empty() {
                    None
                } else {
                    Some(token.to_string())
                }
            }
            Err(e) => {
                tracing::debug!(path = %self.path.display(), error = %e, "no token file");
                None
            }
        }
    }
}

/// Fixed token, mainly for tests and one-off CLI runs
pub struct StaticToken(pub Option<String>);

impl CredentialStore for StaticToken {
    fn bearer_token(&self) -> Option<String> {
        self.0.clone()
    }
}
