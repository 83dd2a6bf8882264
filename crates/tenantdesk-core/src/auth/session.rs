use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::warn;

use super::{MemoryTokenStore, TokenStore};

/// Storage key for the short-lived access token
pub const ACCESS_TOKEN_KEY: &str = "access_token";

/// Storage key for the refresh token
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";

/// Handle to the persisted access/refresh token pair.
///
/// Clones share the same store, so a refresh done through one clone is seen
/// by every other holder.
#[derive(Clone)]
pub struct Session {
    store: Arc<dyn TokenStore>,
}

impl Session {
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        Self { store }
    }

    /// Session backed by process memory only
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryTokenStore::new()))
    }

    /// Current access token. A store that cannot be read counts as logged out.
    pub fn access_token(&self) -> Option<String> {
        self.read(ACCESS_TOKEN_KEY)
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.read(REFRESH_TOKEN_KEY)
    }

    /// Store a fresh pair, as returned by login
    pub fn set_tokens(&self, access_token: &str, refresh_token: &str) -> Result<()> {
        self.store.set(ACCESS_TOKEN_KEY, access_token)?;
        self.store.set(REFRESH_TOKEN_KEY, refresh_token)
    }

    pub fn set_access_token(&self, access_token: &str) -> Result<()> {
        self.store.set(ACCESS_TOKEN_KEY, access_token)
    }

    pub fn set_refresh_token(&self, refresh_token: &str) -> Result<()> {
        self.store.set(REFRESH_TOKEN_KEY, refresh_token)
    }

    /// Remove both tokens
    pub fn clear(&self) -> Result<()> {
        // Attempt both removals before reporting a failure
        let access = self.store.remove(ACCESS_TOKEN_KEY);
        let refresh = self.store.remove(REFRESH_TOKEN_KEY);
        access.and(refresh)
    }

    pub fn is_authenticated(&self) -> bool {
        self.access_token().is_some()
    }

    pub fn has_refresh_token(&self) -> bool {
        self.refresh_token().is_some()
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.store.updated_at()
    }

    fn read(&self, key: &str) -> Option<String> {
        match self.store.get(key) {
            Ok(value) => value.filter(|v| !v.is_empty()),
            Err(e) => {
                warn!(key = key, error = %e, "Failed to read session token");
                None
            }
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print token values
        f.debug_struct("Session")
            .field("authenticated", &self.is_authenticated())
            .field("has_refresh_token", &self.has_refresh_token())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::FileTokenStore;

    #[test]
    fn test_set_and_clear_tokens() {
        let session = Session::in_memory();
        assert!(!session.is_authenticated());

        session.set_tokens("A1", "R1").unwrap();
        assert_eq!(session.access_token().as_deref(), Some("A1"));
        assert_eq!(session.refresh_token().as_deref(), Some("R1"));

        session.set_access_token("A2").unwrap();
        assert_eq!(session.access_token().as_deref(), Some("A2"));
        assert_eq!(session.refresh_token().as_deref(), Some("R1"));

        session.clear().unwrap();
        assert!(!session.is_authenticated());
        assert!(!session.has_refresh_token());
    }

    #[test]
    fn test_clones_share_store() {
        let session = Session::in_memory();
        let other = session.clone();
        session.set_tokens("A1", "R1").unwrap();
        assert_eq!(other.access_token().as_deref(), Some("A1"));

        other.clear().unwrap();
        assert!(!session.is_authenticated());
    }

    #[test]
    fn test_empty_token_counts_as_missing() {
        let session = Session::in_memory();
        session.set_tokens("", "R1").unwrap();
        assert!(!session.is_authenticated());
        assert!(session.has_refresh_token());
    }

    #[test]
    fn test_unreadable_store_counts_as_logged_out() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("session.json"), "{broken").unwrap();
        let session = Session::new(Arc::new(FileTokenStore::new(dir.path().to_path_buf())));
        assert!(!session.is_authenticated());
        assert_eq!(session.refresh_token(), None);
    }

    #[test]
    fn test_debug_hides_tokens() {
        let session = Session::in_memory();
        session.set_tokens("secret-access", "secret-refresh").unwrap();
        let printed = format!("{:?}", session);
        assert!(!printed.contains("secret"));
        assert!(printed.contains("authenticated: true"));
    }
}
