//! Application configuration management.
//!
//! This module handles loading and saving the application configuration,
//! which includes the backend base URL, request timeout, where tokens are
//! stored, and the last email used to log in.
//!
//! Configuration is stored at `~/.config/tenantdesk/config.json`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::auth::{FileTokenStore, KeyringTokenStore, Session, TokenStore};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "tenantdesk";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Environment variable overriding the backend base URL
pub const API_URL_ENV: &str = "TENANTDESK_API_URL";

/// Backend used when nothing else is configured (local development server)
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";

/// HTTP request timeout in seconds
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// A zero timeout would fail every request immediately
const MIN_REQUEST_TIMEOUT_SECS: u64 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TokenBackend {
    #[default]
    File,
    Keyring,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: Option<String>,
    pub request_timeout_secs: u64,
    pub token_backend: TokenBackend,
    pub last_email: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            token_backend: TokenBackend::default(),
            last_email: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, contents)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    /// Resolve the backend base URL: environment, then config file, then the
    /// local development default.
    pub fn api_base_url(&self) -> String {
        let env_value = std::env::var(API_URL_ENV).ok();
        Self::resolve_base_url(env_value.as_deref(), self.api_base_url.as_deref())
    }

    fn resolve_base_url(env_value: Option<&str>, configured: Option<&str>) -> String {
        let chosen = [env_value, configured]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|v| !v.is_empty())
            .unwrap_or(DEFAULT_API_BASE_URL);
        chosen.trim_end_matches('/').to_string()
    }

    /// Per-request timeout, never below one second
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(MIN_REQUEST_TIMEOUT_SECS))
    }

    /// Open the configured token store
    pub fn token_store(&self) -> Result<Arc<dyn TokenStore>> {
        let store: Arc<dyn TokenStore> = match self.token_backend {
            TokenBackend::File => Arc::new(FileTokenStore::new(self.cache_dir()?)),
            TokenBackend::Keyring => Arc::new(KeyringTokenStore::new()),
        };
        Ok(store)
    }

    pub fn session(&self) -> Result<Session> {
        Ok(Session::new(self.token_store()?))
    }
}
