use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Session file name in cache directory
const SESSION_FILE: &str = "session.json";

/// Key-value persistence for session tokens.
///
/// Implementations are shared between concurrent requests, so every method
/// takes `&self` and the store synchronizes internally. Writes are last
/// writer wins.
pub trait TokenStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;

    /// When the store was last written, if it tracks that
    fn updated_at(&self) -> Option<DateTime<Utc>> {
        None
    }
}

fn poisoned<T>(_: T) -> anyhow::Error {
    anyhow!("token store lock poisoned")
}

/// In-process store. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryTokenStore {
    values: Mutex<BTreeMap<String, String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.lock().map_err(poisoned)?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.values
            .lock()
            .map_err(poisoned)?
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.values.lock().map_err(poisoned)?.remove(key);
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct SessionFile {
    values: BTreeMap<String, String>,
    updated_at: Option<DateTime<Utc>>,
}

/// JSON file in the cache directory.
///
/// Every write rewrites the whole file; removing the last key deletes it.
pub struct FileTokenStore {
    cache_dir: PathBuf,
    lock: Mutex<()>,
}

impl FileTokenStore {
    pub fn new(cache_dir: PathBuf) -> Self {
        Self {
            cache_dir,
            lock: Mutex::new(()),
        }
    }

    fn session_path(&self) -> PathBuf {
        self.cache_dir.join(SESSION_FILE)
    }

    fn read(&self) -> Result<SessionFile> {
        let path = self.session_path();
        if !path.exists() {
            return Ok(SessionFile::default());
        }
        let contents = std::fs::read_to_string(&path).context("Failed to read session file")?;
        serde_json::from_str(&contents).context("Failed to parse session file")
    }

    fn write(&self, file: &SessionFile) -> Result<()> {
        let path = self.session_path();
        if file.values.is_empty() {
            if path.exists() {
                std::fs::remove_file(&path).context("Failed to remove session file")?;
            }
            return Ok(());
        }
        std::fs::create_dir_all(&self.cache_dir).context("Failed to create cache directory")?;
        let contents = serde_json::to_string_pretty(file)?;
        std::fs::write(&path, contents).context("Failed to write session file")?;
        Ok(())
    }
}

impl TokenStore for FileTokenStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let _guard = self.lock.lock().map_err(poisoned)?;
        Ok(self.read()?.values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let _guard = self.lock.lock().map_err(poisoned)?;
        let mut file = self.read()?;
        file.values.insert(key.to_string(), value.to_string());
        file.updated_at = Some(Utc::now());
        self.write(&file)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let _guard = self.lock.lock().map_err(poisoned)?;
        let mut file = self.read()?;
        if file.values.remove(key).is_some() {
            file.updated_at = Some(Utc::now());
            self.write(&file)?;
        }
        Ok(())
    }

    fn updated_at(&self) -> Option<DateTime<Utc>> {
        let _guard = self.lock.lock().ok()?;
        self.read().ok()?.updated_at
    }
}
