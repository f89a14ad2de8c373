//! Local filesystem storage implementation.
//!
//! Every write goes to a temporary sibling first and is renamed into place,
//! so a crash never leaves a half-written counter file or tile behind.
//!
//! ## Storage Layout
//!
//! ```text
//! {root}/
//! ├── counters.json         # Engagement counters
//! ├── tiles/{z}/{x}/{y}.png # Offline tile bundle
//! └── dist/                 # Rendered output
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::storage::CounterStore;

const DEFAULT_COUNTERS_FILE: &str = "counters.json";

/// Local filesystem storage backend.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root_dir: PathBuf,
    counters_key: String,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self::with_counters_file(root_dir, DEFAULT_COUNTERS_FILE)
    }

    /// Create a LocalStorage keeping counters in a custom file.
    pub fn with_counters_file(root_dir: impl Into<PathBuf>, counters_key: impl Into<String>) -> Self {
        Self {
            root_dir: root_dir.into(),
            counters_key: counters_key.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root_dir
    }

    /// Get the full path for a relative key.
    pub fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    /// Whether a file exists under `key`.
    pub async fn exists(&self, key: &str) -> bool {
        tokio::fs::try_exists(self.path(key)).await.unwrap_or(false)
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, then rename).
    pub async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(key);
        self.ensure_dir(&path).await?;

        let mut tmp = path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    pub async fn write_text(&self, key: &str, text: &str) -> Result<()> {
        self.write_bytes(key, text.as_bytes()).await
    }

    /// Write JSON data.
    pub async fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let mut bytes = serde_json::to_vec_pretty(value)?;
        bytes.push(b'\n');
        self.write_bytes(key, &bytes).await
    }

    /// Read bytes, returning None if file doesn't exist.
    pub async fn read_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Read JSON data.
    pub async fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.read_bytes(key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn load_counters(&self) -> Result<BTreeMap<String, String>> {
        Ok(self
            .read_json(&self.counters_key)
            .await
            .map_err(|e| AppError::storage(format!("{}: {}", self.counters_key, e)))?
            .unwrap_or_default())
    }
}

#[async_trait]
impl CounterStore for LocalStorage {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.load_counters().await?.remove(key))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut counters = self.load_counters().await?;
        counters.insert(key.to_string(), value.to_string());
        self.write_json(&self.counters_key, &counters).await?;
        log::debug!("Stored {}={} in {}", key, value, self.counters_key);
        Ok(())
    }
}
