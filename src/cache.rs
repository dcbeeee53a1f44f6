//! Result cache for extracted problems.
//!
//! Entries are never refreshed: the first document stored under a key stays
//! there for the lifetime of the store.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::models::ExtractedDocument;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache unavailable: {0}")]
    Unavailable(String),
    #[error("cache io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Key under which the document for `identifier` is stored.
pub fn cache_key(identifier: &str) -> String {
    format!("problem-{identifier}")
}

/// Key-value store backing the resolver.
#[async_trait]
pub trait ResultCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<ExtractedDocument>, CacheError>;

    /// Stores `document` unless `key` already has a value.
    async fn put(&self, key: &str, document: &ExtractedDocument) -> Result<(), CacheError>;
}

// ── In-memory store ──────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, ExtractedDocument>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ResultCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<ExtractedDocument>, CacheError> {
        let entries = self
            .entries
            .read()
            .map_err(|_| CacheError::Unavailable("memory cache lock poisoned".to_string()))?;
        Ok(entries.get(key).cloned())
    }

    async fn put(&self, key: &str, document: &ExtractedDocument) -> Result<(), CacheError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| CacheError::Unavailable("memory cache lock poisoned".to_string()))?;
        entries
            .entry(key.to_string())
            .or_insert_with(|| document.clone());
        Ok(())
    }
}

// ── JSON file store ──────────────────────────────────────────────────────────

/// Persistent cache kept as a single JSON object on disk.
///
/// The whole map is loaded on open and the file is rewritten (temp file, then
/// rename) after every new entry.
pub struct FileCache {
    path: PathBuf,
    entries: Mutex<HashMap<String, ExtractedDocument>>,
}

impl FileCache {
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let entries = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => HashMap::new(),
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };

        tracing::debug!(
            "FileCache opened: {} entries from {}",
            entries.len(),
            path.display()
        );

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, entries: &HashMap<String, ExtractedDocument>) -> Result<(), CacheError> {
        let data = serde_json::to_vec_pretty(entries)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, data).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl ResultCache for FileCache {
    async fn get(&self, key: &str) -> Result<Option<ExtractedDocument>, CacheError> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn put(&self, key: &str, document: &ExtractedDocument) -> Result<(), CacheError> {
        let mut entries = self.entries.lock().await;
        if entries.contains_key(key) {
            return Ok(());
        }

        entries.insert(key.to_string(), document.clone());
        if let Err(e) = self.persist(&entries).await {
            // Keep memory in step with what is on disk.
            entries.remove(key);
            return Err(e);
        }
        Ok(())
    }
}
