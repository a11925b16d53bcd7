//! Optimization cache
//!
//! Content-addressed store for optimized text. Each entry is one JSON file
//! named by the SHA-256 of the text it was computed from:
//!
//! ```text
//! <dir>/<64 hex chars>.json
//! { "version": 1, "created_at": "2024-05-01T12:00:00Z", "optimized_text": "..." }
//! ```
//!
//! Entries expire lazily: an entry older than the expiry window is deleted
//! when it is read. An unreadable or malformed entry is treated exactly like a
//! missing one and removed.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::fs;

/// Schema version written into every entry.
pub const CACHE_VERSION: u32 = 1;

/// Default expiry window in days.
pub const DEFAULT_EXPIRY_DAYS: u32 = 30;

/// Cache errors
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Invalid cache key: {0}")]
    InvalidKey(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for cache operations
pub type Result<T> = std::result::Result<T, CacheError>;

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheConfig {
    /// Override for the cache directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
    /// Entries older than this are discarded on read
    #[serde(default = "default_expiry_days")]
    pub expiry_days: u32,
}

fn default_expiry_days() -> u32 {
    DEFAULT_EXPIRY_DAYS
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: None,
            expiry_days: DEFAULT_EXPIRY_DAYS,
        }
    }
}

impl CacheConfig {
    /// Validate the configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.expiry_days == 0 {
            return Err("expiryDays must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// On-disk entry layout.
#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
    version: u32,
    created_at: DateTime<Utc>,
    optimized_text: String,
}

/// Cache totals, as shown by `speakdown cache stats`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub total_bytes: u64,
}

/// Lowercase hex SHA-256 of the UTF-8 bytes of `text`.
pub fn content_hash(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

fn is_valid_hash(hash: &str) -> bool {
    hash.len() == 64 && hash.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// Directory-backed optimization cache.
#[derive(Debug, Clone)]
pub struct OptimizationCache {
    dir: PathBuf,
    expiry: Duration,
}

impl OptimizationCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            expiry: Duration::days(i64::from(DEFAULT_EXPIRY_DAYS)),
        }
    }

    /// Build from config. `default_dir` is used when no override is set.
    pub fn from_config(config: &CacheConfig, default_dir: &Path) -> Self {
        let dir = config.dir.clone().unwrap_or_else(|| default_dir.to_path_buf());
        Self::new(dir).with_expiry(Duration::days(i64::from(config.expiry_days)))
    }

    pub fn with_expiry(mut self, expiry: Duration) -> Self {
        self.expiry = expiry;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, hash: &str) -> PathBuf {
        self.dir.join(format!("{}.json", hash))
    }

    /// Look up the optimized text stored under `hash`.
    pub async fn get(&self, hash: &str) -> Option<String> {
        if !is_valid_hash(hash) {
            tracing::debug!(key = %hash, "Ignoring malformed cache key");
            return None;
        }

        let path = self.entry_path(hash);
        let data = match fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Unreadable cache entry");
                self.discard(&path).await;
                return None;
            }
        };

        let entry: CacheEntry = match serde_json::from_slice(&data) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Corrupt cache entry, removing");
                self.discard(&path).await;
                return None;
            }
        };

        if entry.version != CACHE_VERSION {
            tracing::warn!(
                path = %path.display(),
                version = entry.version,
                "Unknown cache entry version, removing"
            );
            self.discard(&path).await;
            return None;
        }

        let age = Utc::now().signed_duration_since(entry.created_at);
        if age > self.expiry {
            tracing::debug!(key = %hash, age_days = age.num_days(), "Cache entry expired");
            self.discard(&path).await;
            return None;
        }

        tracing::debug!(key = %hash, "Optimization cache hit");
        Some(entry.optimized_text)
    }

    /// Store `optimized_text` under `hash`, replacing any existing entry.
    pub async fn put(&self, hash: &str, optimized_text: &str) -> Result<()> {
        if !is_valid_hash(hash) {
            return Err(CacheError::InvalidKey(hash.to_string()));
        }

        fs::create_dir_all(&self.dir).await?;

        let entry = CacheEntry {
            version: CACHE_VERSION,
            created_at: Utc::now(),
            optimized_text: optimized_text.to_string(),
        };
        let json = serde_json::to_vec_pretty(&entry)?;

        let path = self.entry_path(hash);
        let tmp = self.dir.join(format!("{}.json.{}.tmp", hash, uuid::Uuid::new_v4()));
        fs::write(&tmp, &json).await?;
        if let Err(e) = fs::rename(&tmp, &path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        tracing::debug!(key = %hash, bytes = json.len(), "Optimization cached");
        Ok(())
    }

    /// Remove every entry, plus temp files left by interrupted writes.
    /// Returns how many entries were removed.
    pub async fn clear(&self) -> Result<usize> {
        let mut removed = 0;
        for path in self.files_with_extension("json").await? {
            if remove_if_present(&path).await? {
                removed += 1;
            }
        }

        let mut stale = 0;
        for path in self.files_with_extension("tmp").await? {
            if remove_if_present(&path).await? {
                stale += 1;
            }
        }

        tracing::info!(
            removed = removed,
            stale_temp_files = stale,
            dir = %self.dir.display(),
            "Optimization cache cleared"
        );
        Ok(removed)
    }

    /// Count entries and their total size on disk.
    pub async fn stats(&self) -> Result<CacheStats> {
        let mut stats = CacheStats::default();
        for path in self.files_with_extension("json").await? {
            if let Ok(meta) = fs::metadata(&path).await {
                stats.entries += 1;
                stats.total_bytes += meta.len();
            }
        }
        Ok(stats)
    }

    async fn files_with_extension(&self, extension: &str) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        let mut dir = match fs::read_dir(&self.dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(files),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some(extension) {
                files.push(path);
            }
        }
        Ok(files)
    }

    async fn discard(&self, path: &Path) {
        if let Err(e) = fs::remove_file(path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %path.display(), error = %e, "Failed to remove cache entry");
            }
        }
    }
}

/// Remove `path`; `Ok(false)` when it was already gone.
async fn remove_if_present(path: &Path) -> Result<bool> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}
