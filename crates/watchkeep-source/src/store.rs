use anyhow::{anyhow, Result};
use chrono::Utc;
use serde::{de::DeserializeOwned, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};
use watchkeep_models::CacheEnvelope;

/// Metadata about one persisted entry, for inspection tooling.
#[derive(Debug, Clone)]
pub struct EntryInfo {
    pub key: String,
    pub item_count: usize,
    pub stored_at: chrono::DateTime<Utc>,
    pub ttl_seconds: i64,
    pub expired: bool,
}

/// File-backed persistent tier. One pretty-printed JSON file per cache key,
/// each holding a `CacheEnvelope`. Reads respect the envelope TTL and owner
/// key; corrupted files are deleted and reported as misses; writes go through
/// a temp file and rename so a crash never leaves a half-written entry.
#[derive(Clone)]
pub struct EnvelopeStore {
    cache_dir: PathBuf,
    writes: Arc<AtomicUsize>,
}

impl EnvelopeStore {
    pub fn new(cache_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(cache_dir)?;
        Ok(Self {
            cache_dir: cache_dir.to_path_buf(),
            writes: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Envelope writes performed through this handle and its clones. Batch
    /// mutations are expected to coalesce into one write per cache key.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::Relaxed)
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.json", key))
    }

    /// Read one entry. Expired, foreign-owner, missing, and corrupted entries
    /// all come back as `None`.
    pub fn get<T>(&self, key: &str, owner_key: &str) -> Result<Option<Vec<T>>>
    where
        T: DeserializeOwned,
    {
        let path = self.entry_path(key);

        if !path.exists() {
            debug!("Cache miss: {} (file does not exist)", key);
            return Ok(None);
        }

        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                warn!("Failed to read cache file for {}: {}", key, e);
                return Ok(None);
            }
        };

        let envelope: CacheEnvelope<T> = match serde_json::from_str(&content) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(
                    "Cache corruption detected for {}: {}. Deleting corrupted file.",
                    key, e
                );
                if let Err(rm_err) = std::fs::remove_file(&path) {
                    warn!("Failed to delete corrupted cache file: {}", rm_err);
                }
                return Ok(None);
            }
        };

        if !envelope.is_owned_by(owner_key) {
            debug!("Cache miss: {} (owner mismatch)", key);
            return Ok(None);
        }

        if envelope.is_expired(Utc::now()) {
            debug!("Cache miss: {} (entry expired)", key);
            return Ok(None);
        }

        info!("Cache hit: {} (loaded {} items)", key, envelope.data.len());
        Ok(Some(envelope.data))
    }

    /// Write one entry wholesale. No partial or merge semantics.
    pub fn set<T>(&self, key: &str, data: &[T], owner_key: &str, ttl_seconds: i64) -> Result<()>
    where
        T: Serialize + Clone,
    {
        let path = self.entry_path(key);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let envelope = CacheEnvelope::new(data.to_vec(), ttl_seconds, owner_key.to_string());
        let json = serde_json::to_string_pretty(&envelope)
            .map_err(|e| anyhow!("Failed to serialize cache entry {}: {}", key, e))?;

        // Atomic write: temp file, then rename
        let temp_path = path.with_extension("tmp");
        std::fs::write(&temp_path, json)
            .map_err(|e| anyhow!("Failed to write cache entry {}: {}", key, e))?;
        std::fs::rename(&temp_path, &path)?;
        self.writes.fetch_add(1, Ordering::Relaxed);

        debug!("Cache saved: {} ({} items)", key, data.len());
        Ok(())
    }

    pub fn clear(&self, key: &str) -> Result<()> {
        let path = self.entry_path(key);
        if path.exists() {
            std::fs::remove_file(&path)?;
            info!("Cleared cache entry: {}", key);
        }
        Ok(())
    }

    pub fn clear_all(&self) -> Result<()> {
        if self.cache_dir.exists() {
            std::fs::remove_dir_all(&self.cache_dir)?;
            std::fs::create_dir_all(&self.cache_dir)?;
            info!("Cleared cache directory: {:?}", self.cache_dir);
        }
        Ok(())
    }

    /// Describe one entry without deserializing its payload type. Used by the
    /// status command.
    pub fn describe(&self, key: &str) -> Result<Option<EntryInfo>> {
        let path = self.entry_path(key);
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)?;
        let envelope: CacheEnvelope<serde_json::Value> = match serde_json::from_str(&content) {
            Ok(envelope) => envelope,
            Err(_) => return Ok(None),
        };
        Ok(Some(EntryInfo {
            key: key.to_string(),
            item_count: envelope.data.len(),
            stored_at: envelope.stored_at,
            ttl_seconds: envelope.ttl_seconds,
            expired: envelope.is_expired(Utc::now()),
        }))
    }

    pub fn keys(&self) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        for entry in std::fs::read_dir(&self.cache_dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    keys.push(stem.to_string());
                }
            }
        }
        keys.sort();
        Ok(keys)
    }
}
