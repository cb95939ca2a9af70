//! Persistent backing stores for [`Configuration`](super::Configuration).
//!
//! A store is shared by every request handled in the process; the
//! per-request `Configuration` caches on top of it.

use super::ConfigError;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

pub type StoreResult<T> = std::result::Result<T, ConfigError>;

/// Key/value store holding configuration that outlives a single request.
///
/// Implementations backed by a remote service should return
/// [`ConfigError::Unavailable`] when the connection dropped; the
/// configuration layer then calls [`ConfigStore::reconnect`] and retries once.
pub trait ConfigStore: Send + Sync {
    fn fetch(&self, key: &str) -> StoreResult<Option<Value>>;

    fn fetch_many(&self, keys: &[&str]) -> StoreResult<HashMap<String, Value>> {
        let mut values = HashMap::with_capacity(keys.len());
        for key in keys {
            if let Some(value) = self.fetch(key)? {
                values.insert((*key).to_string(), value);
            }
        }
        Ok(values)
    }

    /// Write `value`, replacing any previous one.
    fn store(&self, key: &str, value: Value, ttl: Option<Duration>) -> StoreResult<()>;

    /// Write `value` only when `key` holds nothing. Returns whether it was written.
    fn add(&self, key: &str, value: Value, ttl: Option<Duration>) -> StoreResult<bool>;

    fn clear(&self) -> StoreResult<()>;

    fn reconnect(&self) -> StoreResult<()> {
        Ok(())
    }
}

struct MemoryEntry {
    value: Value,
    expires_at: Option<Instant>,
}

impl MemoryEntry {
    fn new(value: Value, ttl: Option<Duration>) -> Self {
        Self {
            value,
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        }
    }

    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| at <= Instant::now())
    }
}

/// Process-local shared store. Survives across requests, not across restarts.
#[derive(Default)]
pub struct MemoryStore {
    entries: DashMap<String, MemoryEntry>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ConfigStore for MemoryStore {
    fn fetch(&self, key: &str) -> StoreResult<Option<Value>> {
        let expired = match self.entries.get(key) {
            Some(entry) if !entry.is_expired() => return Ok(Some(entry.value.clone())),
            Some(_) => true,
            None => false,
        };
        if expired {
            self.entries.remove(key);
        }
        Ok(None)
    }

    fn store(&self, key: &str, value: Value, ttl: Option<Duration>) -> StoreResult<()> {
        self.entries
            .insert(key.to_string(), MemoryEntry::new(value, ttl));
        Ok(())
    }

    fn add(&self, key: &str, value: Value, ttl: Option<Duration>) -> StoreResult<bool> {
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if !occupied.get().is_expired() {
                    return Ok(false);
                }
                occupied.insert(MemoryEntry::new(value, ttl));
            }
            Entry::Vacant(vacant) => {
                vacant.insert(MemoryEntry::new(value, ttl));
            }
        }
        Ok(true)
    }

    fn clear(&self) -> StoreResult<()> {
        self.entries.clear();
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FileEntry {
    value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires_at: Option<DateTime<Utc>>,
}

impl FileEntry {
    fn new(value: Value, ttl: Option<Duration>) -> StoreResult<Self> {
        let expires_at = match ttl {
            Some(ttl) => {
                let ttl = chrono::Duration::from_std(ttl)
                    .map_err(|e| ConfigError::Misconfigured(format!("invalid ttl: {e}")))?;
                Some(Utc::now() + ttl)
            }
            None => None,
        };
        Ok(Self { value, expires_at })
    }

    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| at <= Utc::now())
    }
}

/// Store persisted as a single JSON document on disk, so module state
/// survives a process restart.
pub struct JsonFileStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, FileEntry>>,
}

impl JsonFileStore {
    /// Open (or lazily create) the store at `path`.
    ///
    /// Fails fast when the parent directory does not exist or the file holds
    /// something other than a store document.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if !parent.is_dir() {
                return Err(ConfigError::Misconfigured(format!(
                    "state directory {} does not exist",
                    parent.display()
                )));
            }
        }

        let entries = if path.exists() {
            let content = fs::read_to_string(&path)?;
            if content.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&content)?
            }
        } else {
            BTreeMap::new()
        };

        tracing::debug!(path = %path.display(), keys = entries.len(), "Opened configuration file");

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes `next` to disk and only then makes it the in-memory state, so a
    /// failed write leaves both sides on the previous document.
    fn commit(
        &self,
        current: &mut BTreeMap<String, FileEntry>,
        next: BTreeMap<String, FileEntry>,
    ) -> StoreResult<()> {
        let content = serde_json::to_string_pretty(&next)?;
        fs::write(&self.path, content)?;
        *current = next;
        Ok(())
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, FileEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ConfigStore for JsonFileStore {
    fn fetch(&self, key: &str) -> StoreResult<Option<Value>> {
        Ok(self
            .entries()
            .get(key)
            .filter(|entry| !entry.is_expired())
            .map(|entry| entry.value.clone()))
    }

    fn store(&self, key: &str, value: Value, ttl: Option<Duration>) -> StoreResult<()> {
        let mut entries = self.entries();
        let mut next = entries.clone();
        next.insert(key.to_string(), FileEntry::new(value, ttl)?);
        self.commit(&mut entries, next)
    }

    fn add(&self, key: &str, value: Value, ttl: Option<Duration>) -> StoreResult<bool> {
        let mut entries = self.entries();
        if entries.get(key).is_some_and(|entry| !entry.is_expired()) {
            return Ok(false);
        }
        let mut next = entries.clone();
        next.insert(key.to_string(), FileEntry::new(value, ttl)?);
        self.commit(&mut entries, next)?;
        Ok(true)
    }

    fn clear(&self) -> StoreResult<()> {
        let mut entries = self.entries();
        self.commit(&mut entries, BTreeMap::new())
    }
}
