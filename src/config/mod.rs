//! Configuration service.
//!
//! ```text
//! Configuration (per request, DashMap cache)
//!     → ConfigStore (shared, persistent: MemoryStore / JsonFileStore)
//! ```
//!
//! Reads go to the in-process cache first and fall back to the store.
//! Writes always update the cache and reach the store only when persistent.

mod environment;
mod store;

pub use environment::{
    APP_NAME_KEY, APP_RUNTIME_KEY, DEFAULT_SERVICE_PROVIDER_URL, Environment, INIT_KEY,
    INSTANCE_ID_KEY, SERVICE_PROVIDER_URL_KEY,
};
pub use store::{ConfigStore, JsonFileStore, MemoryStore, StoreResult};

use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    /// The backing store dropped its connection.
    #[error("Configuration store unavailable: {0}")]
    Unavailable(String),

    #[error("Misconfiguration: {0}")]
    Misconfigured(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// How a value is written by [`Configuration::set`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetOptions {
    /// Also write to the persistent store.
    pub persistent: bool,
    /// Expiry in the persistent store; `None` never expires.
    pub ttl: Option<Duration>,
    /// Replace an existing value.
    pub overwrite: bool,
}

impl Default for SetOptions {
    fn default() -> Self {
        Self {
            persistent: false,
            ttl: None,
            overwrite: true,
        }
    }
}

impl SetOptions {
    /// Write through to the persistent store.
    pub fn persistent() -> Self {
        Self {
            persistent: true,
            ..Self::default()
        }
    }

    /// Expire the persisted value after `ttl`.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Leave an existing value untouched.
    pub fn keep_existing(mut self) -> Self {
        self.overwrite = false;
        self
    }
}

/// Configuration service
#[derive(Clone)]
pub struct Configuration {
    data: Arc<DashMap<String, Value>>,
    store: Arc<dyn ConfigStore>,
}

impl Configuration {
    /// Create a configuration with an empty cache over `store`.
    pub fn new(store: Arc<dyn ConfigStore>) -> Self {
        Self {
            data: Arc::new(DashMap::new()),
            store,
        }
    }

    /// A configuration over a fresh, unshared [`MemoryStore`].
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    pub fn store(&self) -> &Arc<dyn ConfigStore> {
        &self.store
    }

    /// Cached value of `key`, loaded from the store on a miss.
    pub fn get(&self, key: &str) -> Result<Option<Value>, ConfigError> {
        if let Some(value) = self.data.get(key) {
            return Ok(Some(value.clone()));
        }

        let value = self.with_retry(|store| store.fetch(key))?;
        if let Some(value) = &value {
            self.data.insert(key.to_string(), value.clone());
        }
        Ok(value)
    }

    /// Typed variant of [`Configuration::get`].
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, ConfigError> {
        self.get(key)?
            .map(serde_json::from_value)
            .transpose()
            .map_err(ConfigError::from)
    }

    /// Fetches `keys` from the persistent store, refreshing the cache.
    pub fn get_multiple(&self, keys: &[&str]) -> Result<HashMap<String, Value>, ConfigError> {
        let values = self.with_retry(|store| store.fetch_many(keys))?;
        for (key, value) in &values {
            self.data.insert(key.clone(), value.clone());
        }
        Ok(values)
    }

    /// Write `value` under `key` as described by `options`.
    pub fn set(&self, key: &str, value: Value, options: SetOptions) -> Result<(), ConfigError> {
        if options.persistent {
            if options.overwrite {
                self.with_retry(|store| store.store(key, value.clone(), options.ttl))?;
            } else {
                self.with_retry(|store| store.add(key, value.clone(), options.ttl))?;
            }
        }

        if options.overwrite || !self.data.contains_key(key) {
            self.data.insert(key.to_string(), value);
        }
        Ok(())
    }

    /// Writes every pair with the same `options`; stops at the first failure.
    pub fn set_multiple<I>(&self, values: I, options: SetOptions) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        for (key, value) in values {
            self.set(&key, value, options)?;
        }
        Ok(())
    }

    /// Drops every cached and persisted value.
    pub fn clear(&self) -> Result<(), ConfigError> {
        self.with_retry(|store| store.clear())?;
        self.data.clear();
        Ok(())
    }

    /// Runs `op` against the store, reconnecting and retrying exactly once
    /// when the store reports it is unavailable.
    fn with_retry<T>(
        &self,
        op: impl Fn(&dyn ConfigStore) -> StoreResult<T>,
    ) -> Result<T, ConfigError> {
        match op(self.store.as_ref()) {
            Err(ConfigError::Unavailable(reason)) => {
                tracing::warn!(%reason, "Configuration store unavailable, reconnecting");
                self.store.reconnect()?;
                op(self.store.as_ref())
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fails the first `failures` fetches with `Unavailable`.
    struct FlakyStore {
        inner: MemoryStore,
        failures: AtomicUsize,
        reconnects: AtomicUsize,
    }

    impl FlakyStore {
        fn new(failures: usize) -> Self {
            Self {
                inner: MemoryStore::new(),
                failures: AtomicUsize::new(failures),
                reconnects: AtomicUsize::new(0),
            }
        }
    }

    impl ConfigStore for FlakyStore {
        fn fetch(&self, key: &str) -> StoreResult<Option<Value>> {
            if self
                .failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(ConfigError::Unavailable("connection reset".into()));
            }
            self.inner.fetch(key)
        }

        fn store(&self, key: &str, value: Value, ttl: Option<Duration>) -> StoreResult<()> {
            self.inner.store(key, value, ttl)
        }

        fn add(&self, key: &str, value: Value, ttl: Option<Duration>) -> StoreResult<bool> {
            self.inner.add(key, value, ttl)
        }

        fn clear(&self) -> StoreResult<()> {
            self.inner.clear()
        }

        fn reconnect(&self) -> StoreResult<()> {
            self.reconnects.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn transient_set_stays_in_process() {
        let store = Arc::new(MemoryStore::new());
        let config = Configuration::new(store.clone());
        config.set("k", json!(1), SetOptions::default()).unwrap();

        assert_eq!(config.get("k").unwrap(), Some(json!(1)));
        assert_eq!(store.fetch("k").unwrap(), None);
    }

    #[test]
    fn persistent_set_is_visible_to_other_configurations() {
        let store: Arc<dyn ConfigStore> = Arc::new(MemoryStore::new());
        Configuration::new(store.clone())
            .set("modules", json!({"a": true}), SetOptions::persistent())
            .unwrap();

        let next = Configuration::new(store);
        assert_eq!(
            next.get_as::<HashMap<String, bool>>("modules").unwrap(),
            Some(HashMap::from([("a".to_string(), true)]))
        );
    }

    #[test]
    fn keep_existing_does_not_overwrite() {
        let config = Configuration::in_memory();
        config.set("k", json!("first"), SetOptions::persistent()).unwrap();
        config
            .set("k", json!("second"), SetOptions::persistent().keep_existing())
            .unwrap();
        assert_eq!(config.get("k").unwrap(), Some(json!("first")));
        assert_eq!(config.store().fetch("k").unwrap(), Some(json!("first")));
    }

    #[test]
    fn get_multiple_refreshes_the_cache() {
        let store: Arc<dyn ConfigStore> = Arc::new(MemoryStore::new());
        let config = Configuration::new(store.clone());
        config.set("a", json!(1), SetOptions::persistent()).unwrap();

        store.store("a", json!(2), None).unwrap();
        assert_eq!(config.get("a").unwrap(), Some(json!(1)));

        let values = config.get_multiple(&["a", "missing"]).unwrap();
        assert_eq!(values, HashMap::from([("a".to_string(), json!(2))]));
        assert_eq!(config.get("a").unwrap(), Some(json!(2)));
        assert_eq!(config.get("missing").unwrap(), None);
    }

    #[test]
    fn set_multiple_writes_every_pair() {
        let store: Arc<dyn ConfigStore> = Arc::new(MemoryStore::new());
        let config = Configuration::new(store.clone());
        config
            .set_multiple(
                [("a".to_string(), json!(1)), ("b".to_string(), json!("two"))],
                SetOptions::persistent(),
            )
            .unwrap();

        let values = Configuration::new(store).get_multiple(&["a", "b"]).unwrap();
        assert_eq!(values.len(), 2);
        assert_eq!(values["b"], json!("two"));
    }

    #[test]
    fn get_multiple_retries_an_unavailable_store() {
        let store = Arc::new(FlakyStore::new(1));
        store.inner.store("k", json!(true), None).unwrap();
        let config = Configuration::new(store.clone());

        assert_eq!(config.get_multiple(&["k"]).unwrap()["k"], json!(true));
        assert_eq!(store.reconnects.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unavailable_store_is_retried_once() {
        let store = Arc::new(FlakyStore::new(1));
        store.inner.store("k", json!(true), None).unwrap();
        let config = Configuration::new(store.clone());

        assert_eq!(config.get("k").unwrap(), Some(json!(true)));
        assert_eq!(store.reconnects.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn second_failure_is_surfaced() {
        let store = Arc::new(FlakyStore::new(2));
        let config = Configuration::new(store.clone());

        assert!(matches!(config.get("k"), Err(ConfigError::Unavailable(_))));
        assert_eq!(store.reconnects.load(Ordering::SeqCst), 1);
    }
}
