//! In-memory storage backends

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;

use super::storage::{LegacyStorage, RecordStorage};
use crate::error::{EngineError, Result};

/// Record storage held in a map
///
/// Can be switched offline to exercise storage failure handling.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    values: RwLock<HashMap<String, Value>>,
    offline: AtomicBool,
    writes: AtomicUsize,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail with `StorageUnavailable`
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of successful `set` calls so far
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Read a value bypassing the offline switch
    pub fn peek(&self, key: &str) -> Option<Value> {
        self.values.read().get(key).cloned()
    }

    /// Write a value without counting it
    pub fn seed(&self, key: &str, value: Value) {
        self.values.write().insert(key.to_string(), value);
    }

    fn check(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(EngineError::StorageUnavailable(
                "memory storage is offline".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStorage for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        self.check()?;
        Ok(self.values.read().get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        self.check()?;
        self.values.write().insert(key.to_string(), value);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.check()?;
        self.values.write().remove(key);
        Ok(())
    }
}

/// Legacy namespace held in a map
#[derive(Debug, Default)]
pub struct MemoryLegacyStorage {
    entries: RwLock<BTreeMap<String, Value>>,
}

impl MemoryLegacyStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, key: &str, value: Value) {
        self.entries.write().insert(key.to_string(), value);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.read().contains_key(key)
    }
}

impl LegacyStorage for MemoryLegacyStorage {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(self.entries.read().keys().cloned().collect())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries.write().remove(key);
        Ok(())
    }
}
