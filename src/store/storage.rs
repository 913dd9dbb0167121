//! Storage collaborator traits

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

/// Asynchronous key/value storage for document records
///
/// Writes replace the whole value, so a duplicated `set` is harmless.
#[async_trait]
pub trait RecordStorage: Send + Sync {
    /// Read a value, `None` if the key was never written
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Write a value, replacing any previous one
    async fn set(&self, key: &str, value: Value) -> Result<()>;

    /// Delete a value. Removing a missing key is not an error.
    async fn remove(&self, key: &str) -> Result<()>;
}

/// The legacy namespace, keyed by raw page URLs
pub trait LegacyStorage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Every key currently in the namespace
    fn keys(&self) -> Result<Vec<String>>;

    fn remove(&self, key: &str) -> Result<()>;
}
