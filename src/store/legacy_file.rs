//! Legacy namespace read from a JSON dump
//!
//! The file is a single object mapping raw page URLs to arrays of legacy
//! entries. A missing file is an empty namespace.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde_json::{Map, Value};

use super::storage::LegacyStorage;
use crate::error::{EngineError, Result};

#[derive(Debug)]
pub struct JsonFileLegacyStorage {
    path: PathBuf,
    // Serializes read-modify-write cycles on remove
    lock: Mutex<()>,
}

impl JsonFileLegacyStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<Map<String, Value>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(e.into()),
        };
        if raw.trim().is_empty() {
            return Ok(Map::new());
        }
        match serde_json::from_str(&raw)? {
            Value::Object(map) => Ok(map),
            _ => Err(EngineError::StorageUnavailable(format!(
                "{} is not a JSON object",
                self.path.display()
            ))),
        }
    }
}

impl LegacyStorage for JsonFileLegacyStorage {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.read_all()?.remove(key))
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(self.read_all()?.keys().cloned().collect())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let _guard = self.lock.lock();
        let mut all = self.read_all()?;
        if all.remove(key).is_some() {
            fs::write(&self.path, serde_json::to_string_pretty(&Value::Object(all))?)?;
        }
        Ok(())
    }
}
