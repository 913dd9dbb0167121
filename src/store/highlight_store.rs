//! Per-document annotation persistence

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::records::{Annotation, MigrationRecord, PersistedDocumentRecord};
use super::schema::{classify, gen1_to_gen2, StoredShape};
use super::storage::RecordStorage;
use crate::error::Result;

pub fn record_key(document_key: &str) -> String {
    format!("highlights:{}", document_key)
}

pub fn migration_key(document_key: &str) -> String {
    format!("migration:{}", document_key)
}

/// Result of reading a stored record
#[derive(Debug, Default)]
pub struct Loaded {
    pub annotations: Vec<Annotation>,
    /// Raw entries that matched no usable generation. They are written back
    /// untouched with every save of the record.
    pub retained: Vec<Value>,
    /// At least one entry was in an older shape
    pub upgraded: bool,
}

impl Loaded {
    /// Number of entries kept raw
    pub fn skipped(&self) -> usize {
        self.retained.len()
    }
}

/// Loads and saves annotation lists, normalizing stored shapes to gen2
#[derive(Clone)]
pub struct HighlightStore {
    storage: Arc<dyn RecordStorage>,
}

impl HighlightStore {
    pub fn new(storage: Arc<dyn RecordStorage>) -> Self {
        Self { storage }
    }

    /// Load a document's annotations
    ///
    /// Storage failures yield an empty set. Entries stored in an older
    /// generation are upgraded and written back once, together with any
    /// entries that could not be read.
    pub async fn load(&self, document_key: &str) -> Loaded {
        let loaded = match self.read(document_key).await {
            Ok(loaded) => loaded,
            Err(e) => {
                warn!("Failed to load highlights for {}: {}", document_key, e);
                return Loaded::default();
            }
        };

        if loaded.upgraded {
            info!(
                "Upgraded stored highlights for {} to the current format",
                document_key
            );
            self.save(document_key, &loaded.annotations, &loaded.retained)
                .await;
        }
        loaded
    }

    /// Read and normalize without writing anything back
    pub async fn read(&self, document_key: &str) -> Result<Loaded> {
        let Some(value) = self.storage.get(&record_key(document_key)).await? else {
            return Ok(Loaded::default());
        };

        let (entries, mut upgraded) = match value {
            Value::Object(mut record) => match record.remove("annotations") {
                Some(Value::Array(entries)) => (entries, false),
                _ => (Vec::new(), false),
            },
            // Bare arrays predate the record wrapper
            Value::Array(entries) => (entries, true),
            _ => (Vec::new(), false),
        };

        let now = Utc::now();
        let mut loaded = Loaded::default();
        for entry in &entries {
            match classify(entry) {
                Some(StoredShape::Gen2(annotation)) => loaded.annotations.push(annotation),
                Some(StoredShape::Gen1(record)) => {
                    loaded.annotations.push(gen1_to_gen2(&record, now));
                    upgraded = true;
                }
                Some(StoredShape::Gen0(gen0)) => {
                    debug!("Keeping anchor-less entry {:?} in {}", gen0.text, document_key);
                    loaded.retained.push(entry.clone());
                }
                None => {
                    debug!("Keeping unrecognized entry in {}", document_key);
                    loaded.retained.push(entry.clone());
                }
            }
        }
        loaded.upgraded = upgraded;
        Ok(loaded)
    }

    /// Replace the stored list, logging failures
    pub async fn save(&self, document_key: &str, annotations: &[Annotation], retained: &[Value]) {
        if let Err(e) = self.try_save(document_key, annotations, retained).await {
            warn!("Failed to save highlights for {}: {}", document_key, e);
        }
    }

    /// Replace the stored list
    ///
    /// `retained` entries are appended verbatim after the annotations.
    pub async fn try_save(
        &self,
        document_key: &str,
        annotations: &[Annotation],
        retained: &[Value],
    ) -> Result<()> {
        let record = PersistedDocumentRecord {
            document_key: document_key.to_string(),
            annotations: annotations.to_vec(),
        };
        let mut value = serde_json::to_value(&record)?;
        if let Some(Value::Array(entries)) = value.get_mut("annotations") {
            entries.extend(retained.iter().cloned());
        }
        self.storage.set(&record_key(document_key), value).await
    }

    /// Delete the document's record
    pub async fn clear(&self, document_key: &str) -> Result<()> {
        self.storage.remove(&record_key(document_key)).await
    }

    pub async fn migration_record(&self, document_key: &str) -> Result<Option<MigrationRecord>> {
        match self.storage.get(&migration_key(document_key)).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    pub async fn save_migration_record(&self, record: &MigrationRecord) -> Result<()> {
        self.storage
            .set(
                &migration_key(&record.document_key),
                serde_json::to_value(record)?,
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anchor::Anchor;
    use crate::store::{Color, MemoryStorage};
    use serde_json::json;

    fn annotation(text: &str) -> Annotation {
        Annotation {
            id: "hl-1".to_string(),
            color: Color::Green,
            text: text.to_string(),
            created_at: Utc::now(),
            anchor: Anchor {
                start_path: "p[0]/text[0]".to_string(),
                start_offset: 0,
                end_path: "p[0]/text[0]".to_string(),
                end_offset: text.chars().count(),
            },
        }
    }

    fn setup() -> (Arc<MemoryStorage>, HighlightStore) {
        let storage = Arc::new(MemoryStorage::new());
        let store = HighlightStore::new(storage.clone());
        (storage, store)
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let (storage, store) = setup();
        store.save("doc", &[annotation("a"), annotation("b")], &[]).await;

        let stored = storage.peek("highlights:doc").unwrap();
        assert_eq!(stored["documentKey"], "doc");

        let loaded = store.load("doc").await.annotations;
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[1].text, "b");
        assert_eq!(storage.write_count(), 1);
    }

    #[tokio::test]
    async fn test_load_missing_is_empty() {
        let (_, store) = setup();
        assert!(store.load("nothing").await.annotations.is_empty());
    }

    #[tokio::test]
    async fn test_load_fails_open() {
        let (storage, store) = setup();
        storage.seed("highlights:doc", json!({"documentKey": "doc", "annotations": []}));
        storage.set_offline(true);
        assert!(store.load("doc").await.annotations.is_empty());
        // Save failures are swallowed
        store.save("doc", &[annotation("x")], &[]).await;
        assert!(store.try_save("doc", &[annotation("x")], &[]).await.is_err());
    }

    #[tokio::test]
    async fn test_gen1_write_back_on_read_happens_once() {
        let (storage, store) = setup();
        storage.seed(
            "highlights:doc",
            json!({"documentKey": "doc", "annotations": [
                {"text": "hello", "color": "blue", "timestamp": 10, "rangeInfo": {
                    "startContainerPath": [
                        {"type": "element", "tag": "div", "index": 0},
                        {"type": "text", "index": 0}
                    ],
                    "text": "hello", "startOffset": 0, "endOffset": 5
                }}
            ]}),
        );

        let first = store.load("doc").await.annotations;
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].anchor.start_path, "div[0]/text[0]");
        assert_eq!(storage.write_count(), 1);

        let stored = storage.peek("highlights:doc").unwrap();
        let info = &stored["annotations"][0]["rangeInfo"];
        assert_eq!(info["startContainerPath"], "div[0]/text[0]");
        assert!(info.get("text").is_none());

        let second = store.load("doc").await.annotations;
        assert_eq!(second, first);
        assert_eq!(storage.write_count(), 1);
    }

    #[tokio::test]
    async fn test_bare_array_and_unknown_entries() {
        let (storage, store) = setup();
        let current = serde_json::to_value(annotation("kept")).unwrap();
        storage.seed(
            "highlights:doc",
            json!([current, {"bogus": true}, {"text": "no anchor", "color": "red"}]),
        );

        let loaded = store.read("doc").await.unwrap();
        assert_eq!(loaded.annotations.len(), 1);
        assert_eq!(loaded.skipped(), 2);
        assert!(loaded.upgraded);
    }

    #[tokio::test]
    async fn test_clear_and_migration_record() {
        let (storage, store) = setup();
        store.save("doc", &[annotation("a")], &[]).await;
        store.clear("doc").await.unwrap();
        assert!(storage.peek("highlights:doc").is_none());

        assert!(store.migration_record("doc").await.unwrap().is_none());
        let record = MigrationRecord {
            document_key: "doc".to_string(),
            timestamp: Utc::now(),
            source_key: Some("https://x/".to_string()),
            total_count: 2,
            success_count: 2,
            fail_count: 0,
        };
        store.save_migration_record(&record).await.unwrap();
        let back = store.migration_record("doc").await.unwrap().unwrap();
        assert_eq!(back.source_key.as_deref(), Some("https://x/"));
        assert_eq!(back.success_count, 2);
    }

    #[tokio::test]
    async fn test_upgrade_keeps_unreadable_siblings() {
        let (storage, store) = setup();
        let anchorless = json!({"text": "no anchor", "color": "red", "timestamp": 3});
        let unknown = json!({"note": "from a newer version"});
        storage.seed(
            "highlights:doc",
            json!({"documentKey": "doc", "annotations": [
                {"text": "hello", "color": "blue", "timestamp": 10, "rangeInfo": {
                    "startContainerPath": [{"type": "text", "index": 0}],
                    "startOffset": 0, "endOffset": 5
                }},
                {"text": "both keys", "timestamp": 1, "createdAt": 2, "rangeInfo": {
                    "startContainerPath": [{"type": "text", "index": 1}],
                    "startOffset": 0, "endOffset": 4
                }},
                anchorless.clone(),
                unknown.clone()
            ]}),
        );

        let loaded = store.load("doc").await;
        assert_eq!(loaded.annotations.len(), 2);
        assert_eq!(loaded.skipped(), 2);

        let stored = storage.peek("highlights:doc").unwrap();
        let entries = stored["annotations"].as_array().unwrap();
        assert_eq!(entries.len(), 4);
        assert_eq!(entries[2], anchorless);
        assert_eq!(entries[3], unknown);

        // A later save of the active list still carries them
        store
            .save("doc", &loaded.annotations[..1], &loaded.retained)
            .await;
        let stored = storage.peek("highlights:doc").unwrap();
        assert_eq!(stored["annotations"].as_array().unwrap().len(), 3);
    }
}
