//! One-shot migration from the legacy namespace
//!
//! Legacy entries are keyed by raw URL and carry no anchor, so each entry's
//! text is searched for in the live page and a fresh anchor is encoded from
//! wherever it is found.

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::highlight_store::HighlightStore;
use super::keys::DocumentKeyer;
use super::records::MigrationRecord;
use super::schema::{classify, upgrade_to_latest};
use super::storage::LegacyStorage;
use crate::anchor::{encode, AnchorLocator};
use crate::dom::DocumentView;
use crate::error::{EngineError, Result};

/// What a migration pass did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    pub document_key: String,
    /// Legacy key the entries were read from
    pub source_key: Option<String>,
    pub total: usize,
    pub migrated: usize,
    pub failed: usize,
    /// A previous pass already ran for this document
    pub already_done: bool,
    pub legacy_deleted: bool,
}

impl MigrationReport {
    /// `Err(MigrationPartialFailure)` when only some entries were recovered
    pub fn outcome(&self) -> Result<()> {
        if self.failed > 0 && self.migrated > 0 {
            return Err(EngineError::MigrationPartialFailure {
                migrated: self.migrated,
                failed: self.failed,
            });
        }
        Ok(())
    }

    /// One-line message for the user, `None` if there was nothing to migrate
    pub fn summary(&self) -> Option<String> {
        if self.already_done || self.total == 0 {
            return None;
        }
        Some(if self.failed == 0 {
            format!("Recovered {} saved highlights on this page", self.migrated)
        } else {
            format!(
                "Recovered {} of {} saved highlights; {} could not be found on this page",
                self.migrated, self.total, self.failed
            )
        })
    }
}

/// Moves legacy entries for one page into the current store
pub struct LegacyMigrator<'a> {
    store: &'a HighlightStore,
    legacy: &'a dyn LegacyStorage,
    keyer: &'a dyn DocumentKeyer,
    locator: AnchorLocator,
}

impl<'a> LegacyMigrator<'a> {
    pub fn new(
        store: &'a HighlightStore,
        legacy: &'a dyn LegacyStorage,
        keyer: &'a dyn DocumentKeyer,
        locator: AnchorLocator,
    ) -> Self {
        Self {
            store,
            legacy,
            keyer,
            locator,
        }
    }

    /// Find the legacy key holding this page's entries: the exact URL, then
    /// a few variants, then every key whose normalized form matches
    pub fn find_legacy_key(&self, url: &str, document_key: &str) -> Result<Option<String>> {
        for candidate in self.keyer.legacy_variants(url) {
            if self.legacy.get(&candidate)?.is_some() {
                return Ok(Some(candidate));
            }
        }

        debug!("Scanning legacy namespace for {}", document_key);
        Ok(self
            .legacy
            .keys()?
            .into_iter()
            .find(|key| self.keyer.normalize(key) == document_key))
    }

    /// Run the migration for `url` unless it already ran
    ///
    /// The legacy entry is deleted only when every entry was recovered.
    pub async fn migrate<V: DocumentView + ?Sized>(
        &self,
        view: &V,
        url: &str,
    ) -> Result<MigrationReport> {
        let document_key = self.keyer.normalize(url);
        let mut report = MigrationReport {
            document_key: document_key.clone(),
            ..MigrationReport::default()
        };

        if self.store.migration_record(&document_key).await?.is_some() {
            report.already_done = true;
            return Ok(report);
        }

        let source_key = self.find_legacy_key(url, &document_key)?;
        let entries = match &source_key {
            Some(key) => match self.legacy.get(key)? {
                Some(Value::Array(entries)) => entries,
                Some(_) => {
                    warn!("Legacy entry {} is not a list, ignoring it", key);
                    Vec::new()
                }
                None => Vec::new(),
            },
            None => Vec::new(),
        };
        report.source_key = source_key.clone();
        report.total = entries.len();

        if !entries.is_empty() {
            let loaded = self.store.read(&document_key).await?;
            let mut annotations = loaded.annotations;
            let now = Utc::now();

            for entry in &entries {
                let upgraded = classify(entry).and_then(|shape| {
                    upgrade_to_latest(shape, now, |text| {
                        let located = self.locator.locate_text(view, text)?;
                        encode(view, &located.range).ok()
                    })
                });

                match upgraded {
                    Some(annotation) => {
                        report.migrated += 1;
                        if !annotations.iter().any(|a| a.same_identity(&annotation)) {
                            annotations.push(annotation);
                        }
                    }
                    None => report.failed += 1,
                }
            }

            if report.migrated > 0 {
                self.store
                    .try_save(&document_key, &annotations, &loaded.retained)
                    .await?;
            }
        }

        self.store
            .save_migration_record(&MigrationRecord {
                document_key: document_key.clone(),
                timestamp: Utc::now(),
                source_key: source_key.clone(),
                total_count: report.total,
                success_count: report.migrated,
                fail_count: report.failed,
            })
            .await?;

        if let Some(key) = &source_key {
            if report.migrated > 0 && report.failed == 0 {
                self.legacy.remove(key)?;
                report.legacy_deleted = true;
            }
        }

        match report.outcome() {
            Ok(()) if report.total > 0 => info!(
                "Migrated {} legacy highlights for {}",
                report.migrated, document_key
            ),
            Ok(()) => {}
            Err(e) => warn!("{} for {}; legacy entry kept", e, document_key),
        }
        Ok(report)
    }
}
