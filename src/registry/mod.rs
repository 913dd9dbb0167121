//! Active annotations for one page view
//!
//! The registry owns the in-memory annotation set, hands out session ids and
//! drives the render backend. Every change is persisted as a full list.

mod render;

use std::cmp::Ordering;

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, info, warn};

pub use render::{
    select_backend, BackendKind, DomWrapBackend, HighlightCollectionBackend, Placement,
    RenderBackend,
};

use crate::anchor::{encode, AnchorLocator, Located, Strategy};
use crate::dom::{compare_boundaries, DocumentEdit, DocumentView, Range};
use crate::error::EngineError;
use crate::store::{Annotation, Color, ExportEntry, HighlightStore};

/// Platform caret-from-point lookup
pub trait PointResolver {
    /// Collapsed range at viewport coordinates
    fn caret_at(&self, x: f64, y: f64) -> Option<Range>;
}

impl<F> PointResolver for F
where
    F: Fn(f64, f64) -> Option<Range>,
{
    fn caret_at(&self, x: f64, y: f64) -> Option<Range> {
        self(x, y)
    }
}

/// Aggregate outcome of a restore pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreStats {
    pub restored: usize,
    pub failed: usize,
    /// Failed annotations whose stored path did not even decode
    pub malformed_paths: usize,
    /// Restored from a resolved path although the text differed
    pub path_mismatches: usize,
}

#[derive(Debug, Clone)]
struct ActiveAnnotation {
    annotation: Annotation,
    range: Range,
}

pub struct AnnotationRegistry {
    document_key: String,
    store: HighlightStore,
    backend: Box<dyn RenderBackend>,
    locator: AnchorLocator,
    id_prefix: String,
    next_seq: u64,
    active: Vec<ActiveAnnotation>,
    // Failed to restore this session, still persisted
    dormant: Vec<Annotation>,
    // Stored entries this version cannot read, written back untouched
    retained: Vec<Value>,
    stats: RestoreStats,
}

impl AnnotationRegistry {
    pub fn new(document_key: &str, store: HighlightStore, backend: Box<dyn RenderBackend>) -> Self {
        Self {
            document_key: document_key.to_string(),
            store,
            backend,
            locator: AnchorLocator::default(),
            id_prefix: "hl-".to_string(),
            next_seq: 1,
            active: Vec::new(),
            dormant: Vec::new(),
            retained: Vec::new(),
            stats: RestoreStats::default(),
        }
    }

    pub fn with_locator(mut self, locator: AnchorLocator) -> Self {
        self.locator = locator;
        self
    }

    pub fn with_id_prefix(mut self, prefix: &str) -> Self {
        self.id_prefix = prefix.to_string();
        self
    }

    /// Raw stored entries to keep alongside every save
    pub fn with_retained(mut self, retained: Vec<Value>) -> Self {
        self.retained = retained;
        self
    }

    pub fn document_key(&self) -> &str {
        &self.document_key
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    /// Statistics of the last restore pass
    pub fn stats(&self) -> RestoreStats {
        self.stats
    }

    fn allocate_id(&mut self) -> String {
        let id = format!("{}{}", self.id_prefix, self.next_seq);
        self.next_seq += 1;
        id
    }

    /// Everything that is written back: active first, then dormant
    fn persisted(&self) -> Vec<Annotation> {
        self.active
            .iter()
            .map(|a| a.annotation.clone())
            .chain(self.dormant.iter().cloned())
            .collect()
    }

    async fn persist(&self) {
        self.store
            .save(&self.document_key, &self.persisted(), &self.retained)
            .await;
    }

    /// Highlight a user selection
    ///
    /// Returns `None` without side effects for a collapsed range, a range
    /// covering no text, or one outside the page body.
    pub async fn create(
        &mut self,
        doc: &mut dyn DocumentEdit,
        range: &Range,
        color: Color,
    ) -> Option<String> {
        if range.is_collapsed() {
            return None;
        }
        let text = doc.string_of(range);
        if text.is_empty() {
            return None;
        }
        let anchor = match encode(&*doc, range) {
            Ok(anchor) => anchor,
            Err(e) => {
                debug!("Not highlighting selection: {}", e);
                return None;
            }
        };

        let id = self.allocate_id();
        if let Err(e) = self.backend.add(doc, &id, range, color) {
            warn!("Failed to render {}: {}", id, e);
        }
        self.active.push(ActiveAnnotation {
            annotation: Annotation {
                id: id.clone(),
                color,
                text,
                created_at: Utc::now(),
                anchor,
            },
            range: *range,
        });

        self.persist().await;
        Some(id)
    }

    /// Remove one highlight, returns whether it existed
    pub async fn remove(&mut self, doc: &mut dyn DocumentEdit, id: &str) -> bool {
        let Some(position) = self.active.iter().position(|a| a.annotation.id == id) else {
            return false;
        };
        self.active.remove(position);
        self.backend.remove(doc, id);
        self.persist().await;
        true
    }

    /// Remove every highlight on the page, including ones that could not be
    /// restored, and delete the stored record
    pub async fn clear(&mut self, doc: &mut dyn DocumentEdit) {
        self.active.clear();
        self.dormant.clear();
        self.retained.clear();
        self.backend.clear(doc);
        if let Err(e) = self.store.clear(&self.document_key).await {
            warn!("Failed to clear highlights for {}: {}", self.document_key, e);
        }
    }

    pub fn list(&self) -> Vec<Annotation> {
        self.active.iter().map(|a| a.annotation.clone()).collect()
    }

    pub fn get(&self, id: &str) -> Option<&Annotation> {
        self.active
            .iter()
            .map(|a| &a.annotation)
            .find(|a| a.id == id)
    }

    pub fn count(&self) -> usize {
        self.active.len()
    }

    /// Text and export color name of every active highlight
    pub fn collect_for_export(&self) -> Vec<ExportEntry> {
        self.active
            .iter()
            .map(|a| ExportEntry::from(&a.annotation))
            .collect()
    }

    /// First active highlight overlapping the caret at `(x, y)`
    pub fn hit_test(
        &self,
        doc: &dyn DocumentEdit,
        resolver: &dyn PointResolver,
        x: f64,
        y: f64,
    ) -> Option<String> {
        let point = resolver.caret_at(x, y)?;
        self.active
            .iter()
            .find(|active| {
                let range = self
                    .backend
                    .rendered_range(doc, &active.annotation.id)
                    .unwrap_or(active.range);
                overlaps(doc, &range, &point)
            })
            .map(|active| active.annotation.id.clone())
    }

    /// Relocate stored annotations and draw the ones that were found
    ///
    /// Each restored annotation gets a fresh session id. Misses stay dormant
    /// and are only reflected in the returned statistics.
    pub fn restore(&mut self, doc: &mut dyn DocumentEdit, stored: Vec<Annotation>) -> RestoreStats {
        let mut stats = RestoreStats::default();
        let mut found: Vec<(Annotation, Located)> = Vec::new();

        // Locate everything before rendering, wrapping rewrites the tree
        for annotation in stored {
            match self.locator.resolve(&*doc, &annotation.anchor, &annotation.text) {
                Ok(located) => {
                    if located.strategy == Strategy::PathMismatch {
                        stats.path_mismatches += 1;
                    }
                    debug!("Restored {:?} via {}", annotation.text, located.strategy);
                    found.push((annotation, located));
                }
                Err(e) => {
                    if matches!(e, EngineError::MalformedAnchor(_)) {
                        stats.malformed_paths += 1;
                    }
                    if e.is_per_annotation() {
                        debug!("Could not restore {:?}: {}", annotation.text, e);
                    } else {
                        warn!("Could not restore {:?}: {}", annotation.text, e);
                    }
                    stats.failed += 1;
                    self.dormant.push(annotation);
                }
            }
        }

        let mut restored: Vec<ActiveAnnotation> = found
            .into_iter()
            .map(|(mut annotation, located)| {
                annotation.id = self.allocate_id();
                ActiveAnnotation {
                    annotation,
                    range: located.range,
                }
            })
            .collect();

        let placements: Vec<Placement> = restored
            .iter()
            .map(|active| Placement {
                id: active.annotation.id.clone(),
                range: active.range,
                color: active.annotation.color,
            })
            .collect();
        let results = self.backend.add_all(doc, &placements);
        for (placement, result) in placements.iter().zip(results) {
            if let Err(e) = result {
                warn!("Failed to render {}: {}", placement.id, e);
            }
        }

        stats.restored = restored.len();
        self.active.append(&mut restored);
        self.stats = stats;

        info!(
            "Restored {} highlights for {} ({} failed, {} malformed, {} path mismatches)",
            stats.restored,
            self.document_key,
            stats.failed,
            stats.malformed_paths,
            stats.path_mismatches
        );
        stats
    }
}

fn overlaps<V: DocumentView + ?Sized>(view: &V, range: &Range, point: &Range) -> bool {
    let starts_before = compare_boundaries(view, range.start, point.end);
    let ends_after = compare_boundaries(view, point.start, range.end);
    matches!(starts_before, Some(Ordering::Less | Ordering::Equal))
        && matches!(ends_after, Some(Ordering::Less | Ordering::Equal))
}
