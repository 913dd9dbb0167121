//! Per-page host controller
//!
//! A [`PageSession`] is created once for each page view and owns everything
//! the toolbar talks to. Nothing here is global: two pages are two sessions.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::anchor::AnchorLocator;
use crate::config::EngineConfig;
use crate::dom::{DocumentEdit, Range};
use crate::registry::{select_backend, AnnotationRegistry, PointResolver, RestoreStats};
use crate::store::{
    Annotation, Color, DocumentKeyer, ExportEntry, HighlightStore, LegacyMigrator, LegacyStorage,
    MigrationReport, RecordStorage, UrlKeyer,
};

/// One-shot user-visible messages
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str);
}

/// Notifier that writes to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, message: &str) {
        info!("{}", message);
    }
}

/// Collaborators shared by every session
#[derive(Clone)]
pub struct SessionContext {
    pub store: HighlightStore,
    pub legacy: Option<Arc<dyn LegacyStorage>>,
    pub keyer: Arc<dyn DocumentKeyer>,
    pub notifier: Arc<dyn Notifier>,
    pub config: EngineConfig,
}

impl SessionContext {
    pub fn new(storage: Arc<dyn RecordStorage>) -> Self {
        Self {
            store: HighlightStore::new(storage),
            legacy: None,
            keyer: Arc::new(UrlKeyer),
            notifier: Arc::new(LogNotifier),
            config: EngineConfig::default(),
        }
    }

    pub fn with_legacy(mut self, legacy: Arc<dyn LegacyStorage>) -> Self {
        self.legacy = Some(legacy);
        self
    }

    pub fn with_keyer(mut self, keyer: Arc<dyn DocumentKeyer>) -> Self {
        self.keyer = keyer;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }
}

/// Highlights for one open page
pub struct PageSession<D> {
    url: String,
    doc: D,
    registry: AnnotationRegistry,
    settle: Duration,
    migration: Option<MigrationReport>,
}

impl<D: DocumentEdit> PageSession<D> {
    /// Load stored highlights, run the legacy migration once and restore
    /// everything that can still be found
    pub async fn open(context: &SessionContext, url: &str, mut doc: D) -> Self {
        let config = &context.config;
        let document_key = context.keyer.normalize(url);
        let locator = AnchorLocator::new(config.search_window);

        let mut loaded = context.store.load(&document_key).await;

        let migration = match &context.legacy {
            Some(legacy) => {
                let migrator = LegacyMigrator::new(
                    &context.store,
                    legacy.as_ref(),
                    context.keyer.as_ref(),
                    locator,
                );
                match migrator.migrate(&doc, url).await {
                    Ok(report) => {
                        if let Some(message) = report.summary() {
                            context.notifier.notify(&message);
                        }
                        if report.migrated > 0 {
                            loaded = context.store.load(&document_key).await;
                        }
                        Some(report)
                    }
                    Err(e) => {
                        warn!("Legacy migration for {} failed: {}", document_key, e);
                        None
                    }
                }
            }
            None => None,
        };

        let backend = select_backend(&doc, config);
        info!("Rendering highlights for {} with the {} backend", document_key, backend.kind());

        let mut registry = AnnotationRegistry::new(&document_key, context.store.clone(), backend)
            .with_locator(locator)
            .with_id_prefix(&config.id_prefix)
            .with_retained(loaded.retained);
        registry.restore(&mut doc, loaded.annotations);

        Self {
            url: url.to_string(),
            doc,
            registry,
            settle: Duration::from_millis(config.selection_settle_ms),
            migration,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn document_key(&self) -> &str {
        self.registry.document_key()
    }

    pub fn document(&self) -> &D {
        &self.doc
    }

    /// Direct access to the page, e.g. to update the selection
    pub fn document_mut(&mut self) -> &mut D {
        &mut self.doc
    }

    pub fn into_document(self) -> D {
        self.doc
    }

    pub fn registry(&self) -> &AnnotationRegistry {
        &self.registry
    }

    pub fn restore_stats(&self) -> RestoreStats {
        self.registry.stats()
    }

    /// Report of the migration pass run while opening, if any
    pub fn migration(&self) -> Option<&MigrationReport> {
        self.migration.as_ref()
    }

    pub async fn create(&mut self, range: &Range, color: Color) -> Option<String> {
        self.registry.create(&mut self.doc, range, color).await
    }

    /// Highlight whatever is selected once the platform has settled it
    pub async fn highlight_selection(&mut self, color: Color) -> Option<String> {
        tokio::time::sleep(self.settle).await;
        let selection = self.doc.selection()?;
        self.create(&selection, color).await
    }

    pub async fn remove(&mut self, id: &str) -> bool {
        self.registry.remove(&mut self.doc, id).await
    }

    pub async fn clear(&mut self) {
        self.registry.clear(&mut self.doc).await
    }

    pub fn list(&self) -> Vec<Annotation> {
        self.registry.list()
    }

    pub fn count(&self) -> usize {
        self.registry.count()
    }

    pub fn collect_for_export(&self) -> Vec<ExportEntry> {
        self.registry.collect_for_export()
    }

    pub fn hit_test(&self, resolver: &dyn PointResolver, x: f64, y: f64) -> Option<String> {
        self.registry.hit_test(&self.doc, resolver, x, y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;

    use crate::config::RenderBackendChoice;
    use crate::dom::{Boundary, Document, DocumentView};
    use crate::registry::BackendKind;
    use crate::store::{MemoryLegacyStorage, MemoryStorage};

    const URL: &str = "https://example.com/post#comments";
    const PAGE: &str = "<div><p>hello world</p><p>another paragraph of text</p></div>";

    #[derive(Default)]
    struct Recorder(Mutex<Vec<String>>);

    impl Notifier for Recorder {
        fn notify(&self, message: &str) {
            self.0.lock().push(message.to_string());
        }
    }

    fn page() -> Document {
        Document::from_body_fragment(PAGE).unwrap()
    }

    #[tokio::test]
    async fn test_highlights_survive_reload() {
        let storage = Arc::new(MemoryStorage::new());
        let context = SessionContext::new(storage.clone());

        let mut session = PageSession::open(&context, URL, page()).await;
        assert_eq!(session.document_key(), "https://example.com/post");
        let range = session.document().range_of("hello").unwrap();
        let id = session.create(&range, Color::Blue).await.unwrap();
        assert_eq!(id, "hl-1");

        let reloaded = PageSession::open(&context, URL, page()).await;
        assert_eq!(reloaded.count(), 1);
        let restored = &reloaded.list()[0];
        assert_eq!(restored.text, "hello");
        assert_eq!(restored.color, Color::Blue);
        assert_eq!(reloaded.restore_stats().restored, 1);
        assert_eq!(
            reloaded.document().to_html(),
            page_with_mark(),
        );
    }

    fn page_with_mark() -> String {
        let mut doc = page();
        let node = doc.text_node_containing("hello").unwrap();
        doc.split_text(node, 5);
        doc.wrap(
            node,
            "mark",
            &[
                ("class", "page-highlight page-highlight-blue"),
                ("data-annotation-id", "hl-1"),
                ("data-color", "blue"),
            ],
        );
        doc.to_html()
    }

    #[tokio::test]
    async fn test_native_backend_when_available() {
        let storage = Arc::new(MemoryStorage::new());
        let context = SessionContext::new(storage);
        let mut doc = page();
        doc.set_highlight_api(true);

        let mut session = PageSession::open(&context, URL, doc).await;
        assert_eq!(session.registry().backend_kind(), BackendKind::Native);

        let range = session.document().range_of("world").unwrap();
        session.create(&range, Color::Yellow).await.unwrap();
        assert!(session.document().elements_by_tag("mark").is_empty());
        assert_eq!(
            session.document().highlight("page-highlight-yellow").unwrap(),
            &[range]
        );
    }

    #[tokio::test]
    async fn test_highlight_selection_after_settle() {
        let storage = Arc::new(MemoryStorage::new());
        let context = SessionContext::new(storage);
        let mut session = PageSession::open(&context, URL, page()).await;

        assert!(session.highlight_selection(Color::Red).await.is_none());

        let range = session.document().range_of("paragraph").unwrap();
        session.document_mut().set_selection(Some(range));
        let id = session.highlight_selection(Color::Red).await.unwrap();
        assert_eq!(session.registry().get(&id).unwrap().text, "paragraph");

        let node = session.document().text_node_containing("another").unwrap();
        session
            .document_mut()
            .set_selection(Some(Range::caret(Boundary::new(node, 0))));
        assert!(session.highlight_selection(Color::Red).await.is_none());
    }

    #[tokio::test]
    async fn test_open_migrates_legacy_and_notifies_once() {
        let storage = Arc::new(MemoryStorage::new());
        let legacy = Arc::new(MemoryLegacyStorage::new());
        legacy.insert(
            "https://example.com/post",
            json!([{"text": "hello world", "color": "#90ee90", "timestamp": 1}]),
        );
        let recorder = Arc::new(Recorder::default());
        let context = SessionContext::new(storage)
            .with_legacy(legacy.clone())
            .with_notifier(recorder.clone());

        let session = PageSession::open(&context, URL, page()).await;
        assert_eq!(session.count(), 1);
        assert_eq!(session.list()[0].color, Color::Green);
        assert_eq!(session.migration().unwrap().migrated, 1);
        assert!(!legacy.contains("https://example.com/post"));

        let again = PageSession::open(&context, URL, page()).await;
        assert_eq!(again.count(), 1);
        assert!(again.migration().unwrap().already_done);
        assert_eq!(recorder.0.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_storage_outage_opens_empty() {
        let storage = Arc::new(MemoryStorage::new());
        let context = SessionContext::new(storage.clone());
        let mut session = PageSession::open(&context, URL, page()).await;
        let range = session.document().range_of("hello").unwrap();
        session.create(&range, Color::Yellow).await.unwrap();

        storage.set_offline(true);
        let offline = PageSession::open(&context, URL, page()).await;
        assert_eq!(offline.count(), 0);
    }

    #[tokio::test]
    async fn test_clear_and_export() {
        let storage = Arc::new(MemoryStorage::new());
        let config = EngineConfig {
            render_backend: RenderBackendChoice::Wrap,
            id_prefix: "note-".to_string(),
            ..EngineConfig::default()
        };
        let context = SessionContext::new(storage.clone()).with_config(config);
        let mut session = PageSession::open(&context, URL, page()).await;

        let hello = session.document().range_of("hello").unwrap();
        let id = session.create(&hello, Color::Green).await.unwrap();
        assert_eq!(id, "note-1");
        let exported = session.collect_for_export();
        assert_eq!(exported[0].color, "green_background");

        session.clear().await;
        assert_eq!(session.count(), 0);
        assert!(storage.peek("highlights:https://example.com/post").is_none());
        assert_eq!(session.document().to_html(), page().to_html());
    }

    #[tokio::test]
    async fn test_hit_test_through_session() {
        let storage = Arc::new(MemoryStorage::new());
        let context = SessionContext::new(storage);
        let mut session = PageSession::open(&context, URL, page()).await;
        let range = session.document().range_of("world").unwrap();
        let id = session.create(&range, Color::Yellow).await.unwrap();

        let mark = session.document().elements_by_tag("mark")[0];
        let inside = session.document().children(mark)[0];
        let resolver = move |_x: f64, _y: f64| Some(Range::caret(Boundary::new(inside, 1)));
        assert_eq!(session.hit_test(&resolver, 10.0, 20.0), Some(id));
    }

    #[tokio::test]
    async fn test_unreadable_entries_survive_edits() {
        let storage = Arc::new(MemoryStorage::new());
        let unknown = json!({"note": "from a newer version"});
        storage.seed(
            "highlights:https://example.com/post",
            json!({"documentKey": "https://example.com/post", "annotations": [
                {"id": "hl-9", "color": "yellow", "text": "hello", "createdAt": 1, "rangeInfo": {
                    "startContainerPath": "div[0]/p[0]/text[0]", "startOffset": 0,
                    "endContainerPath": "div[0]/p[0]/text[0]", "endOffset": 5
                }},
                unknown.clone()
            ]}),
        );
        let context = SessionContext::new(storage.clone());

        let mut session = PageSession::open(&context, URL, page()).await;
        assert_eq!(session.count(), 1);
        let range = session.document().range_of("another").unwrap();
        session.create(&range, Color::Red).await.unwrap();

        let record = storage.peek("highlights:https://example.com/post").unwrap();
        let entries = record["annotations"].as_array().unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[2], unknown);

        let reloaded = PageSession::open(&context, URL, page()).await;
        assert_eq!(reloaded.count(), 2);
    }
}
