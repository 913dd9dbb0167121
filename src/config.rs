//! Configuration management for the highlight engine

use std::env;

use crate::anchor::DEFAULT_SEARCH_WINDOW;

#[derive(Debug, Clone)]
pub struct Config {
    pub engine: EngineConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Consecutive text nodes joined by the sliding window search
    pub search_window: usize,
    /// Delay before reading the selection after a selection event
    pub selection_settle_ms: u64,
    pub id_prefix: String,
    pub render_backend: RenderBackendChoice,
    /// Element used by the DOM-wrapping backend
    pub marker_tag: String,
    pub marker_class: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderBackendChoice {
    /// Native highlight collections when available, otherwise wrapping
    Auto,
    Native,
    Wrap,
}

impl RenderBackendChoice {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "native" => RenderBackendChoice::Native,
            "wrap" => RenderBackendChoice::Wrap,
            _ => RenderBackendChoice::Auto,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub database_url: String,
    /// JSON dump of the legacy namespace
    pub legacy_file: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            search_window: DEFAULT_SEARCH_WINDOW,
            selection_settle_ms: 10,
            id_prefix: "hl-".to_string(),
            render_backend: RenderBackendChoice::Auto,
            marker_tag: "mark".to_string(),
            marker_class: "page-highlight".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            engine: EngineConfig::default(),
            storage: StorageConfig {
                database_url: "sqlite:./highlights.db".to_string(),
                legacy_file: None,
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        let defaults = EngineConfig::default();
        Ok(Config {
            engine: EngineConfig {
                search_window: env::var("HIGHLIGHTS_SEARCH_WINDOW")
                    .ok()
                    .and_then(|v| v.parse::<usize>().ok())
                    .filter(|&w| w > 0)
                    .unwrap_or(defaults.search_window),
                selection_settle_ms: env::var("HIGHLIGHTS_SETTLE_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.selection_settle_ms),
                id_prefix: env::var("HIGHLIGHTS_ID_PREFIX").unwrap_or(defaults.id_prefix),
                render_backend: env::var("HIGHLIGHTS_RENDER_BACKEND")
                    .map(|v| RenderBackendChoice::parse(&v))
                    .unwrap_or(defaults.render_backend),
                marker_tag: env::var("HIGHLIGHTS_MARKER_TAG").unwrap_or(defaults.marker_tag),
                marker_class: env::var("HIGHLIGHTS_MARKER_CLASS").unwrap_or(defaults.marker_class),
            },
            storage: StorageConfig {
                database_url: env::var("HIGHLIGHTS_DATABASE_URL")?,
                legacy_file: env::var("HIGHLIGHTS_LEGACY_FILE").ok(),
            },
        })
    }
}
