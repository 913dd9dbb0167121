//! Persisted record types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::anchor::Anchor;

/// Highlight color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    #[default]
    Yellow,
    Green,
    Blue,
    Red,
}

/// Hex values written by the oldest storage format
const LEGACY_PALETTE: &[(&str, Color)] = &[
    ("#ffff00", Color::Yellow),
    ("#ffff7b", Color::Yellow),
    ("#fff59d", Color::Yellow),
    ("#90ee90", Color::Green),
    ("#aaffaa", Color::Green),
    ("#c5e1a5", Color::Green),
    ("#add8e6", Color::Blue),
    ("#87cefa", Color::Blue),
    ("#90caf9", Color::Blue),
    ("#ffb6c1", Color::Red),
    ("#ff7f7f", Color::Red),
    ("#ef9a9a", Color::Red),
];

impl Color {
    pub const ALL: [Color; 4] = [Color::Yellow, Color::Green, Color::Blue, Color::Red];

    pub fn as_str(&self) -> &'static str {
        match self {
            Color::Yellow => "yellow",
            Color::Green => "green",
            Color::Blue => "blue",
            Color::Red => "red",
        }
    }

    /// Parse a current color name
    pub fn parse(name: &str) -> Option<Color> {
        Color::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(name.trim()))
    }

    /// Interpret a stored legacy color: a name or one of the legacy hex
    /// values. Anything else becomes yellow.
    pub fn from_legacy(value: &str) -> Color {
        let value = value.trim().to_ascii_lowercase();
        Color::parse(&value)
            .or_else(|| {
                LEGACY_PALETTE
                    .iter()
                    .find(|(hex, _)| *hex == value)
                    .map(|(_, color)| *color)
            })
            .unwrap_or_default()
    }

    /// Color name used by the export destination
    pub fn export_name(&self) -> &'static str {
        match self {
            Color::Yellow => "yellow_background",
            Color::Green => "green_background",
            Color::Blue => "blue_background",
            Color::Red => "red_background",
        }
    }
}

impl std::fmt::Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A highlighted span
///
/// `id` is only meaningful within one page session. Across sessions an
/// annotation is identified by its text, color and anchor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    #[serde(default)]
    pub id: String,
    pub color: Color,
    /// Content snapshot, the authority when relocating
    pub text: String,
    #[serde(rename = "createdAt", with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "rangeInfo")]
    pub anchor: Anchor,
}

impl Annotation {
    /// Whether two annotations describe the same highlight
    pub fn same_identity(&self, other: &Annotation) -> bool {
        self.text == other.text && self.color == other.color && self.anchor == other.anchor
    }
}

/// Everything stored for one document, always written as a whole
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedDocumentRecord {
    #[serde(rename = "documentKey")]
    pub document_key: String,
    pub annotations: Vec<Annotation>,
}

/// Marker left after the one-shot legacy migration of a document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationRecord {
    pub document_key: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    /// Legacy key the entries came from, `None` when nothing was found
    pub source_key: Option<String>,
    pub total_count: usize,
    pub success_count: usize,
    pub fail_count: usize,
}

/// Entry handed to the export destination
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportEntry {
    pub text: String,
    pub color: &'static str,
}

impl From<&Annotation> for ExportEntry {
    fn from(annotation: &Annotation) -> Self {
        Self {
            text: annotation.text.clone(),
            color: annotation.color.export_name(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_legacy_colors() {
        assert_eq!(Color::from_legacy("Green"), Color::Green);
        assert_eq!(Color::from_legacy("#ADD8E6"), Color::Blue);
        assert_eq!(Color::from_legacy("#ffb6c1"), Color::Red);
        assert_eq!(Color::from_legacy("chartreuse"), Color::Yellow);
        assert_eq!(Color::from_legacy(""), Color::Yellow);
    }

    #[test]
    fn test_annotation_json_shape() {
        let annotation = Annotation {
            id: "hl-1".to_string(),
            color: Color::Blue,
            text: "hello".to_string(),
            created_at: Utc.timestamp_millis_opt(1_700_000_000_123).unwrap(),
            anchor: Anchor {
                start_path: "div[0]/text[0]".to_string(),
                start_offset: 0,
                end_path: "div[0]/text[0]".to_string(),
                end_offset: 5,
            },
        };

        let value = serde_json::to_value(&annotation).unwrap();
        assert_eq!(
            value,
            json!({
                "id": "hl-1",
                "color": "blue",
                "text": "hello",
                "createdAt": 1_700_000_000_123_i64,
                "rangeInfo": {
                    "startContainerPath": "div[0]/text[0]",
                    "startOffset": 0,
                    "endContainerPath": "div[0]/text[0]",
                    "endOffset": 5
                }
            })
        );
        let back: Annotation = serde_json::from_value(value).unwrap();
        assert_eq!(back, annotation);
    }

    #[test]
    fn test_migration_record_shape() {
        let record = MigrationRecord {
            document_key: "https://example.com/a".to_string(),
            timestamp: Utc.timestamp_millis_opt(5).unwrap(),
            source_key: None,
            total_count: 0,
            success_count: 0,
            fail_count: 0,
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["documentKey"], "https://example.com/a");
        assert_eq!(value["sourceKey"], serde_json::Value::Null);
        assert_eq!(value["failCount"], 0);
    }

    #[test]
    fn test_export_names() {
        assert_eq!(Color::Red.export_name(), "red_background");
        assert_eq!(Color::Yellow.export_name(), "yellow_background");
    }
}
