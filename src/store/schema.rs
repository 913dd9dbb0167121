//! Stored schema generations
//!
//! * gen0: `{text, color|bgColor, timestamp}` with no anchor, only found in
//!   the legacy namespace
//! * gen1: anchored, but container paths are arrays of step objects and the
//!   anchor repeats the text
//! * gen2: the current [`Annotation`] shape
//!
//! Records are told apart purely by shape.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::records::{Annotation, Color};
use crate::anchor::{decode, join_steps, Anchor, PathStep};

/// Anchor-less entry from the legacy namespace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyEntry {
    pub text: String,
    #[serde(default)]
    pub color: Option<String>,
    /// Written instead of, or next to, `color` by some old versions
    #[serde(default, rename = "bgColor", skip_serializing_if = "Option::is_none")]
    pub bg_color: Option<String>,
    #[serde(default)]
    pub timestamp: Option<i64>,
}

impl LegacyEntry {
    /// `color`, falling back to `bgColor`
    pub fn color_value(&self) -> Option<&str> {
        self.color.as_deref().or(self.bg_color.as_deref())
    }
}

/// One element of a gen1 container path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Gen1Step {
    Element { tag: String, index: usize },
    Text { index: usize },
}

impl From<&Gen1Step> for PathStep {
    fn from(step: &Gen1Step) -> Self {
        match step {
            Gen1Step::Element { tag, index } => PathStep::Element {
                tag: tag.to_ascii_lowercase(),
                index: *index,
            },
            Gen1Step::Text { index } => PathStep::Text { index: *index },
        }
    }
}

impl From<&PathStep> for Gen1Step {
    fn from(step: &PathStep) -> Self {
        match step {
            PathStep::Element { tag, index } => Gen1Step::Element {
                tag: tag.clone(),
                index: *index,
            },
            PathStep::Text { index } => Gen1Step::Text { index: *index },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Gen1RangeInfo {
    pub start_container_path: Vec<Gen1Step>,
    pub start_offset: usize,
    /// Some gen1 writers only stored the start path
    #[serde(default)]
    pub end_container_path: Option<Vec<Gen1Step>>,
    pub end_offset: usize,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gen1Annotation {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default, rename = "createdAt", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
    #[serde(rename = "rangeInfo")]
    pub range_info: Gen1RangeInfo,
}

/// A stored annotation classified by generation
#[derive(Debug, Clone, PartialEq)]
pub enum StoredShape {
    Gen0(LegacyEntry),
    Gen1(Gen1Annotation),
    Gen2(Annotation),
}

impl StoredShape {
    pub fn generation(&self) -> u8 {
        match self {
            StoredShape::Gen0(_) => 0,
            StoredShape::Gen1(_) => 1,
            StoredShape::Gen2(_) => 2,
        }
    }
}

/// Classify one stored annotation, `None` if it matches no generation
pub fn classify(value: &Value) -> Option<StoredShape> {
    let object = value.as_object()?;
    match object.get("rangeInfo") {
        Some(range_info) => match range_info.get("startContainerPath")? {
            Value::String(_) => serde_json::from_value(value.clone())
                .ok()
                .map(StoredShape::Gen2),
            Value::Array(_) => serde_json::from_value(value.clone())
                .ok()
                .map(StoredShape::Gen1),
            _ => None,
        },
        None if object.get("text").is_some_and(Value::is_string) => {
            serde_json::from_value(value.clone())
                .ok()
                .map(StoredShape::Gen0)
        }
        None => None,
    }
}

fn timestamp_or(ms: Option<i64>, fallback: DateTime<Utc>) -> DateTime<Utc> {
    ms.and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        .unwrap_or(fallback)
}

/// Attach a located anchor to a legacy entry
///
/// Returns `None` if the anchor paths do not decode.
pub fn gen0_to_gen1(entry: &LegacyEntry, anchor: &Anchor) -> Option<Gen1Annotation> {
    let start = decode(&anchor.start_path)?;
    let end = decode(&anchor.end_path)?;
    Some(Gen1Annotation {
        id: None,
        text: Some(entry.text.clone()),
        color: entry.color_value().map(str::to_string),
        timestamp: entry.timestamp,
        created_at: None,
        range_info: Gen1RangeInfo {
            start_container_path: start.iter().map(Gen1Step::from).collect(),
            start_offset: anchor.start_offset,
            end_container_path: Some(end.iter().map(Gen1Step::from).collect()),
            end_offset: anchor.end_offset,
            text: Some(entry.text.clone()),
        },
    })
}

/// Join the path arrays and drop the duplicated inner text
///
/// `now` stands in for a missing timestamp.
pub fn gen1_to_gen2(record: &Gen1Annotation, now: DateTime<Utc>) -> Annotation {
    let info = &record.range_info;
    let start: Vec<PathStep> = info.start_container_path.iter().map(PathStep::from).collect();
    let end: Vec<PathStep> = match &info.end_container_path {
        Some(steps) => steps.iter().map(PathStep::from).collect(),
        None => start.clone(),
    };

    Annotation {
        id: record.id.clone().unwrap_or_default(),
        color: record
            .color
            .as_deref()
            .map(Color::from_legacy)
            .unwrap_or_default(),
        text: record
            .text
            .clone()
            .or_else(|| info.text.clone())
            .unwrap_or_default(),
        created_at: timestamp_or(record.timestamp.or(record.created_at), now),
        anchor: Anchor {
            start_path: join_steps(&start),
            start_offset: info.start_offset,
            end_path: join_steps(&end),
            end_offset: info.end_offset,
        },
    }
}

/// Bring any generation up to gen2
///
/// `anchor_for` locates a gen0 entry's text and is not called for anchored
/// generations. A gen0 entry whose text cannot be located yields `None`.
pub fn upgrade_to_latest<F>(shape: StoredShape, now: DateTime<Utc>, anchor_for: F) -> Option<Annotation>
where
    F: FnOnce(&str) -> Option<Anchor>,
{
    match shape {
        StoredShape::Gen2(annotation) => Some(annotation),
        StoredShape::Gen1(record) => Some(gen1_to_gen2(&record, now)),
        StoredShape::Gen0(entry) => {
            let anchor = anchor_for(&entry.text)?;
            let record = gen0_to_gen1(&entry, &anchor)?;
            Some(gen1_to_gen2(&record, now))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn epoch() -> DateTime<Utc> {
        Utc.timestamp_millis_opt(0).unwrap()
    }

    #[test]
    fn test_classify_generations() {
        let gen0 = json!({"text": "a", "bgColor": "#90ee90", "timestamp": 1});
        let gen1 = json!({"rangeInfo": {
            "startContainerPath": [{"type": "text", "index": 0}],
            "startOffset": 0, "endOffset": 1, "text": "a"
        }});
        let gen2 = json!({"id": "x", "color": "red", "text": "a", "createdAt": 3,
            "rangeInfo": {"startContainerPath": "text[0]", "startOffset": 0,
                          "endContainerPath": "text[0]", "endOffset": 1}});

        assert_eq!(classify(&gen0).map(|s| s.generation()), Some(0));
        assert_eq!(classify(&gen1).map(|s| s.generation()), Some(1));
        assert_eq!(classify(&gen2).map(|s| s.generation()), Some(2));
        assert!(classify(&json!({"color": "red"})).is_none());
        assert!(classify(&json!("text")).is_none());
        assert!(classify(&json!({"rangeInfo": {"startContainerPath": 7}})).is_none());
    }

    #[test]
    fn test_gen1_scenario_upgrade() {
        let stored = json!({"rangeInfo": {
            "startContainerPath": [
                {"type": "element", "tag": "div", "index": 0},
                {"type": "text", "index": 0}
            ],
            "text": "hello",
            "startOffset": 0,
            "endOffset": 5
        }});

        let Some(StoredShape::Gen1(record)) = classify(&stored) else {
            panic!("expected gen1");
        };
        let upgraded = gen1_to_gen2(&record, epoch());
        assert_eq!(upgraded.text, "hello");
        assert_eq!(upgraded.color, Color::Yellow);

        let value = serde_json::to_value(&upgraded).unwrap();
        assert_eq!(
            value["rangeInfo"],
            json!({
                "startContainerPath": "div[0]/text[0]",
                "startOffset": 0,
                "endContainerPath": "div[0]/text[0]",
                "endOffset": 5
            })
        );
        assert!(value["rangeInfo"].get("text").is_none());
    }

    #[test]
    fn test_gen1_uppercase_tags_and_created_at_alias() {
        let stored = json!({"text": "x", "color": "blue", "createdAt": 42, "rangeInfo": {
            "startContainerPath": [{"type": "element", "tag": "P", "index": 2}],
            "startOffset": 1,
            "endContainerPath": [{"type": "element", "tag": "P", "index": 3}],
            "endOffset": 0
        }});
        let Some(StoredShape::Gen1(record)) = classify(&stored) else {
            panic!("expected gen1");
        };
        let upgraded = gen1_to_gen2(&record, epoch());
        assert_eq!(upgraded.anchor.start_path, "p[2]");
        assert_eq!(upgraded.anchor.end_path, "p[3]");
        assert_eq!(upgraded.color, Color::Blue);
        assert_eq!(upgraded.created_at.timestamp_millis(), 42);
    }

    #[test]
    fn test_upgrade_is_stable() {
        let stored = json!({"text": "hi", "color": "green", "timestamp": 9, "rangeInfo": {
            "startContainerPath": [{"type": "text", "index": 0}],
            "startOffset": 0, "endOffset": 2, "text": "hi"
        }});
        let once = upgrade_to_latest(classify(&stored).unwrap(), epoch(), |_| None).unwrap();
        let reread = classify(&serde_json::to_value(&once).unwrap()).unwrap();
        let twice = upgrade_to_latest(reread, epoch(), |_| None).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_gen0_upgrade_needs_location() {
        let entry = LegacyEntry {
            text: "hello".to_string(),
            color: Some("#ff7f7f".to_string()),
            bg_color: None,
            timestamp: Some(1000),
        };
        assert!(upgrade_to_latest(StoredShape::Gen0(entry.clone()), epoch(), |_| None).is_none());

        let anchor = Anchor {
            start_path: "div[0]/text[0]".to_string(),
            start_offset: 0,
            end_path: "div[0]/text[0]".to_string(),
            end_offset: 5,
        };
        let upgraded =
            upgrade_to_latest(StoredShape::Gen0(entry), epoch(), |_| Some(anchor.clone())).unwrap();
        assert_eq!(upgraded.anchor, anchor);
        assert_eq!(upgraded.color, Color::Red);
        assert_eq!(upgraded.created_at.timestamp_millis(), 1000);
    }

    #[test]
    fn test_gen0_with_color_and_bg_color() {
        let stored = json!({"text": "hello", "color": "red", "bgColor": "#add8e6", "timestamp": 1});
        let Some(StoredShape::Gen0(entry)) = classify(&stored) else {
            panic!("expected gen0");
        };
        assert_eq!(entry.color_value(), Some("red"));

        let only_bg = json!({"text": "hello", "bgColor": "#add8e6"});
        let Some(StoredShape::Gen0(entry)) = classify(&only_bg) else {
            panic!("expected gen0");
        };
        assert_eq!(entry.color_value(), Some("#add8e6"));
    }

    #[test]
    fn test_gen1_with_both_timestamp_keys() {
        let stored = json!({"text": "x", "timestamp": 7, "createdAt": 8, "rangeInfo": {
            "startContainerPath": [{"type": "text", "index": 0}],
            "startOffset": 0, "endOffset": 1
        }});
        let Some(StoredShape::Gen1(record)) = classify(&stored) else {
            panic!("expected gen1");
        };
        assert_eq!(gen1_to_gen2(&record, epoch()).created_at.timestamp_millis(), 7);
    }
}
