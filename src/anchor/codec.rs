//! Anchor encoding and path decoding

use std::sync::OnceLock;

use regex::Regex;

use super::{Anchor, PathStep};
use crate::dom::{DocumentView, NodeId, Range};
use crate::error::{EngineError, Result};

fn segment_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^([a-z0-9-]+)\[(\d+)\]$").expect("valid segment pattern"))
}

/// Encode both boundaries of a range
pub fn encode<V: DocumentView + ?Sized>(view: &V, range: &Range) -> Result<Anchor> {
    let start = container_path(view, range.start.node)?;
    let end = container_path(view, range.end.node)?;
    Ok(Anchor {
        start_path: join_steps(&start),
        start_offset: range.start.offset,
        end_path: join_steps(&end),
        end_offset: range.end.offset,
    })
}

/// Steps from the view root down to `node`
///
/// Fails with [`EngineError::OutsideRoot`] when walking upward never
/// reaches the root.
pub fn container_path<V: DocumentView + ?Sized>(view: &V, node: NodeId) -> Result<Vec<PathStep>> {
    let root = view.root();
    let mut steps = Vec::new();
    let mut current = node;

    while current != root {
        let parent = view.parent(current).ok_or(EngineError::OutsideRoot)?;
        let step = match view.tag_name(current) {
            None => PathStep::Text {
                index: position_of(view.text_children(parent), current)?,
            },
            Some(tag) => PathStep::Element {
                tag: tag.to_ascii_lowercase(),
                index: position_of(view.element_children(parent), current)?,
            },
        };
        steps.push(step);
        current = parent;
    }

    steps.reverse();
    Ok(steps)
}

fn position_of(siblings: Vec<NodeId>, node: NodeId) -> Result<usize> {
    siblings
        .iter()
        .position(|&s| s == node)
        .ok_or(EngineError::OutsideRoot)
}

pub fn join_steps(steps: &[PathStep]) -> String {
    steps
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("/")
}

/// Parse a path string into steps
///
/// Returns `None` if any segment is malformed. The empty path addresses the
/// root itself.
pub fn decode(path: &str) -> Option<Vec<PathStep>> {
    if path.is_empty() {
        return Some(Vec::new());
    }

    path.split('/')
        .map(|segment| {
            let caps = segment_pattern().captures(segment)?;
            let name = caps.get(1)?.as_str();
            let index: usize = caps.get(2)?.as_str().parse().ok()?;
            Some(if name == "text" {
                PathStep::Text { index }
            } else {
                PathStep::Element {
                    tag: name.to_string(),
                    index,
                }
            })
        })
        .collect()
}

/// Walk decoded steps down from the view root
///
/// An element index that is out of bounds falls back to the first child
/// with the recorded tag. An in-bounds index is trusted even if the tag no
/// longer matches.
pub fn resolve_steps<V: DocumentView + ?Sized>(view: &V, steps: &[PathStep]) -> Option<NodeId> {
    let mut current = view.root();
    for step in steps {
        current = match step {
            PathStep::Element { tag, index } => {
                let elements = view.element_children(current);
                match elements.get(*index) {
                    Some(&child) => child,
                    None => elements
                        .into_iter()
                        .find(|&child| view.tag_name(child) == Some(tag.as_str()))?,
                }
            }
            PathStep::Text { index } => *view.text_children(current).get(*index)?,
        };
    }
    Some(current)
}
