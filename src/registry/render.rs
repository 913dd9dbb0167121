//! Visual rendering of highlights
//!
//! Two interchangeable backends draw the same logical highlights. The
//! registry never depends on which one is active.

use std::collections::HashMap;
use std::fmt;

use tracing::{debug, warn};

use crate::config::{EngineConfig, RenderBackendChoice};
use crate::dom::{
    char_len, text_segments, Boundary, DocumentEdit, DocumentView, NodeId, Range, TextSegment,
};
use crate::error::{EngineError, Result};
use crate::store::Color;

/// Which backend is drawing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Native,
    Wrap,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Native => f.write_str("native"),
            BackendKind::Wrap => f.write_str("wrap"),
        }
    }
}

/// A highlight waiting to be drawn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub id: String,
    pub range: Range,
    pub color: Color,
}

/// Applies and removes the visual effect of a highlight
pub trait RenderBackend: Send {
    fn kind(&self) -> BackendKind;

    fn add(&mut self, doc: &mut dyn DocumentEdit, id: &str, range: &Range, color: Color)
        -> Result<()>;

    /// Draw several highlights whose ranges were all taken from the tree as
    /// it is now. Results line up with `placements`.
    fn add_all(
        &mut self,
        doc: &mut dyn DocumentEdit,
        placements: &[Placement],
    ) -> Vec<Result<()>> {
        placements
            .iter()
            .map(|p| self.add(doc, &p.id, &p.range, p.color))
            .collect()
    }

    /// Removing an unknown id is a no-op
    fn remove(&mut self, doc: &mut dyn DocumentEdit, id: &str);

    fn clear(&mut self, doc: &mut dyn DocumentEdit);

    /// Where a highlight currently sits in the document
    ///
    /// Backends that rewrite the tree invalidate the range passed to `add`,
    /// so hit testing asks the backend.
    fn rendered_range(&self, doc: &dyn DocumentEdit, id: &str) -> Option<Range>;
}

/// Pick a backend by checking for native highlight collections
pub fn select_backend<V: DocumentView + ?Sized>(
    doc: &V,
    config: &EngineConfig,
) -> Box<dyn RenderBackend> {
    let native = match config.render_backend {
        RenderBackendChoice::Wrap => false,
        RenderBackendChoice::Auto => doc.supports_highlight_api(),
        RenderBackendChoice::Native => {
            if !doc.supports_highlight_api() {
                warn!("Native highlights requested but unavailable, wrapping instead");
            }
            doc.supports_highlight_api()
        }
    };

    if native {
        Box::new(HighlightCollectionBackend::new(&config.marker_class))
    } else {
        Box::new(DomWrapBackend::new(&config.marker_tag, &config.marker_class))
    }
}

/// Native highlight collections, one per color
///
/// Never touches the tree, so the user's selection survives.
#[derive(Debug)]
pub struct HighlightCollectionBackend {
    prefix: String,
    members: Vec<(String, Range, Color)>,
}

impl HighlightCollectionBackend {
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            members: Vec::new(),
        }
    }

    /// Name of the collection holding one color
    pub fn collection_name(&self, color: Color) -> String {
        format!("{}-{}", self.prefix, color)
    }

    fn sync(&self, doc: &mut dyn DocumentEdit, color: Color) {
        let ranges: Vec<Range> = self
            .members
            .iter()
            .filter(|(_, _, c)| *c == color)
            .map(|(_, range, _)| *range)
            .collect();
        let name = self.collection_name(color);
        if ranges.is_empty() {
            doc.delete_highlight(&name);
        } else {
            doc.set_highlight(&name, ranges);
        }
    }
}

impl RenderBackend for HighlightCollectionBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Native
    }

    fn add(
        &mut self,
        doc: &mut dyn DocumentEdit,
        id: &str,
        range: &Range,
        color: Color,
    ) -> Result<()> {
        self.members.push((id.to_string(), *range, color));
        self.sync(doc, color);
        Ok(())
    }

    fn remove(&mut self, doc: &mut dyn DocumentEdit, id: &str) {
        let Some(position) = self.members.iter().position(|(m, _, _)| m == id) else {
            return;
        };
        let (_, _, color) = self.members.remove(position);
        self.sync(doc, color);
    }

    fn clear(&mut self, doc: &mut dyn DocumentEdit) {
        self.members.clear();
        for color in Color::ALL {
            doc.delete_highlight(&self.collection_name(color));
        }
    }

    fn rendered_range(&self, _doc: &dyn DocumentEdit, id: &str) -> Option<Range> {
        self.members
            .iter()
            .find(|(m, _, _)| m == id)
            .map(|(_, range, _)| *range)
    }
}

/// Wraps each covered text run in a marker element
#[derive(Debug)]
pub struct DomWrapBackend {
    tag: String,
    class: String,
    marks: HashMap<String, Vec<NodeId>>,
}

impl DomWrapBackend {
    pub fn new(tag: &str, class: &str) -> Self {
        Self {
            tag: tag.to_string(),
            class: class.to_string(),
            marks: HashMap::new(),
        }
    }

    /// Marker elements of a highlight, in document order
    pub fn marks(&self, id: &str) -> &[NodeId] {
        self.marks.get(id).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Text pieces an original text node has been split into, as
/// (offset in the original node, piece node), sorted by offset
type Pieces = HashMap<NodeId, Vec<(usize, NodeId)>>;

/// Make sure a piece boundary exists at `offset` of the original node
fn split_at(doc: &mut dyn DocumentEdit, pieces: &mut Vec<(usize, NodeId)>, offset: usize) {
    let Some(index) = pieces.iter().rposition(|&(start, _)| start <= offset) else {
        return;
    };
    let (start, node) = pieces[index];
    let len = doc.text(node).map(char_len).unwrap_or(0);
    if offset == start || offset - start >= len {
        return;
    }
    if let Some(tail) = doc.split_text(node, offset - start) {
        pieces.insert(index + 1, (offset, tail));
    }
}

impl DomWrapBackend {
    fn wrap_segments(
        &mut self,
        doc: &mut dyn DocumentEdit,
        pieces: &mut Pieces,
        id: &str,
        color: Color,
        segments: Vec<TextSegment>,
    ) -> Result<()> {
        if segments.is_empty() {
            return Err(EngineError::UnresolvableAnchor(format!(
                "range for {} covers no text",
                id
            )));
        }

        let class = format!("{} {}-{}", self.class, self.class, color);
        let attributes = [
            ("class", class.as_str()),
            ("data-annotation-id", id),
            ("data-color", color.as_str()),
        ];

        let mut marks = Vec::with_capacity(segments.len());
        for segment in segments {
            let node_pieces = pieces
                .entry(segment.node)
                .or_insert_with(|| vec![(0, segment.node)]);
            split_at(doc, node_pieces, segment.start);
            split_at(doc, node_pieces, segment.end);

            let covered: Vec<NodeId> = node_pieces
                .iter()
                .filter(|&&(start, _)| start >= segment.start && start < segment.end)
                .map(|&(_, node)| node)
                .collect();
            for node in covered {
                if let Some(mark) = doc.wrap(node, &self.tag, &attributes) {
                    marks.push(mark);
                }
            }
        }

        debug!("Wrapped {} in {} marker(s)", id, marks.len());
        self.marks.entry(id.to_string()).or_default().extend(marks);
        Ok(())
    }
}

impl RenderBackend for DomWrapBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Wrap
    }

    fn add(
        &mut self,
        doc: &mut dyn DocumentEdit,
        id: &str,
        range: &Range,
        color: Color,
    ) -> Result<()> {
        let segments = text_segments(&*doc, range);
        self.wrap_segments(doc, &mut Pieces::new(), id, color, segments)
    }

    /// Every range is cut into text segments before anything is wrapped;
    /// later splits are tracked per original node so overlapping ranges
    /// still cover their full text.
    fn add_all(
        &mut self,
        doc: &mut dyn DocumentEdit,
        placements: &[Placement],
    ) -> Vec<Result<()>> {
        let planned: Vec<Vec<TextSegment>> = placements
            .iter()
            .map(|p| text_segments(&*doc, &p.range))
            .collect();

        let mut pieces = Pieces::new();
        let mut results = Vec::with_capacity(placements.len());
        for (placement, segments) in placements.iter().zip(planned) {
            results.push(self.wrap_segments(
                doc,
                &mut pieces,
                &placement.id,
                placement.color,
                segments,
            ));
        }
        results
    }

    fn remove(&mut self, doc: &mut dyn DocumentEdit, id: &str) {
        let Some(marks) = self.marks.remove(id) else {
            return;
        };
        for mark in marks {
            if let Some(parent) = doc.parent(mark) {
                doc.unwrap(mark);
                doc.normalize(parent);
            }
        }
    }

    fn clear(&mut self, doc: &mut dyn DocumentEdit) {
        let ids: Vec<String> = self.marks.keys().cloned().collect();
        for id in ids {
            self.remove(doc, &id);
        }
    }

    fn rendered_range(&self, doc: &dyn DocumentEdit, id: &str) -> Option<Range> {
        let attached: Vec<NodeId> = self
            .marks(id)
            .iter()
            .copied()
            .filter(|&mark| doc.parent(mark).is_some())
            .collect();
        let first = *attached.first()?;
        let last = *attached.last()?;
        Some(Range::new(
            Boundary::new(first, 0),
            Boundary::new(last, doc.children(last).len()),
        ))
    }
}
