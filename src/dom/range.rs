//! Ranges, boundaries and document order

use std::cmp::Ordering;

use super::{char_len, char_slice, traverse, DocumentView, NodeId};

/// A (container, offset) position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Boundary {
    pub node: NodeId,
    pub offset: usize,
}

impl Boundary {
    pub fn new(node: NodeId, offset: usize) -> Self {
        Self { node, offset }
    }
}

/// A content span between two boundaries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Range {
    pub start: Boundary,
    pub end: Boundary,
}

impl Range {
    pub fn new(start: Boundary, end: Boundary) -> Self {
        Self { start, end }
    }

    /// A range inside a single text node
    pub fn in_node(node: NodeId, start: usize, end: usize) -> Self {
        Self {
            start: Boundary::new(node, start),
            end: Boundary::new(node, end),
        }
    }

    /// A collapsed range at one position
    pub fn caret(at: Boundary) -> Self {
        Self { start: at, end: at }
    }

    pub fn is_collapsed(&self) -> bool {
        self.start == self.end
    }
}

/// Covered part of one text node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextSegment {
    pub node: NodeId,
    pub start: usize,
    pub end: usize,
}

/// Maximum valid offset in a container
pub fn boundary_len<V: DocumentView + ?Sized>(view: &V, node: NodeId) -> usize {
    match view.text(node) {
        Some(text) => char_len(text),
        None => view.children(node).len(),
    }
}

/// Position of a node among all children of its parent
pub fn index_in_parent<V: DocumentView + ?Sized>(view: &V, node: NodeId) -> Option<usize> {
    let parent = view.parent(node)?;
    view.children(parent).iter().position(|&c| c == node)
}

/// Sortable key of a boundary: child indices from the topmost ancestor,
/// followed by the offset. Keys from different trees are not comparable,
/// so the topmost ancestor is returned alongside.
pub fn point_key<V: DocumentView + ?Sized>(view: &V, at: Boundary) -> (NodeId, Vec<usize>) {
    let mut key = vec![at.offset];
    let mut node = at.node;
    while let Some(parent) = view.parent(node) {
        let index = view
            .children(parent)
            .iter()
            .position(|&c| c == node)
            .unwrap_or(0);
        key.push(index);
        node = parent;
    }
    key.reverse();
    (node, key)
}

/// Document order of two boundaries, `None` if they live in different trees
pub fn compare_boundaries<V: DocumentView + ?Sized>(
    view: &V,
    a: Boundary,
    b: Boundary,
) -> Option<Ordering> {
    let (top_a, key_a) = point_key(view, a);
    let (top_b, key_b) = point_key(view, b);
    (top_a == top_b).then(|| key_a.cmp(&key_b))
}

fn ancestors_inclusive<V: DocumentView + ?Sized>(view: &V, node: NodeId) -> Vec<NodeId> {
    let mut chain = vec![node];
    let mut current = node;
    while let Some(parent) = view.parent(current) {
        chain.push(parent);
        current = parent;
    }
    chain
}

/// Text node parts covered by a range, in document order
pub fn text_segments<V: DocumentView + ?Sized>(view: &V, range: &Range) -> Vec<TextSegment> {
    let (top_start, start_key) = point_key(view, range.start);
    let (top_end, end_key) = point_key(view, range.end);
    if top_start != top_end || start_key > end_key {
        return Vec::new();
    }

    let end_chain = ancestors_inclusive(view, range.end.node);
    let common = ancestors_inclusive(view, range.start.node)
        .into_iter()
        .find(|n| end_chain.contains(n))
        .unwrap_or(top_start);

    let candidates = if view.is_text(common) {
        vec![common]
    } else {
        traverse::text_nodes(view, common)
    };

    let mut segments = Vec::new();
    for node in candidates {
        let len = view.text(node).map(char_len).unwrap_or(0);
        let (_, node_start) = point_key(view, Boundary::new(node, 0));
        let mut node_end = node_start.clone();
        if let Some(last) = node_end.last_mut() {
            *last = len;
        }
        if node_end < start_key || node_start > end_key {
            continue;
        }

        let seg_start = if range.start.node == node {
            range.start.offset.min(len)
        } else {
            0
        };
        let seg_end = if range.end.node == node {
            range.end.offset.min(len)
        } else {
            len
        };
        if seg_start < seg_end {
            segments.push(TextSegment {
                node,
                start: seg_start,
                end: seg_end,
            });
        }
    }
    segments
}

/// Concatenated text covered by a range
pub fn string_of<V: DocumentView + ?Sized>(view: &V, range: &Range) -> String {
    text_segments(view, range)
        .into_iter()
        .filter_map(|seg| {
            view.text(seg.node)
                .map(|text| char_slice(text, seg.start, seg.end))
        })
        .collect()
}
