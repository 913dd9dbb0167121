//! Ordered tree traversal

use super::{DocumentView, NodeId};

/// Tags whose text is never page content
const NON_CONTENT_TAGS: &[&str] = &["script", "style"];

pub fn is_non_content_tag(tag: &str) -> bool {
    NON_CONTENT_TAGS.contains(&tag)
}

/// All descendants of `under` in pre-order, excluding `under` itself
pub fn descendants<V: DocumentView + ?Sized>(view: &V, under: NodeId) -> Vec<NodeId> {
    let mut out = Vec::new();
    let mut stack: Vec<NodeId> = view.children(under).into_iter().rev().collect();
    while let Some(node) = stack.pop() {
        out.push(node);
        stack.extend(view.children(node).into_iter().rev());
    }
    out
}

/// Text nodes under `under` in document order
pub fn text_nodes<V: DocumentView + ?Sized>(view: &V, under: NodeId) -> Vec<NodeId> {
    descendants(view, under)
        .into_iter()
        .filter(|&n| view.is_text(n))
        .collect()
}

/// Text nodes under `under` in document order, skipping script/style subtrees
pub fn content_text_nodes<V: DocumentView + ?Sized>(view: &V, under: NodeId) -> Vec<NodeId> {
    let mut out = Vec::new();
    let mut stack: Vec<NodeId> = view.children(under).into_iter().rev().collect();
    while let Some(node) = stack.pop() {
        match view.tag_name(node) {
            Some(tag) if is_non_content_tag(tag) => continue,
            Some(_) => stack.extend(view.children(node).into_iter().rev()),
            None => out.push(node),
        }
    }
    out
}
