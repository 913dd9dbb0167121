//! Document capabilities
//!
//! These traits are the seam between the anchoring engine and whatever
//! hosts the page. The engine only ever needs to read structure and text;
//! mutation is limited to what the DOM-wrapping render backend requires.

use super::{range, NodeId, Range};

/// Read-only view of a document tree
///
/// Element children and text children are both subsets of `children`,
/// in document order.
pub trait DocumentView {
    /// The node anchor paths are relative to (the page body)
    fn root(&self) -> NodeId;

    /// Parent of a node, `None` for the topmost node or a detached node
    fn parent(&self, node: NodeId) -> Option<NodeId>;

    /// All child nodes in document order
    fn children(&self, node: NodeId) -> Vec<NodeId>;

    /// Lowercase tag name, `None` for text nodes
    fn tag_name(&self, node: NodeId) -> Option<&str>;

    /// Text content of a text node, `None` for elements
    fn text(&self, node: NodeId) -> Option<&str>;

    /// Attribute value of an element
    fn attribute(&self, _node: NodeId, _name: &str) -> Option<&str> {
        None
    }

    fn is_text(&self, node: NodeId) -> bool {
        self.text(node).is_some()
    }

    /// Element children, regardless of tag
    fn element_children(&self, node: NodeId) -> Vec<NodeId> {
        self.children(node)
            .into_iter()
            .filter(|&child| self.tag_name(child).is_some())
            .collect()
    }

    /// Text node children
    fn text_children(&self, node: NodeId) -> Vec<NodeId> {
        self.children(node)
            .into_iter()
            .filter(|&child| self.is_text(child))
            .collect()
    }

    /// Text covered by a range
    fn string_of(&self, range: &Range) -> String {
        range::string_of(self, range)
    }

    /// Platform find-in-page: case-insensitive forward search over the whole
    /// document. Implementations must not leave a selection behind.
    fn find_forward(&self, _needle: &str) -> Option<Range> {
        None
    }

    /// Whether native highlight collections are available
    fn supports_highlight_api(&self) -> bool {
        false
    }

    /// The user's current selection
    fn selection(&self) -> Option<Range> {
        None
    }
}

/// Mutating access to a document
pub trait DocumentEdit: DocumentView {
    /// Split a text node at a char offset. The original node keeps the head;
    /// the returned new sibling holds the tail.
    fn split_text(&mut self, node: NodeId, offset: usize) -> Option<NodeId>;

    /// Replace `node` with a new element that contains it
    fn wrap(&mut self, node: NodeId, tag: &str, attributes: &[(&str, &str)]) -> Option<NodeId>;

    /// Replace an element with its children
    fn unwrap(&mut self, element: NodeId);

    /// Merge adjacent text nodes and drop empty ones, recursively
    fn normalize(&mut self, node: NodeId);

    /// Install or replace a named native highlight collection
    fn set_highlight(&mut self, name: &str, ranges: Vec<Range>);

    /// Remove a named native highlight collection
    fn delete_highlight(&mut self, name: &str);
}
