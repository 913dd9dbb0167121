//! Arena-backed document tree
//!
//! Nodes are never freed: removing a node detaches it, which keeps every
//! `NodeId` handed out valid for the lifetime of the document.

use std::collections::BTreeMap;
use std::fmt;

use super::{char_len, char_to_byte, traverse, Boundary, DocumentEdit, DocumentView, Range};

/// Handle to a node in a [`Document`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone)]
enum NodeData {
    Element {
        tag: String,
        attributes: Vec<(String, String)>,
    },
    Text(String),
}

#[derive(Debug, Clone)]
struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    data: NodeData,
}

/// An in-process document
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
    html: NodeId,
    body: NodeId,
    selection: Option<Range>,
    highlight_api: bool,
    highlights: BTreeMap<String, Vec<Range>>,
}

impl Document {
    /// Create an empty `<html><head/><body/></html>` document
    pub fn new() -> Self {
        let mut doc = Self::empty();
        let html = doc.create_element("html");
        let head = doc.create_element("head");
        let body = doc.create_element("body");
        doc.append_child(html, head);
        doc.append_child(html, body);
        doc.set_roots(html, body);
        doc
    }

    /// Document without any nodes; the parser fills it and sets the roots
    pub(super) fn empty() -> Self {
        Self {
            nodes: Vec::new(),
            html: NodeId(0),
            body: NodeId(0),
            selection: None,
            highlight_api: false,
            highlights: BTreeMap::new(),
        }
    }

    pub(super) fn set_roots(&mut self, html: NodeId, body: NodeId) {
        self.html = html;
        self.body = body;
    }

    pub fn html(&self) -> NodeId {
        self.html
    }

    pub fn body(&self) -> NodeId {
        self.body
    }

    /// Create a detached element
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.push(NodeData::Element {
            tag: tag.to_ascii_lowercase(),
            attributes: Vec::new(),
        })
    }

    /// Create a detached text node
    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.push(NodeData::Text(text.to_string()))
    }

    fn push(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            parent: None,
            children: Vec::new(),
            data,
        });
        id
    }

    /// Append `child` as the last child of `parent`, detaching it first
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.insert_before(parent, child, None);
    }

    /// Insert `child` before `reference` (or at the end when `None`)
    pub fn insert_before(&mut self, parent: NodeId, child: NodeId, reference: Option<NodeId>) {
        self.remove(child);
        let position = reference
            .and_then(|r| self.nodes[parent.0].children.iter().position(|&c| c == r))
            .unwrap_or(self.nodes[parent.0].children.len());
        self.nodes[parent.0].children.insert(position, child);
        self.nodes[child.0].parent = Some(parent);
    }

    /// Detach a node from its parent
    pub fn remove(&mut self, node: NodeId) {
        if let Some(parent) = self.nodes[node.0].parent.take() {
            self.nodes[parent.0].children.retain(|&c| c != node);
        }
    }

    pub fn set_attribute(&mut self, element: NodeId, name: &str, value: &str) {
        if let NodeData::Element { attributes, .. } = &mut self.nodes[element.0].data {
            match attributes.iter_mut().find(|(n, _)| n == name) {
                Some(entry) => entry.1 = value.to_string(),
                None => attributes.push((name.to_string(), value.to_string())),
            }
        }
    }

    pub fn attributes(&self, element: NodeId) -> &[(String, String)] {
        match &self.nodes[element.0].data {
            NodeData::Element { attributes, .. } => attributes,
            NodeData::Text(_) => &[],
        }
    }

    pub fn set_text(&mut self, node: NodeId, text: &str) {
        if let NodeData::Text(content) = &mut self.nodes[node.0].data {
            *content = text.to_string();
        }
    }

    pub fn set_selection(&mut self, selection: Option<Range>) {
        self.selection = selection;
    }

    /// Toggle availability of native highlight collections
    pub fn set_highlight_api(&mut self, available: bool) {
        self.highlight_api = available;
    }

    /// Ranges registered under a native highlight collection
    pub fn highlight(&self, name: &str) -> Option<&[Range]> {
        self.highlights.get(name).map(Vec::as_slice)
    }

    pub fn highlight_names(&self) -> Vec<&str> {
        self.highlights.keys().map(String::as_str).collect()
    }

    /// Elements with a tag under the body, in document order
    pub fn elements_by_tag(&self, tag: &str) -> Vec<NodeId> {
        traverse::descendants(self, self.body)
            .into_iter()
            .filter(|&n| self.tag_name(n) == Some(tag))
            .collect()
    }

    /// First text node under the body whose text contains `needle`
    pub fn text_node_containing(&self, needle: &str) -> Option<NodeId> {
        traverse::text_nodes(self, self.body)
            .into_iter()
            .find(|&n| self.text(n).is_some_and(|t| t.contains(needle)))
    }

    /// Range over the first occurrence of `needle` inside a single text node
    pub fn range_of(&self, needle: &str) -> Option<Range> {
        let node = self.text_node_containing(needle)?;
        let text = self.text(node)?;
        let byte = text.find(needle)?;
        let start = super::byte_to_char(text, byte);
        Some(Range::in_node(node, start, start + char_len(needle)))
    }

    /// Whether a node is still attached under the html element
    pub fn is_attached(&self, node: NodeId) -> bool {
        let mut current = node;
        loop {
            if current == self.html {
                return true;
            }
            match self.nodes[current.0].parent {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentView for Document {
    fn root(&self) -> NodeId {
        self.body
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.0].parent
    }

    fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.nodes[node.0].children.clone()
    }

    fn tag_name(&self, node: NodeId) -> Option<&str> {
        match &self.nodes[node.0].data {
            NodeData::Element { tag, .. } => Some(tag),
            NodeData::Text(_) => None,
        }
    }

    fn text(&self, node: NodeId) -> Option<&str> {
        match &self.nodes[node.0].data {
            NodeData::Text(text) => Some(text),
            NodeData::Element { .. } => None,
        }
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        self.attributes(node)
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    fn find_forward(&self, needle: &str) -> Option<Range> {
        let folded_needle: Vec<char> = needle.chars().map(fold_char).collect();
        if folded_needle.is_empty() {
            return None;
        }

        // Haystack of folded chars with the (node, offset) each came from
        let mut haystack = Vec::new();
        let mut origin = Vec::new();
        for node in traverse::content_text_nodes(self, self.body) {
            if let Some(text) = self.text(node) {
                for (offset, ch) in text.chars().enumerate() {
                    haystack.push(fold_char(ch));
                    origin.push(Boundary::new(node, offset));
                }
            }
        }

        let start = haystack
            .windows(folded_needle.len())
            .position(|window| window == folded_needle.as_slice())?;
        let first = origin[start];
        let last = origin[start + folded_needle.len() - 1];
        Some(Range::new(first, Boundary::new(last.node, last.offset + 1)))
    }

    fn supports_highlight_api(&self) -> bool {
        self.highlight_api
    }

    fn selection(&self) -> Option<Range> {
        self.selection
    }
}

fn fold_char(ch: char) -> char {
    ch.to_lowercase().next().unwrap_or(ch)
}

impl DocumentEdit for Document {
    fn split_text(&mut self, node: NodeId, offset: usize) -> Option<NodeId> {
        let parent = self.nodes[node.0].parent?;
        let tail = {
            let NodeData::Text(text) = &mut self.nodes[node.0].data else {
                return None;
            };
            if offset > char_len(text) {
                return None;
            }
            let split_at = char_to_byte(text, offset);
            text.split_off(split_at)
        };
        let tail_node = self.create_text(&tail);
        let next = self.nodes[parent.0]
            .children
            .iter()
            .position(|&c| c == node)
            .and_then(|i| self.nodes[parent.0].children.get(i + 1).copied());
        self.insert_before(parent, tail_node, next);
        Some(tail_node)
    }

    fn wrap(&mut self, node: NodeId, tag: &str, attributes: &[(&str, &str)]) -> Option<NodeId> {
        let parent = self.nodes[node.0].parent?;
        let wrapper = self.create_element(tag);
        for (name, value) in attributes {
            self.set_attribute(wrapper, name, value);
        }
        self.insert_before(parent, wrapper, Some(node));
        self.append_child(wrapper, node);
        Some(wrapper)
    }

    fn unwrap(&mut self, element: NodeId) {
        let Some(parent) = self.nodes[element.0].parent else {
            return;
        };
        for child in self.children(element) {
            self.insert_before(parent, child, Some(element));
        }
        self.remove(element);
    }

    fn normalize(&mut self, node: NodeId) {
        let mut previous_text: Option<NodeId> = None;
        for child in self.children(node) {
            let content = match &self.nodes[child.0].data {
                NodeData::Text(text) => Some(text.clone()),
                NodeData::Element { .. } => None,
            };
            match (content, previous_text) {
                (Some(text), _) if text.is_empty() => self.remove(child),
                (Some(text), Some(prev)) => {
                    if let NodeData::Text(prev_text) = &mut self.nodes[prev.0].data {
                        prev_text.push_str(&text);
                    }
                    self.remove(child);
                }
                (Some(_), None) => previous_text = Some(child),
                (None, _) => {
                    previous_text = None;
                    self.normalize(child);
                }
            }
        }
    }

    fn set_highlight(&mut self, name: &str, ranges: Vec<Range>) {
        self.highlights.insert(name.to_string(), ranges);
    }

    fn delete_highlight(&mut self, name: &str) {
        self.highlights.remove(name);
    }
}
