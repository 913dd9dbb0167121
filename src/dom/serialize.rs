//! Markup serialization

use super::{Document, DocumentView, NodeId};

const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

impl Document {
    /// Serialize the whole document
    pub fn to_html(&self) -> String {
        self.outer_html(self.html())
    }

    /// Serialize a node and its subtree
    pub fn outer_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.write_node(node, &mut out);
        out
    }

    /// Serialize the children of a node
    pub fn inner_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        for child in self.children(node) {
            self.write_node(child, &mut out);
        }
        out
    }

    fn write_node(&self, node: NodeId, out: &mut String) {
        if let Some(text) = self.text(node) {
            out.push_str(&html_escape::encode_text(text));
            return;
        }
        let Some(tag) = self.tag_name(node) else {
            return;
        };

        out.push('<');
        out.push_str(tag);
        for (name, value) in self.attributes(node) {
            out.push(' ');
            out.push_str(name);
            out.push_str("=\"");
            out.push_str(&html_escape::encode_double_quoted_attribute(value));
            out.push('"');
        }

        let children = self.children(node);
        if children.is_empty() && VOID_TAGS.contains(&tag) {
            out.push_str("/>");
            return;
        }
        out.push('>');
        for child in children {
            self.write_node(child, out);
        }
        out.push_str("</");
        out.push_str(tag);
        out.push('>');
    }
}
