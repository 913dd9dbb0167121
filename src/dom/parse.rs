//! XHTML parsing into a [`Document`]
//!
//! Pages are read as well-formed XHTML. Comments and processing
//! instructions are dropped; whitespace-only text nodes are kept because
//! they count toward text-node ordinals exactly as they do in a live page.

use roxmltree::{NodeType, ParsingOptions};

use super::{Document, DocumentView, NodeId};
use crate::error::Result;

impl Document {
    /// Parse a complete XHTML document
    ///
    /// A root other than `<html>` is wrapped in an `html`/`body` shell.
    pub fn parse_xhtml(source: &str) -> Result<Self> {
        let options = ParsingOptions {
            allow_dtd: true,
            ..ParsingOptions::default()
        };
        let xml = roxmltree::Document::parse_with_options(source, options)?;

        let mut doc = Document::empty();
        let root_element = xml.root_element();
        let top = match build_node(&mut doc, root_element) {
            Some(top) => top,
            None => return Ok(Document::new()),
        };

        if doc.tag_name(top) == Some("html") {
            let body = doc
                .element_children(top)
                .into_iter()
                .find(|&child| doc.tag_name(child) == Some("body"))
                .unwrap_or(top);
            doc.set_roots(top, body);
        } else {
            let html = doc.create_element("html");
            let body = doc.create_element("body");
            doc.append_child(html, body);
            doc.append_child(body, top);
            doc.set_roots(html, body);
        }

        Ok(doc)
    }

    /// Parse markup that belongs inside `<body>`
    pub fn from_body_fragment(fragment: &str) -> Result<Self> {
        Self::parse_xhtml(&format!("<html><head></head><body>{}</body></html>", fragment))
    }
}

fn build_node(doc: &mut Document, node: roxmltree::Node<'_, '_>) -> Option<NodeId> {
    match node.node_type() {
        NodeType::Element => {
            let element = doc.create_element(node.tag_name().name());
            for attribute in node.attributes() {
                doc.set_attribute(element, attribute.name(), attribute.value());
            }
            for child in node.children() {
                if let Some(built) = build_node(doc, child) {
                    doc.append_child(element, built);
                }
            }
            Some(element)
        }
        NodeType::Text => node.text().map(|text| doc.create_text(text)),
        _ => None,
    }
}
