//! Document model
//!
//! The engine never talks to a browser DOM directly. It reads documents
//! through the narrow [`DocumentView`] capability and, for the DOM-wrapping
//! render backend only, mutates them through [`DocumentEdit`].
//!
//! [`Document`] is the in-process implementation: an arena of element and
//! text nodes that can be parsed from XHTML, mutated like a live page and
//! serialized back to markup.
//!
//! # Offsets
//!
//! A boundary offset inside a text node counts chars (Unicode scalar values).
//! Inside an element it counts child nodes.

mod document;
mod parse;
mod range;
mod serialize;
mod traverse;
mod view;

pub use document::{Document, NodeId};
pub use range::{
    boundary_len, compare_boundaries, index_in_parent, point_key, string_of, text_segments,
    Boundary, Range, TextSegment,
};
pub use traverse::{content_text_nodes, descendants, is_non_content_tag, text_nodes};
pub use view::{DocumentEdit, DocumentView};

/// Number of chars in a string
pub(crate) fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Convert a char offset into a byte index, clamping to the string end
pub(crate) fn char_to_byte(s: &str, char_offset: usize) -> usize {
    s.char_indices()
        .nth(char_offset)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

/// Convert a byte index into a char offset
pub(crate) fn byte_to_char(s: &str, byte_index: usize) -> usize {
    s[..byte_index.min(s.len())].chars().count()
}

/// Slice a string by char offsets
pub(crate) fn char_slice(s: &str, start: usize, end: usize) -> &str {
    let from = char_to_byte(s, start);
    let to = char_to_byte(s, end).max(from);
    &s[from..to]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_char_helpers_multibyte() {
        let s = "café au lait";
        assert_eq!(char_len(s), 12);
        assert_eq!(char_to_byte(s, 4), 5);
        assert_eq!(byte_to_char(s, 5), 4);
        assert_eq!(char_slice(s, 2, 4), "fé");
        assert_eq!(char_slice(s, 10, 99), "it");
    }
}
