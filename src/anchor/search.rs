//! Text search strategies
//!
//! Each strategy returns the first occurrence in document order. None of
//! them try to disambiguate repeated text.

use regex::{Regex, RegexBuilder};

use crate::dom::{
    byte_to_char, char_len, content_text_nodes, Boundary, DocumentView, NodeId, Range,
};

/// Platform find-in-page
pub fn find_in_page<V: DocumentView + ?Sized>(view: &V, snapshot: &str) -> Option<Range> {
    view.find_forward(snapshot)
}

/// First text node that contains the snapshot verbatim
pub fn single_node_scan<V: DocumentView + ?Sized>(view: &V, snapshot: &str) -> Option<Range> {
    if snapshot.is_empty() {
        return None;
    }
    content_text_nodes(view, view.root())
        .into_iter()
        .find_map(|node| {
            let text = view.text(node)?;
            let byte = text.find(snapshot)?;
            let start = byte_to_char(text, byte);
            Some(Range::in_node(node, start, start + char_len(snapshot)))
        })
}

/// Snapshot split across up to `window` consecutive text nodes, e.g. by an
/// inline element inserted after the highlight was made
pub fn sliding_window_scan<V: DocumentView + ?Sized>(
    view: &V,
    snapshot: &str,
    window: usize,
) -> Option<Range> {
    if snapshot.is_empty() || window == 0 {
        return None;
    }

    let nodes = content_text_nodes(view, view.root());
    let texts: Vec<&str> = nodes.iter().map(|&n| view.text(n).unwrap_or("")).collect();

    for first in 0..nodes.len() {
        let last = (first + window).min(nodes.len());
        let joined = texts[first..last].concat();
        let Some(byte) = joined.find(snapshot) else {
            continue;
        };

        let start = byte_to_char(&joined, byte);
        let end = start + char_len(snapshot);
        let span = &nodes[first..last];
        let lens: Vec<usize> = texts[first..last].iter().map(|t| char_len(t)).collect();

        let start_at = locate_offset(span, &lens, start, false)?;
        let end_at = locate_offset(span, &lens, end, true)?;
        return Some(Range::new(start_at, end_at));
    }
    None
}

/// Map an offset in concatenated text back to a node boundary. End offsets
/// that fall on a node seam stay at the end of the earlier node.
fn locate_offset(nodes: &[NodeId], lens: &[usize], offset: usize, is_end: bool) -> Option<Boundary> {
    let mut consumed = 0;
    for (&node, &len) in nodes.iter().zip(lens) {
        let inside = if is_end {
            offset <= consumed + len
        } else {
            offset < consumed + len
        };
        if inside {
            return Some(Boundary::new(node, offset - consumed));
        }
        consumed += len;
    }
    None
}

/// Case-insensitive pattern with every whitespace run relaxed to `\s+`
pub fn fuzzy_pattern(snapshot: &str) -> Option<Regex> {
    let mut pattern = String::new();
    let mut word = String::new();
    let mut in_space = false;

    for ch in snapshot.chars() {
        if ch.is_whitespace() {
            if !in_space {
                pattern.push_str(&regex::escape(&word));
                word.clear();
                pattern.push_str(r"\s+");
                in_space = true;
            }
        } else {
            word.push(ch);
            in_space = false;
        }
    }
    pattern.push_str(&regex::escape(&word));

    if pattern.is_empty() {
        return None;
    }
    RegexBuilder::new(&pattern)
        .case_insensitive(true)
        .build()
        .ok()
}

/// First whitespace- and case-tolerant match inside a single text node
pub fn fuzzy_scan<V: DocumentView + ?Sized>(view: &V, snapshot: &str) -> Option<Range> {
    let pattern = fuzzy_pattern(snapshot)?;
    content_text_nodes(view, view.root())
        .into_iter()
        .find_map(|node| {
            let text = view.text(node)?;
            let found = pattern.find(text)?;
            Some(Range::in_node(
                node,
                byte_to_char(text, found.start()),
                byte_to_char(text, found.end()),
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Document;

    #[test]
    fn test_single_node_scan_skips_script() {
        let doc =
            Document::from_body_fragment("<script>needle</script><p>hay needle hay</p>").unwrap();
        let range = single_node_scan(&doc, "needle").unwrap();
        assert_eq!(doc.string_of(&range), "needle");
        assert_eq!(range.start.offset, 4);
    }

    #[test]
    fn test_single_node_scan_multibyte_offsets() {
        let doc = Document::from_body_fragment("<p>déjà vu again</p>").unwrap();
        let range = single_node_scan(&doc, "vu").unwrap();
        assert_eq!(range.start.offset, 5);
        assert_eq!(doc.string_of(&range), "vu");
    }

    #[test]
    fn test_sliding_window_spans_inline_element() {
        let doc = Document::from_body_fragment("<p>hello <b>wo</b>rld</p>").unwrap();
        assert!(single_node_scan(&doc, "hello world").is_none());

        let range = sliding_window_scan(&doc, "hello world", 5).unwrap();
        assert_eq!(doc.string_of(&range), "hello world");
        assert_eq!(doc.text(range.start.node), Some("hello "));
        assert_eq!(doc.text(range.end.node), Some("rld"));
        assert_eq!(range.end.offset, 3);
    }

    #[test]
    fn test_sliding_window_respects_window_size() {
        let doc = Document::from_body_fragment("<p>a<i>b</i>c<i>d</i>e</p>").unwrap();
        assert!(sliding_window_scan(&doc, "abcde", 4).is_none());
        let range = sliding_window_scan(&doc, "abcde", 5).unwrap();
        assert_eq!(doc.string_of(&range), "abcde");
    }

    #[test]
    fn test_sliding_window_end_on_node_seam() {
        let doc = Document::from_body_fragment("<p>ab<b>cd</b>ef</p>").unwrap();
        let range = sliding_window_scan(&doc, "bcd", 5).unwrap();
        assert_eq!(doc.text(range.end.node), Some("cd"));
        assert_eq!(range.end.offset, 2);
    }

    #[test]
    fn test_sliding_window_prefers_earliest_occurrence() {
        let doc =
            Document::from_body_fragment("<p>see <b>one</b> two</p><p>one two</p>").unwrap();

        for window in [2, 5] {
            let range = sliding_window_scan(&doc, "one two", window).unwrap();
            assert_eq!(doc.text(range.start.node), Some("one"));
            assert_eq!(doc.text(range.end.node), Some(" two"));
        }

        // Too narrow for the split occurrence, so only the later one fits
        let range = sliding_window_scan(&doc, "one two", 1).unwrap();
        assert_eq!(doc.text(range.start.node), Some("one two"));
        assert_eq!(range.start.offset, 0);
    }

    #[test]
    fn test_fuzzy_pattern_relaxes_whitespace() {
        let pattern = fuzzy_pattern("Hello   big\nWorld (1)").unwrap();
        assert!(pattern.is_match("hello big world (1)"));
        assert!(pattern.is_match("HELLO\tbig  world (1)"));
        assert!(!pattern.is_match("hellobig world (1)"));
        assert!(fuzzy_pattern("").is_none());
    }

    #[test]
    fn test_fuzzy_scan_finds_reflowed_text() {
        let doc = Document::from_body_fragment("<p>The Quick\n   brown fox</p>").unwrap();
        assert!(single_node_scan(&doc, "the quick brown").is_none());
        let range = fuzzy_scan(&doc, "the quick brown").unwrap();
        assert_eq!(doc.string_of(&range), "The Quick\n   brown");
    }
}
