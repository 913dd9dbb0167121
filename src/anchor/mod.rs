//! Anchor module
//!
//! An anchor records where a highlighted span lived when it was created:
//! one ordinal path per boundary, relative to the page body, plus the raw
//! boundary offsets.
//!
//! # Path syntax
//!
//! ```text
//! div[0]/p[2]/text[1]
//! │      │    └── second text node among the text children of that <p>
//! │      └─────── third element child of the <div> (any tag)
//! └────────────── first element child of the body
//! ```
//!
//! Paths are cheap and tiny but break when siblings are inserted or
//! removed, so restoring never trusts them alone: [`AnchorLocator`] falls
//! back to searching for the highlighted text.

mod codec;
mod locator;
mod search;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use codec::{container_path, decode, encode, join_steps, resolve_steps};
pub use locator::{resolve_path, AnchorLocator, Located, Strategy, DEFAULT_SEARCH_WINDOW};
pub use search::{find_in_page, fuzzy_pattern, fuzzy_scan, single_node_scan, sliding_window_scan};

/// Stored description of a range position
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Anchor {
    /// Slash-joined steps to the start container
    #[serde(rename = "startContainerPath")]
    pub start_path: String,
    #[serde(rename = "startOffset")]
    pub start_offset: usize,
    /// Slash-joined steps to the end container
    #[serde(rename = "endContainerPath")]
    pub end_path: String,
    #[serde(rename = "endOffset")]
    pub end_offset: usize,
}

/// One level of an anchor path
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathStep {
    /// Element at `index` among all element children, with the tag it had
    Element { tag: String, index: usize },
    /// Text node at `index` among the text-node children
    Text { index: usize },
}

impl fmt::Display for PathStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathStep::Element { tag, index } => write!(f, "{}[{}]", tag, index),
            PathStep::Text { index } => write!(f, "text[{}]", index),
        }
    }
}
