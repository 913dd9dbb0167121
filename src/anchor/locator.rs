//! Best-effort relocation of stored anchors

use std::cmp::Ordering;
use std::fmt;

use tracing::debug;

use super::codec::{decode, resolve_steps};
use super::search::{find_in_page, fuzzy_scan, single_node_scan, sliding_window_scan};
use super::Anchor;
use crate::dom::{boundary_len, compare_boundaries, Boundary, DocumentView, Range};
use crate::error::{EngineError, Result};

/// Maximum number of consecutive text nodes joined by the sliding window
pub const DEFAULT_SEARCH_WINDOW: usize = 5;

/// Which step of the chain produced a range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// Both paths resolved and the text matched
    ExactPath,
    FindInPage,
    SingleNode,
    SlidingWindow,
    FuzzyRegex,
    /// Paths resolved but the text differs and no search found the snapshot
    PathMismatch,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Strategy::ExactPath => "exact-path",
            Strategy::FindInPage => "find-in-page",
            Strategy::SingleNode => "single-node",
            Strategy::SlidingWindow => "sliding-window",
            Strategy::FuzzyRegex => "fuzzy-regex",
            Strategy::PathMismatch => "path-mismatch",
        };
        f.write_str(name)
    }
}

/// A relocated range and how it was found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Located {
    pub range: Range,
    pub strategy: Strategy,
}

/// Strategy chain for turning a stored anchor back into a range
///
/// 1. exact path walk (accepted immediately only when the text matches)
/// 2. platform find-in-page
/// 3. single text node substring scan
/// 4. sliding window over consecutive text nodes
/// 5. whitespace and case tolerant regex scan
///
/// A path that resolved to different text is only used when 2-5 all fail.
#[derive(Debug, Clone, Copy)]
pub struct AnchorLocator {
    window: usize,
}

impl AnchorLocator {
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
        }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Relocate an anchor, `None` when every strategy failed
    pub fn locate<V: DocumentView + ?Sized>(
        &self,
        view: &V,
        anchor: &Anchor,
        snapshot: &str,
    ) -> Option<Located> {
        let by_path = resolve_path(view, anchor);

        if let Some(range) = by_path {
            let found = view.string_of(&range);
            if found == snapshot {
                return Some(Located {
                    range,
                    strategy: Strategy::ExactPath,
                });
            }
            debug!(
                "Path {} resolved to {:?}, expected {:?}",
                anchor.start_path, found, snapshot
            );
        }

        if let Some(located) = self.locate_text(view, snapshot) {
            return Some(located);
        }

        by_path.map(|range| Located {
            range,
            strategy: Strategy::PathMismatch,
        })
    }

    /// Text-only strategies (2-5), also used to anchor legacy entries
    pub fn locate_text<V: DocumentView + ?Sized>(
        &self,
        view: &V,
        snapshot: &str,
    ) -> Option<Located> {
        if snapshot.is_empty() {
            return None;
        }

        let found = find_in_page(view, snapshot)
            .map(|range| (range, Strategy::FindInPage))
            .or_else(|| single_node_scan(view, snapshot).map(|r| (r, Strategy::SingleNode)))
            .or_else(|| {
                sliding_window_scan(view, snapshot, self.window)
                    .map(|r| (r, Strategy::SlidingWindow))
            })
            .or_else(|| fuzzy_scan(view, snapshot).map(|r| (r, Strategy::FuzzyRegex)));

        found.map(|(range, strategy)| {
            let text = view.string_of(&range);
            if text != snapshot {
                debug!(
                    "{} matched {:?} for snapshot {:?}",
                    strategy, text, snapshot
                );
            }
            Located { range, strategy }
        })
    }

    /// Like [`locate`](Self::locate) but reports why nothing was found
    ///
    /// An anchor whose paths do not decode and whose text is gone yields
    /// [`EngineError::MalformedAnchor`]; any other miss yields
    /// [`EngineError::UnresolvableAnchor`].
    pub fn resolve<V: DocumentView + ?Sized>(
        &self,
        view: &V,
        anchor: &Anchor,
        snapshot: &str,
    ) -> Result<Located> {
        if let Some(located) = self.locate(view, anchor, snapshot) {
            return Ok(located);
        }
        for path in [&anchor.start_path, &anchor.end_path] {
            if decode(path).is_none() {
                return Err(EngineError::MalformedAnchor(path.clone()));
            }
        }
        Err(EngineError::UnresolvableAnchor(snapshot.to_string()))
    }
}

impl Default for AnchorLocator {
    fn default() -> Self {
        Self::new(DEFAULT_SEARCH_WINDOW)
    }
}

/// Walk both anchor paths and build a range if the result is usable:
/// offsets in bounds and start not after end
pub fn resolve_path<V: DocumentView + ?Sized>(view: &V, anchor: &Anchor) -> Option<Range> {
    let start_steps = decode(&anchor.start_path)?;
    let end_steps = decode(&anchor.end_path)?;
    let start_node = resolve_steps(view, &start_steps)?;
    let end_node = resolve_steps(view, &end_steps)?;

    if anchor.start_offset > boundary_len(view, start_node)
        || anchor.end_offset > boundary_len(view, end_node)
    {
        return None;
    }

    let start = Boundary::new(start_node, anchor.start_offset);
    let end = Boundary::new(end_node, anchor.end_offset);
    match compare_boundaries(view, start, end)? {
        Ordering::Greater => None,
        _ => Some(Range::new(start, end)),
    }
}
