//! Page Highlights Library
//!
//! Anchoring and persistence engine for text highlights on third-party
//! pages. A highlight is stored as a compact path-based anchor plus the
//! highlighted text, relocated on every page load with a chain of
//! increasingly tolerant strategies, and kept readable across three
//! generations of stored formats.
//!
//! # Modules
//!
//! - `dom`: Document tree, the `DocumentView` capability and ranges
//! - `anchor`: Anchor encoding, decoding and relocation
//! - `store`: Record formats, storage collaborators and legacy migration
//! - `registry`: Active annotations and render backends
//! - `session`: Per-page controller tying everything together

pub mod anchor;
pub mod config;
pub mod dom;
pub mod error;
pub mod registry;
pub mod session;
pub mod store;

pub use anchor::{Anchor, AnchorLocator, Located, Strategy};
pub use config::Config;
pub use dom::{Boundary, Document, DocumentEdit, DocumentView, NodeId, Range};
pub use error::{EngineError, Result};
pub use registry::{AnnotationRegistry, PointResolver, RenderBackend, RestoreStats};
pub use session::{LogNotifier, Notifier, PageSession, SessionContext};
pub use store::{Annotation, Color, HighlightStore};
