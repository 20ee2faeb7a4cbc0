//! Sightline Lightbox Manager
//!
//! Maintains the ordered list of lightbox-eligible elements in a document
//! and answers neighbor-traversal queries against it. The document is
//! scanned lazily — once, behind a deferred, after the document is ready —
//! and re-scanned only on explicit invalidation, with re-scans coalesced
//! through a debounced pass.

pub mod manager;

pub use manager::{LightboxManager, EXCLUSION_TOKEN, LIGHTBOX_ATTRIBUTE};
