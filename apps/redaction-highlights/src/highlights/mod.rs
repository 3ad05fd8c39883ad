//! Highlight module
//!
//! Geometric highlight annotations on PDF pages and the store that keeps
//! them consistent between the durable backend and the in-memory index.
//!
//! # Highlight types
//!
//! - Manual: drawn by the user
//! - Search: produced by text search matches
//! - Entity: produced by automated entity detection
//!
//! # Layout
//!
//! - `types`: the record, bounding-box correction, query selectors
//! - `id`: id generation for highlights created without one
//! - `index`: file -> page -> id nested index
//! - `store`: the façade owning index, backend and subscribers

mod id;
mod index;
mod store;
mod types;

pub use id::generate_unique_id;
pub use index::HighlightIndex;
pub use store::HighlightStore;
pub use types::{
    corrected_bounding_box, corrected_bounding_box_for, BoundingBox, Highlight, HighlightProperty,
    HighlightType, Region,
};
