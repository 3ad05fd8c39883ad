//! Keeping the index, the durable store and file lifecycle in step
//!
//! - [`reconcile`]: size-based repair between the index and the durable store
//! - [`lifecycle`]: file open/close handling and the event bus bridge

mod lifecycle;
mod reconcile;

pub use lifecycle::{CleanupOutcome, DetectionTracker, FileLifecycle, DEFAULT_CLEANUP_TIMEOUT};
pub use reconcile::{
    get_file_highlights, preload_file_highlights, reconcile_file, ReconcileWinner, Reconciliation,
};
