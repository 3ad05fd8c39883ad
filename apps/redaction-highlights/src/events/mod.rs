//! Events for highlight coordination
//!
//! Two channels:
//!
//! - [`ChangeNotifier`]: synchronous callbacks fired by the store after every
//!   mutation, scoped by file/page/type.
//! - [`EventBus`]: a broadcast channel of typed [`HighlightEvent`] topics used
//!   by file-lifecycle, search and renderer collaborators to talk to the store
//!   without holding a reference to it.

mod notify;

pub use notify::{ChangeNotifier, HighlightChange, Subscription};

use serde::Serialize;
use tokio::sync::broadcast;

use crate::highlights::{Highlight, HighlightType};

/// Typed coordination topics
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "topic")]
pub enum HighlightEvent {
    /// Request: drop everything held for a file
    #[serde(rename = "file-highlights-cleanup")]
    FileHighlightsCleanup {
        #[serde(rename = "fileKey")]
        file_key: String,
    },
    /// Request: load and reconcile a file's highlights
    #[serde(rename = "file-highlights-init")]
    FileHighlightsInit {
        #[serde(rename = "fileKey")]
        file_key: String,
    },
    /// A file's highlights are loaded and ready to render
    #[serde(rename = "file-highlights-loaded")]
    FileHighlightsLoaded {
        #[serde(rename = "fileKey")]
        file_key: String,
        count: usize,
    },
    /// Cleanup of a file finished
    #[serde(rename = "highlights-cleanup-confirmed")]
    CleanupConfirmed {
        #[serde(rename = "fileKey")]
        file_key: String,
        removed: usize,
    },
    /// Request: highlight every occurrence of a text in a file
    #[serde(rename = "highlight-all-same-text")]
    HighlightAllSameText {
        #[serde(rename = "fileKey")]
        file_key: String,
        text: String,
        #[serde(rename = "type")]
        highlight_type: HighlightType,
    },
    /// Matches computed for a highlight-all request
    #[serde(rename = "highlight-all-same-results")]
    HighlightAllSameResults {
        #[serde(rename = "fileKey")]
        file_key: String,
        text: String,
        highlights: Vec<Highlight>,
    },
    /// A computed batch to be added to the store
    #[serde(rename = "add-highlights-batch")]
    AddHighlightsBatch { highlights: Vec<Highlight> },
    /// Zoom level changed; consumed by renderers only
    #[serde(rename = "highlight-scale-change")]
    ScaleChange { scale: f64 },
}

impl HighlightEvent {
    /// Topic name as used on the wire
    pub fn topic(&self) -> &'static str {
        match self {
            HighlightEvent::FileHighlightsCleanup { .. } => "file-highlights-cleanup",
            HighlightEvent::FileHighlightsInit { .. } => "file-highlights-init",
            HighlightEvent::FileHighlightsLoaded { .. } => "file-highlights-loaded",
            HighlightEvent::CleanupConfirmed { .. } => "highlights-cleanup-confirmed",
            HighlightEvent::HighlightAllSameText { .. } => "highlight-all-same-text",
            HighlightEvent::HighlightAllSameResults { .. } => "highlight-all-same-results",
            HighlightEvent::AddHighlightsBatch { .. } => "add-highlights-batch",
            HighlightEvent::ScaleChange { .. } => "highlight-scale-change",
        }
    }
}

/// Broadcast bus for [`HighlightEvent`]s
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<HighlightEvent>,
}

impl EventBus {
    /// Create a new event bus with the given buffer capacity.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Emit an event to all subscribers. Dropped silently when nobody listens.
    pub fn emit(&self, event: HighlightEvent) {
        tracing::debug!(
            topic = event.topic(),
            subscriber_count = self.tx.receiver_count(),
            "EventBus emit"
        );
        let _ = self.tx.send(event);
    }

    /// Each subscriber gets its own independent stream.
    pub fn subscribe(&self) -> broadcast::Receiver<HighlightEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
