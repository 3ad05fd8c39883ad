//! File lifecycle coordination
//!
//! Collaborators that do not hold a store reference (file managers, search
//! and detection utilities) talk to the store through the [`EventBus`]. The
//! bridge task spawned by [`FileLifecycle::spawn_bridge`] services those
//! requests. Cleanup uses a confirmation handshake with a bounded wait so a
//! missing bridge never hangs the caller.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio::time::{timeout, Duration};

use super::reconcile::preload_file_highlights;
use crate::error::StoreResult;
use crate::events::{EventBus, HighlightEvent};
use crate::highlights::{Highlight, HighlightStore, HighlightType};

/// Default wait for a cleanup confirmation
pub const DEFAULT_CLEANUP_TIMEOUT: Duration = Duration::from_secs(2);

/// Pages of each file that already ran entity detection
#[derive(Debug, Default)]
pub struct DetectionTracker {
    pages: Mutex<HashMap<String, BTreeSet<u32>>>,
}

impl DetectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a processed page. Returns false if it was already recorded.
    pub fn mark_processed(&self, file_key: &str, page: u32) -> bool {
        self.pages
            .lock()
            .entry(file_key.to_string())
            .or_default()
            .insert(page)
    }

    pub fn is_processed(&self, file_key: &str, page: u32) -> bool {
        self.pages
            .lock()
            .get(file_key)
            .is_some_and(|pages| pages.contains(&page))
    }

    /// Processed pages of a file, ascending
    pub fn processed_pages(&self, file_key: &str) -> Vec<u32> {
        self.pages
            .lock()
            .get(file_key)
            .map(|pages| pages.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Forget a file. Returns how many pages were tracked.
    pub fn reset_file(&self, file_key: &str) -> usize {
        self.pages
            .lock()
            .remove(file_key)
            .map(|pages| pages.len())
            .unwrap_or(0)
    }
}

/// Result of a cleanup request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupOutcome {
    /// The bridge confirmed the cleanup
    Confirmed { removed: usize },
    /// No confirmation arrived in time; the caller proceeds anyway
    TimedOut,
}

/// Coordinates file open/close with the highlight store
#[derive(Clone)]
pub struct FileLifecycle {
    store: Arc<HighlightStore>,
    bus: EventBus,
    tracker: Arc<DetectionTracker>,
    confirm_timeout: Duration,
}

impl FileLifecycle {
    pub fn new(store: Arc<HighlightStore>, bus: EventBus) -> Self {
        Self {
            store,
            bus,
            tracker: Arc::new(DetectionTracker::new()),
            confirm_timeout: DEFAULT_CLEANUP_TIMEOUT,
        }
    }

    /// Override how long [`request_cleanup`](Self::request_cleanup) waits
    pub fn with_confirm_timeout(mut self, confirm_timeout: Duration) -> Self {
        self.confirm_timeout = confirm_timeout;
        self
    }

    pub fn store(&self) -> &Arc<HighlightStore> {
        &self.store
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn tracker(&self) -> &DetectionTracker {
        &self.tracker
    }

    /// Reconcile a file's highlights on open
    pub async fn preload(&self, file_key: &str) -> StoreResult<usize> {
        preload_file_highlights(&self.store, &self.bus, file_key).await
    }

    /// Drop a file's highlights from both stores and its detection state,
    /// then confirm on the bus
    pub async fn cleanup_file_highlights(&self, file_key: &str) -> StoreResult<usize> {
        let removed = self.store.remove_highlights_from_file(file_key).await?;
        let pages = self.tracker.reset_file(file_key);

        tracing::info!(file_key, removed, detection_pages = pages, "File highlights cleaned up");
        self.bus.emit(HighlightEvent::CleanupConfirmed {
            file_key: file_key.to_string(),
            removed,
        });

        Ok(removed)
    }

    /// Ask whoever services the bus to clean up a file and wait for the
    /// confirmation, giving up after the configured timeout
    pub async fn request_cleanup(&self, file_key: &str) -> CleanupOutcome {
        let mut rx = self.bus.subscribe();
        self.bus.emit(HighlightEvent::FileHighlightsCleanup {
            file_key: file_key.to_string(),
        });

        let confirmation = timeout(self.confirm_timeout, async {
            loop {
                match rx.recv().await {
                    Ok(HighlightEvent::CleanupConfirmed {
                        file_key: confirmed,
                        removed,
                    }) if confirmed == file_key => return Some(removed),
                    Ok(_) | Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => return None,
                }
            }
        })
        .await;

        match confirmation {
            Ok(Some(removed)) => CleanupOutcome::Confirmed { removed },
            _ => {
                tracing::warn!(
                    file_key,
                    timeout_ms = self.confirm_timeout.as_millis() as u64,
                    "No cleanup confirmation, continuing"
                );
                CleanupOutcome::TimedOut
            }
        }
    }

    /// Store entity detection results for a page and mark it processed
    pub async fn apply_detection_results(
        &self,
        file_key: &str,
        page: u32,
        highlights: Vec<Highlight>,
    ) -> StoreResult<Vec<String>> {
        let highlights = highlights
            .into_iter()
            .map(|mut h| {
                h.page = page;
                h
            })
            .collect();

        let ids = self
            .store
            .add_highlights_by_type(file_key, HighlightType::Entity, highlights)
            .await?;
        self.tracker.mark_processed(file_key, page);

        Ok(ids)
    }

    /// Spawn the task that services bus requests against the store
    pub fn spawn_bridge(&self) -> JoinHandle<()> {
        // Subscribe before spawning so no request emitted after this call is missed
        let mut rx = self.bus.subscribe();
        let lifecycle = self.clone();

        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => lifecycle.handle(event).await,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Highlight bridge lagged behind the event bus");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            tracing::debug!("Highlight bridge stopped");
        })
    }

    async fn handle(&self, event: HighlightEvent) {
        match event {
            HighlightEvent::FileHighlightsCleanup { file_key } => {
                if let Err(e) = self.cleanup_file_highlights(&file_key).await {
                    tracing::error!(%file_key, error = %e, "Cleanup failed");
                }
            }
            HighlightEvent::FileHighlightsInit { file_key } => {
                if let Err(e) = self.preload(&file_key).await {
                    tracing::error!(%file_key, error = %e, "Preload failed");
                }
            }
            HighlightEvent::HighlightAllSameResults {
                file_key,
                text,
                highlights,
            } => match self.store.add_highlights_to_file(&file_key, highlights).await {
                Ok(ids) => {
                    tracing::debug!(%file_key, %text, count = ids.len(), "Same-text matches added")
                }
                Err(e) => tracing::error!(%file_key, error = %e, "Failed to add same-text matches"),
            },
            HighlightEvent::AddHighlightsBatch { highlights } => {
                if let Err(e) = self.store.add_multiple_highlights(highlights).await {
                    tracing::error!(error = %e, "Failed to add highlight batch");
                }
            }
            // Renderer and search topics
            HighlightEvent::FileHighlightsLoaded { .. }
            | HighlightEvent::CleanupConfirmed { .. }
            | HighlightEvent::HighlightAllSameText { .. }
            | HighlightEvent::ScaleChange { .. } => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryHighlightStore;
    use crate::highlights::BoundingBox;

    fn lifecycle() -> FileLifecycle {
        let store = Arc::new(HighlightStore::new(Arc::new(MemoryHighlightStore::new())));
        FileLifecycle::new(store, EventBus::new(64))
    }

    fn manual(id: &str, file_key: &str, page: u32) -> Highlight {
        Highlight::manual(file_key, page, 0.0, 0.0, 5.0, 5.0).with_id(id)
    }

    #[test]
    fn test_detection_tracker() {
        let tracker = DetectionTracker::new();
        assert!(tracker.mark_processed("a.pdf", 2));
        assert!(!tracker.mark_processed("a.pdf", 2));
        tracker.mark_processed("a.pdf", 1);

        assert!(tracker.is_processed("a.pdf", 1));
        assert!(!tracker.is_processed("b.pdf", 1));
        assert_eq!(tracker.processed_pages("a.pdf"), vec![1, 2]);

        assert_eq!(tracker.reset_file("a.pdf"), 2);
        assert!(tracker.processed_pages("a.pdf").is_empty());
    }

    #[tokio::test]
    async fn test_cleanup_clears_store_and_tracker() {
        let lifecycle = lifecycle();
        let mut rx = lifecycle.bus().subscribe();

        lifecycle
            .apply_detection_results(
                "a.pdf",
                3,
                vec![Highlight::detected_entity(
                    "a.pdf",
                    1,
                    "EMAIL",
                    "x@y.z",
                    BoundingBox::raw(0.0, 0.0, 1.0, 1.0),
                )],
            )
            .await
            .unwrap();
        assert!(lifecycle.tracker().is_processed("a.pdf", 3));
        assert_eq!(lifecycle.store().get_highlights_for_page("a.pdf", 3).len(), 1);

        let removed = lifecycle.cleanup_file_highlights("a.pdf").await.unwrap();
        assert_eq!(removed, 1);
        assert!(lifecycle.store().get_highlights_for_file("a.pdf").is_empty());
        assert!(!lifecycle.tracker().is_processed("a.pdf", 3));

        assert!(matches!(
            rx.recv().await.unwrap(),
            HighlightEvent::CleanupConfirmed { removed: 1, .. }
        ));
    }

    #[tokio::test]
    async fn test_request_cleanup_confirmed_by_bridge() {
        let lifecycle = lifecycle();
        lifecycle
            .store()
            .add_multiple_highlights(vec![manual("a", "a.pdf", 1), manual("b", "a.pdf", 2)])
            .await
            .unwrap();

        let bridge = lifecycle.spawn_bridge();
        let outcome = lifecycle.request_cleanup("a.pdf").await;
        bridge.abort();

        assert_eq!(outcome, CleanupOutcome::Confirmed { removed: 2 });
        assert!(lifecycle.store().get_highlights_for_file("a.pdf").is_empty());
    }

    #[tokio::test]
    async fn test_request_cleanup_times_out_without_bridge() {
        let lifecycle = lifecycle().with_confirm_timeout(Duration::from_millis(50));

        let outcome = lifecycle.request_cleanup("a.pdf").await;
        assert_eq!(outcome, CleanupOutcome::TimedOut);
    }

    #[tokio::test]
    async fn test_bridge_adds_batches() {
        let lifecycle = lifecycle();
        let mut rx = lifecycle.bus().subscribe();
        let bridge = lifecycle.spawn_bridge();

        lifecycle.bus().emit(HighlightEvent::HighlightAllSameResults {
            file_key: "a.pdf".to_string(),
            text: "Jane".to_string(),
            highlights: vec![manual("s1", "other.pdf", 1), manual("s2", "other.pdf", 4)],
        });
        lifecycle.bus().emit(HighlightEvent::AddHighlightsBatch {
            highlights: vec![manual("b1", "b.pdf", 1)],
        });
        // Init is handled after both batches, so its loaded event marks completion
        lifecycle.bus().emit(HighlightEvent::FileHighlightsInit {
            file_key: "a.pdf".to_string(),
        });

        loop {
            if let HighlightEvent::FileHighlightsLoaded { count, .. } = rx.recv().await.unwrap() {
                assert_eq!(count, 2);
                break;
            }
        }
        bridge.abort();

        assert_eq!(lifecycle.store().get_highlights_for_file("a.pdf").len(), 2);
        assert_eq!(lifecycle.store().get_highlights_for_file("b.pdf").len(), 1);
        assert!(lifecycle.store().get_highlights_for_file("other.pdf").is_empty());
    }
}
