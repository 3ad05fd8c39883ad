//! Index/durable-store reconciliation
//!
//! The index and the durable store can drift (a crashed write, an external
//! edit of the database). On file load both sides are read independently and
//! compared by size: the larger set is upserted into the smaller side and
//! returned. This is a repair heuristic, not a merge; records only present on
//! the smaller side are kept but not reported.

use crate::error::StoreResult;
use crate::events::{EventBus, HighlightEvent};
use crate::highlights::{Highlight, HighlightStore};

/// Which side supplied the returned set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileWinner {
    /// Both sides held the same number of records
    InSync,
    /// The index was larger and was written to the durable store
    Index,
    /// The durable store was larger and was loaded into the index
    Durable,
}

/// Outcome of reconciling one file
#[derive(Debug, Clone)]
pub struct Reconciliation {
    pub winner: ReconcileWinner,
    /// Records held by the index before reconciling
    pub indexed: usize,
    /// Records held by the durable store before reconciling
    pub persisted: usize,
    /// The winning set
    pub highlights: Vec<Highlight>,
}

/// Compare both sides for a file and import the larger into the smaller
pub async fn reconcile_file(store: &HighlightStore, file_key: &str) -> StoreResult<Reconciliation> {
    let _writes = store.lock_writes().await;
    let indexed = store.get_highlights_for_file(file_key);
    let persisted = store.load_persisted(file_key).await?;

    let (indexed_count, persisted_count) = (indexed.len(), persisted.len());

    if indexed_count == persisted_count {
        return Ok(Reconciliation {
            winner: ReconcileWinner::InSync,
            indexed: indexed_count,
            persisted: persisted_count,
            highlights: indexed,
        });
    }

    tracing::warn!(
        file_key,
        indexed = indexed_count,
        persisted = persisted_count,
        "Highlight stores diverged, importing the larger set"
    );

    if persisted_count > indexed_count {
        store.import_into_index(file_key, persisted.clone());
        Ok(Reconciliation {
            winner: ReconcileWinner::Durable,
            indexed: indexed_count,
            persisted: persisted_count,
            highlights: persisted,
        })
    } else {
        store.import_into_backend(&indexed).await?;
        Ok(Reconciliation {
            winner: ReconcileWinner::Index,
            indexed: indexed_count,
            persisted: persisted_count,
            highlights: indexed,
        })
    }
}

/// Highlights of a file after reconciling both sides
pub async fn get_file_highlights(store: &HighlightStore, file_key: &str) -> StoreResult<Vec<Highlight>> {
    Ok(reconcile_file(store, file_key).await?.highlights)
}

/// Reconcile a file on open and announce that its highlights are ready
pub async fn preload_file_highlights(
    store: &HighlightStore,
    bus: &EventBus,
    file_key: &str,
) -> StoreResult<usize> {
    let reconciliation = reconcile_file(store, file_key).await?;
    let count = reconciliation.highlights.len();

    tracing::info!(file_key, count, winner = ?reconciliation.winner, "File highlights preloaded");
    bus.emit(HighlightEvent::FileHighlightsLoaded {
        file_key: file_key.to_string(),
        count,
    });

    Ok(count)
}
