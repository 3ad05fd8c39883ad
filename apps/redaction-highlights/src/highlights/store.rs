//! Highlight store
//!
//! Single owner of the in-memory index and the durable backend. Every mutation
//! is written to the backend first and applied to the index only once the
//! write succeeded, so a persistence failure leaves the index untouched and is
//! returned to the caller. Each write-then-apply step runs under a write gate,
//! so concurrent writes to one id land in the same order on both sides.
//! Subscribers are notified after both sides agree,
//! before the mutating call returns.
//!
//! Not-found is never an error: queries return empty vectors and removals of
//! unknown ids are no-ops that report nothing removed.

use std::collections::BTreeSet;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::{Mutex, MutexGuard};

use super::id::generate_unique_id;
use super::index::HighlightIndex;
use super::types::{Highlight, HighlightType, Region};
use crate::db::HighlightBackend;
use crate::error::{StoreError, StoreResult};
use crate::events::{ChangeNotifier, HighlightChange, Subscription};

/// Highlight store shared by reference across the application
pub struct HighlightStore {
    index: RwLock<HighlightIndex>,
    backend: Arc<dyn HighlightBackend>,
    notifier: ChangeNotifier,
    /// Held from the durable write until the index apply
    write_gate: Mutex<()>,
}

impl HighlightStore {
    /// Create a store with an empty index
    pub fn new(backend: Arc<dyn HighlightBackend>) -> Self {
        Self {
            index: RwLock::new(HighlightIndex::new()),
            backend,
            notifier: ChangeNotifier::new(),
            write_gate: Mutex::new(()),
        }
    }

    /// Create a store and hydrate the index from everything persisted
    pub async fn open(backend: Arc<dyn HighlightBackend>) -> StoreResult<Self> {
        let persisted = backend.get_all(None).await?;
        let count = persisted.len();

        let store = Self::new(backend);
        {
            let mut index = store.index.write();
            for highlight in persisted {
                index.insert(highlight);
            }
        }

        tracing::info!(count, "Highlight store loaded");
        Ok(store)
    }

    /// Register a change callback
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&HighlightChange) + Send + Sync + 'static,
    {
        self.notifier.subscribe(callback)
    }

    // ------------------------------------------------------------------
    // Single highlight
    // ------------------------------------------------------------------

    /// Insert or replace a highlight, returning its id
    pub async fn add_highlight(&self, highlight: Highlight) -> StoreResult<String> {
        let highlight = assign_id(highlight);
        let _gate = self.write_gate.lock().await;

        self.backend
            .put(&highlight)
            .await
            .map_err(|e| persist_failed("add_highlight", e))?;

        let id = highlight.id.clone();
        let mut changes = BTreeSet::new();
        changes.insert(change_for(&highlight));

        if let Some(previous) = self.index.write().insert(highlight) {
            changes.insert(change_for(&previous));
        }

        tracing::debug!(%id, "Highlight added");
        self.notifier.notify_all(changes);
        Ok(id)
    }

    /// Remove a highlight by id. Returns false for unknown ids.
    pub async fn remove_highlight(&self, id: &str) -> StoreResult<bool> {
        let gate = self.write_gate.lock().await;
        if !self.index.read().contains(id) {
            return Ok(false);
        }

        self.backend
            .delete(id)
            .await
            .map_err(|e| persist_failed("remove_highlight", e))?;

        let removed = self.index.write().remove(id);
        drop(gate);

        match removed {
            Some(highlight) => {
                tracing::debug!(%id, "Highlight removed");
                self.notifier.notify(&change_for(&highlight));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Look up a highlight by id
    pub fn get_highlight(&self, id: &str) -> Option<Highlight> {
        self.index.read().get(id).cloned()
    }

    // ------------------------------------------------------------------
    // Batches
    // ------------------------------------------------------------------

    /// Insert or replace many highlights with one durable write
    pub async fn add_multiple_highlights(
        &self,
        highlights: Vec<Highlight>,
    ) -> StoreResult<Vec<String>> {
        if highlights.is_empty() {
            return Ok(Vec::new());
        }

        let highlights: Vec<Highlight> = highlights.into_iter().map(assign_id).collect();
        let _gate = self.write_gate.lock().await;

        self.backend
            .put_many(&highlights)
            .await
            .map_err(|e| persist_failed("add_multiple_highlights", e))?;

        let ids: Vec<String> = highlights.iter().map(|h| h.id.clone()).collect();
        let mut changes = BTreeSet::new();
        {
            let mut index = self.index.write();
            for highlight in highlights {
                changes.insert(change_for(&highlight));
                if let Some(previous) = index.insert(highlight) {
                    changes.insert(change_for(&previous));
                }
            }
        }

        tracing::debug!(count = ids.len(), "Highlights added");
        self.notifier.notify_all(changes);
        Ok(ids)
    }

    /// Remove many ids, ignoring unknown ones. Returns how many were removed.
    pub async fn remove_multiple_highlights(&self, ids: &[String]) -> StoreResult<usize> {
        if ids.is_empty() {
            return Ok(0);
        }

        let removed = self.remove_known(ids.to_vec()).await?;
        self.notifier
            .notify_all(removed.iter().map(change_for).collect());
        Ok(removed.len())
    }

    // ------------------------------------------------------------------
    // Pages
    // ------------------------------------------------------------------

    pub fn get_highlights_for_page(&self, file_key: &str, page: u32) -> Vec<Highlight> {
        self.index.read().page(file_key, page)
    }

    /// Add highlights to a page, overriding their `file_key` and `page`
    pub async fn add_highlights_to_page(
        &self,
        file_key: &str,
        page: u32,
        highlights: Vec<Highlight>,
    ) -> StoreResult<Vec<String>> {
        let highlights = highlights
            .into_iter()
            .map(|mut h| {
                h.file_key = file_key.to_string();
                h.page = page;
                h
            })
            .collect();

        self.add_multiple_highlights(highlights).await
    }

    /// Remove everything on a page
    pub async fn remove_highlights_from_page(&self, file_key: &str, page: u32) -> StoreResult<usize> {
        let ids = self.index.read().page_ids(file_key, page);
        if ids.is_empty() {
            return Ok(0);
        }

        let removed = self.remove_known(ids).await?;
        if !removed.is_empty() {
            self.notifier.notify(&HighlightChange::page(file_key, page));
        }
        Ok(removed.len())
    }

    /// Remove highlights on a page whose corrected box matches the region
    pub async fn remove_highlights_by_position(
        &self,
        file_key: &str,
        page: u32,
        region: &Region,
    ) -> StoreResult<usize> {
        let ids: Vec<String> = self
            .index
            .read()
            .page(file_key, page)
            .into_iter()
            .filter(|h| region.matches(h))
            .map(|h| h.id)
            .collect();

        self.remove_and_notify(ids).await
    }

    // ------------------------------------------------------------------
    // Files
    // ------------------------------------------------------------------

    pub fn get_highlights_for_file(&self, file_key: &str) -> Vec<Highlight> {
        self.index.read().file(file_key)
    }

    /// Add highlights to a file, overriding their `file_key`
    pub async fn add_highlights_to_file(
        &self,
        file_key: &str,
        highlights: Vec<Highlight>,
    ) -> StoreResult<Vec<String>> {
        let highlights = highlights
            .into_iter()
            .map(|mut h| {
                h.file_key = file_key.to_string();
                h
            })
            .collect();

        self.add_multiple_highlights(highlights).await
    }

    /// Remove every highlight of a file through the backend's file index
    pub async fn remove_highlights_from_file(&self, file_key: &str) -> StoreResult<usize> {
        let gate = self.write_gate.lock().await;
        let persisted = self
            .backend
            .delete_for_file(file_key)
            .await
            .map_err(|e| persist_failed("remove_highlights_from_file", e))?;

        let removed = self.index.write().remove_file(file_key);
        drop(gate);

        if removed.len() as u64 != persisted {
            tracing::warn!(
                file_key,
                indexed = removed.len(),
                persisted,
                "Index and durable store disagreed on file size"
            );
        }

        if !removed.is_empty() || persisted > 0 {
            tracing::debug!(file_key, count = removed.len(), "File highlights removed");
            self.notifier.notify(&HighlightChange::file(file_key));
        }
        Ok(removed.len())
    }

    /// Number of indexed highlights for a file
    pub fn highlight_count(&self, file_key: &str) -> usize {
        self.index.read().count_for_file(file_key)
    }

    /// Files with at least one indexed highlight
    pub fn file_keys(&self) -> Vec<String> {
        self.index.read().file_keys()
    }

    // ------------------------------------------------------------------
    // Types
    // ------------------------------------------------------------------

    pub fn get_highlights_by_type(
        &self,
        file_key: &str,
        highlight_type: HighlightType,
    ) -> Vec<Highlight> {
        self.index
            .read()
            .filter_file(file_key, |h| h.highlight_type == highlight_type)
    }

    /// Add highlights to a file with a fixed type
    pub async fn add_highlights_by_type(
        &self,
        file_key: &str,
        highlight_type: HighlightType,
        highlights: Vec<Highlight>,
    ) -> StoreResult<Vec<String>> {
        let highlights = highlights
            .into_iter()
            .map(|mut h| {
                h.file_key = file_key.to_string();
                h.highlight_type = highlight_type;
                h
            })
            .collect();

        self.add_multiple_highlights(highlights).await
    }

    /// Remove one type from a file. Notifies once without a page qualifier.
    pub async fn remove_highlights_by_type(
        &self,
        file_key: &str,
        highlight_type: HighlightType,
    ) -> StoreResult<usize> {
        let ids = ids_of(self.get_highlights_by_type(file_key, highlight_type));
        let removed = self.remove_known(ids).await?;

        if !removed.is_empty() {
            self.notifier
                .notify(&HighlightChange::file_type(file_key, highlight_type));
        }
        Ok(removed.len())
    }

    /// Remove one type from every file
    pub async fn remove_all_highlights_by_type(
        &self,
        highlight_type: HighlightType,
    ) -> StoreResult<usize> {
        let ids = ids_of(
            self.index
                .read()
                .filter_all(|h| h.highlight_type == highlight_type),
        );
        let removed = self.remove_known(ids).await?;

        let changes: BTreeSet<HighlightChange> = removed
            .iter()
            .map(|h| HighlightChange::file_type(&h.file_key, highlight_type))
            .collect();
        self.notifier.notify_all(changes);
        Ok(removed.len())
    }

    // ------------------------------------------------------------------
    // Properties and text
    // ------------------------------------------------------------------

    /// Highlights of a file matching an arbitrary predicate
    pub fn get_highlights_by_property<F>(&self, file_key: &str, predicate: F) -> Vec<Highlight>
    where
        F: Fn(&Highlight) -> bool,
    {
        self.index.read().filter_file(file_key, predicate)
    }

    pub async fn remove_highlights_by_property<F>(
        &self,
        file_key: &str,
        predicate: F,
    ) -> StoreResult<usize>
    where
        F: Fn(&Highlight) -> bool,
    {
        let ids = ids_of(self.get_highlights_by_property(file_key, predicate));
        self.remove_and_notify(ids).await
    }

    /// Remove matching highlights from every file (e.g. an ignored word)
    pub async fn remove_highlights_by_property_from_all_files<F>(
        &self,
        predicate: F,
    ) -> StoreResult<usize>
    where
        F: Fn(&Highlight) -> bool,
    {
        let ids = ids_of(self.index.read().filter_all(predicate));
        self.remove_and_notify(ids).await
    }

    /// Exact match on `text`
    pub fn get_highlights_by_text(&self, file_key: &str, text: &str) -> Vec<Highlight> {
        self.get_highlights_by_property(file_key, |h| h.text.as_deref() == Some(text))
    }

    pub async fn remove_highlights_by_text(&self, file_key: &str, text: &str) -> StoreResult<usize> {
        self.remove_highlights_by_property(file_key, |h| h.text.as_deref() == Some(text))
            .await
    }

    // ------------------------------------------------------------------
    // Global
    // ------------------------------------------------------------------

    /// Clear the given files, or everything when `file_keys` is empty
    pub async fn remove_all_highlights(&self, file_keys: &[String]) -> StoreResult<usize> {
        if !file_keys.is_empty() {
            let mut total = 0;
            for file_key in file_keys {
                total += self.remove_highlights_from_file(file_key).await?;
            }
            return Ok(total);
        }

        let gate = self.write_gate.lock().await;
        self.backend
            .clear()
            .await
            .map_err(|e| persist_failed("remove_all_highlights", e))?;

        let removed = {
            let mut index = self.index.write();
            let count = index.len();
            index.clear();
            count
        };
        drop(gate);

        tracing::info!(count = removed, "All highlights cleared");
        self.notifier.notify(&HighlightChange::global());
        Ok(removed)
    }

    // ------------------------------------------------------------------
    // Reconciliation hooks
    // ------------------------------------------------------------------

    /// Hold off every other writer while both sides are compared and repaired
    pub(crate) async fn lock_writes(&self) -> MutexGuard<'_, ()> {
        self.write_gate.lock().await
    }

    /// Read one file straight from the durable store
    pub(crate) async fn load_persisted(&self, file_key: &str) -> StoreResult<Vec<Highlight>> {
        self.backend.get_all(Some(file_key)).await
    }

    /// Upsert records into the index without touching the backend
    pub(crate) fn import_into_index(&self, file_key: &str, highlights: Vec<Highlight>) {
        {
            let mut index = self.index.write();
            for highlight in highlights {
                index.insert(highlight);
            }
        }
        self.notifier.notify(&HighlightChange::file(file_key));
    }

    /// Write records to the backend without touching the index
    pub(crate) async fn import_into_backend(&self, highlights: &[Highlight]) -> StoreResult<()> {
        self.backend.put_many(highlights).await
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// Delete the ids the index knows about; unknown ids are skipped
    async fn remove_known(&self, ids: Vec<String>) -> StoreResult<Vec<Highlight>> {
        let _gate = self.write_gate.lock().await;
        let known: Vec<String> = {
            let index = self.index.read();
            let mut seen = BTreeSet::new();
            ids.into_iter()
                .filter(|id| index.contains(id) && seen.insert(id.clone()))
                .collect()
        };
        if known.is_empty() {
            return Ok(Vec::new());
        }

        self.backend
            .delete_many(&known)
            .await
            .map_err(|e| persist_failed("remove_highlights", e))?;

        let removed: Vec<Highlight> = {
            let mut index = self.index.write();
            known.iter().filter_map(|id| index.remove(id)).collect()
        };

        tracing::debug!(count = removed.len(), "Highlights removed");
        Ok(removed)
    }

    /// Remove ids and notify once per affected (file, page, type)
    async fn remove_and_notify(&self, ids: Vec<String>) -> StoreResult<usize> {
        let removed = self.remove_known(ids).await?;
        self.notifier
            .notify_all(removed.iter().map(change_for).collect());
        Ok(removed.len())
    }
}

fn assign_id(mut highlight: Highlight) -> Highlight {
    if highlight.is_unassigned() {
        highlight.id = generate_unique_id(Some(highlight.highlight_type));
    }
    highlight
}

fn change_for(highlight: &Highlight) -> HighlightChange {
    HighlightChange::exact(&highlight.file_key, highlight.page, highlight.highlight_type)
}

fn ids_of(highlights: Vec<Highlight>) -> Vec<String> {
    highlights.into_iter().map(|h| h.id).collect()
}

fn persist_failed(operation: &str, error: StoreError) -> StoreError {
    tracing::error!(operation, error = %error, "Durable highlight write failed, index unchanged");
    error
}
