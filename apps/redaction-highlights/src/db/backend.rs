//! Persistence trait and in-memory backend

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::StoreResult;
use crate::highlights::Highlight;

/// Durable key/value store of highlights keyed by id, with a per-file index.
///
/// Batch writes must be all-or-nothing: if `put_many` or `delete_many` fails,
/// none of the records may have been written.
#[async_trait]
pub trait HighlightBackend: Send + Sync {
    /// All highlights, or only those of one file
    async fn get_all(&self, file_key: Option<&str>) -> StoreResult<Vec<Highlight>>;

    /// Insert or replace one highlight
    async fn put(&self, highlight: &Highlight) -> StoreResult<()>;

    /// Insert or replace many highlights atomically
    async fn put_many(&self, highlights: &[Highlight]) -> StoreResult<()>;

    /// Delete by id (unknown ids are ignored)
    async fn delete(&self, id: &str) -> StoreResult<()>;

    /// Delete many ids atomically
    async fn delete_many(&self, ids: &[String]) -> StoreResult<()>;

    /// Delete every highlight of a file through the file index
    async fn delete_for_file(&self, file_key: &str) -> StoreResult<u64>;

    /// Delete everything
    async fn clear(&self) -> StoreResult<()>;
}

/// Non-persistent backend
#[derive(Debug, Default)]
pub struct MemoryHighlightStore {
    records: RwLock<HashMap<String, Highlight>>,
}

impl MemoryHighlightStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[async_trait]
impl HighlightBackend for MemoryHighlightStore {
    async fn get_all(&self, file_key: Option<&str>) -> StoreResult<Vec<Highlight>> {
        let records = self.records.read();
        let mut highlights: Vec<Highlight> = records
            .values()
            .filter(|h| file_key.map_or(true, |key| h.file_key == key))
            .cloned()
            .collect();
        highlights.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
        Ok(highlights)
    }

    async fn put(&self, highlight: &Highlight) -> StoreResult<()> {
        self.records
            .write()
            .insert(highlight.id.clone(), highlight.clone());
        Ok(())
    }

    async fn put_many(&self, highlights: &[Highlight]) -> StoreResult<()> {
        let mut records = self.records.write();
        for highlight in highlights {
            records.insert(highlight.id.clone(), highlight.clone());
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> StoreResult<()> {
        self.records.write().remove(id);
        Ok(())
    }

    async fn delete_many(&self, ids: &[String]) -> StoreResult<()> {
        let mut records = self.records.write();
        for id in ids {
            records.remove(id);
        }
        Ok(())
    }

    async fn delete_for_file(&self, file_key: &str) -> StoreResult<u64> {
        let mut records = self.records.write();
        let before = records.len();
        records.retain(|_, h| h.file_key != file_key);
        Ok((before - records.len()) as u64)
    }

    async fn clear(&self) -> StoreResult<()> {
        self.records.write().clear();
        Ok(())
    }
}
