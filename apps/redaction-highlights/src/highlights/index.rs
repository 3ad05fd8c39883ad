//! In-memory highlight index
//!
//! Nested mapping `file -> page -> id -> highlight` with a secondary
//! `id -> (file, page)` map so lookups and removals by id do not scan.
//! Empty page and file maps are pruned as soon as their last highlight leaves.

use std::collections::{BTreeMap, HashMap};

use super::types::Highlight;

type PageMap = BTreeMap<u32, HashMap<String, Highlight>>;

/// Synchronous index mirroring the durable store
#[derive(Debug, Default)]
pub struct HighlightIndex {
    files: HashMap<String, PageMap>,
    locations: HashMap<String, (String, u32)>,
}

impl HighlightIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a highlight by id.
    ///
    /// If the id already lives at another file/page it is moved, so the record
    /// is always stored under its own `file_key` and `page`.
    pub fn insert(&mut self, highlight: Highlight) -> Option<Highlight> {
        let moved = self
            .locations
            .get(&highlight.id)
            .is_some_and(|(file_key, page)| {
                *file_key != highlight.file_key || *page != highlight.page
            });
        let previous = if moved {
            self.remove(&highlight.id)
        } else {
            None
        };

        self.locations.insert(
            highlight.id.clone(),
            (highlight.file_key.clone(), highlight.page),
        );

        let replaced = self
            .files
            .entry(highlight.file_key.clone())
            .or_default()
            .entry(highlight.page)
            .or_default()
            .insert(highlight.id.clone(), highlight);

        replaced.or(previous)
    }

    /// Remove a highlight by id, pruning empty containers
    pub fn remove(&mut self, id: &str) -> Option<Highlight> {
        let (file_key, page) = self.locations.remove(id)?;

        let pages = self.files.get_mut(&file_key)?;
        let entries = pages.get_mut(&page)?;
        let removed = entries.remove(id);

        if entries.is_empty() {
            pages.remove(&page);
        }
        if pages.is_empty() {
            self.files.remove(&file_key);
        }

        removed
    }

    /// Look up a highlight by id
    pub fn get(&self, id: &str) -> Option<&Highlight> {
        let (file_key, page) = self.locations.get(id)?;
        self.files.get(file_key)?.get(page)?.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.locations.contains_key(id)
    }

    /// Highlights on one page, oldest first
    pub fn page(&self, file_key: &str, page: u32) -> Vec<Highlight> {
        match self.files.get(file_key).and_then(|pages| pages.get(&page)) {
            Some(entries) => sorted(entries.values().cloned().collect()),
            None => Vec::new(),
        }
    }

    /// Highlights across every page of a file, ordered by page then age
    pub fn file(&self, file_key: &str) -> Vec<Highlight> {
        self.filter_file(file_key, |_| true)
    }

    /// Ids on one page
    pub fn page_ids(&self, file_key: &str, page: u32) -> Vec<String> {
        self.files
            .get(file_key)
            .and_then(|pages| pages.get(&page))
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Highlights of a file matching a predicate
    pub fn filter_file<F>(&self, file_key: &str, predicate: F) -> Vec<Highlight>
    where
        F: Fn(&Highlight) -> bool,
    {
        let Some(pages) = self.files.get(file_key) else {
            return Vec::new();
        };

        pages
            .values()
            .flat_map(|entries| {
                sorted(
                    entries
                        .values()
                        .filter(|h| predicate(*h))
                        .cloned()
                        .collect(),
                )
            })
            .collect()
    }

    /// Highlights of every file matching a predicate
    pub fn filter_all<F>(&self, predicate: F) -> Vec<Highlight>
    where
        F: Fn(&Highlight) -> bool,
    {
        let mut file_keys: Vec<&String> = self.files.keys().collect();
        file_keys.sort();

        file_keys
            .into_iter()
            .flat_map(|file_key| self.filter_file(file_key, &predicate))
            .collect()
    }

    /// Drop a file and return what it held
    pub fn remove_file(&mut self, file_key: &str) -> Vec<Highlight> {
        let Some(pages) = self.files.remove(file_key) else {
            return Vec::new();
        };

        let mut removed = Vec::new();
        for entries in pages.into_values() {
            for (id, highlight) in entries {
                self.locations.remove(&id);
                removed.push(highlight);
            }
        }
        removed
    }

    /// Known file keys, sorted
    pub fn file_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.files.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn count_for_file(&self, file_key: &str) -> usize {
        self.files
            .get(file_key)
            .map(|pages| pages.values().map(HashMap::len).sum())
            .unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    pub fn clear(&mut self) {
        self.files.clear();
        self.locations.clear();
    }
}

fn sorted(mut highlights: Vec<Highlight>) -> Vec<Highlight> {
    highlights.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
    highlights
}

#[cfg(test)]
mod tests {
    use super::*;

    fn highlight(id: &str, file_key: &str, page: u32) -> Highlight {
        Highlight::manual(file_key, page, 0.0, 0.0, 10.0, 10.0).with_id(id)
    }

    #[test]
    fn test_insert_and_lookup() {
        let mut index = HighlightIndex::new();
        index.insert(highlight("a", "f1", 1));
        index.insert(highlight("b", "f1", 2));
        index.insert(highlight("c", "f2", 1));

        assert_eq!(index.len(), 3);
        assert_eq!(index.page("f1", 1).len(), 1);
        assert_eq!(index.file("f1").len(), 2);
        assert_eq!(index.get("c").unwrap().file_key, "f2");
        assert_eq!(index.file_keys(), vec!["f1".to_string(), "f2".to_string()]);
    }

    #[test]
    fn test_upsert_replaces_in_place() {
        let mut index = HighlightIndex::new();
        index.insert(highlight("a", "f1", 1));
        let previous = index.insert(highlight("a", "f1", 1).with_text("updated"));

        assert!(previous.is_some());
        assert_eq!(index.len(), 1);
        assert_eq!(index.page("f1", 1)[0].text.as_deref(), Some("updated"));
    }

    #[test]
    fn test_upsert_moves_between_pages() {
        let mut index = HighlightIndex::new();
        index.insert(highlight("a", "f1", 1));
        index.insert(highlight("a", "f1", 3));

        assert!(index.page("f1", 1).is_empty());
        assert_eq!(index.page("f1", 3).len(), 1);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_remove_prunes_empty_containers() {
        let mut index = HighlightIndex::new();
        index.insert(highlight("a", "f1", 1));

        assert!(index.remove("a").is_some());
        assert!(index.remove("a").is_none());
        assert!(index.file_keys().is_empty());
        assert!(index.is_empty());
    }

    #[test]
    fn test_unknown_lookups_are_empty() {
        let index = HighlightIndex::new();
        assert!(index.page("missing", 1).is_empty());
        assert!(index.file("missing").is_empty());
        assert!(index.page_ids("missing", 4).is_empty());
        assert_eq!(index.count_for_file("missing"), 0);
    }

    #[test]
    fn test_remove_file() {
        let mut index = HighlightIndex::new();
        index.insert(highlight("a", "f1", 1));
        index.insert(highlight("b", "f1", 2));
        index.insert(highlight("c", "f2", 1));

        let removed = index.remove_file("f1");
        assert_eq!(removed.len(), 2);
        assert!(!index.contains("a"));
        assert!(index.contains("c"));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_filter_all() {
        let mut index = HighlightIndex::new();
        index.insert(highlight("a", "f1", 1).with_text("x"));
        index.insert(highlight("b", "f2", 1).with_text("x"));
        index.insert(highlight("c", "f2", 2).with_text("y"));

        let matches = index.filter_all(|h| h.text.as_deref() == Some("x"));
        assert_eq!(matches.len(), 2);
    }
}
