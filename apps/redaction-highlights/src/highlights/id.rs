//! Highlight id generation

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use uuid::Uuid;

use super::types::HighlightType;

static COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate an id that is unique for the lifetime of the process.
///
/// Format: `{prefix}-{unix_millis}-{counter}-{random}`, where the prefix is the
/// lowercase type name or `highlight` when no hint is given.
pub fn generate_unique_id(type_hint: Option<HighlightType>) -> String {
    let prefix = type_hint.map(|t| t.as_str()).unwrap_or("highlight");
    let counter = COUNTER.fetch_add(1, Ordering::Relaxed);
    let random = Uuid::new_v4().simple().to_string();

    format!(
        "{}-{}-{}-{}",
        prefix,
        Utc::now().timestamp_millis(),
        counter,
        &random[..8]
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_ids_are_distinct() {
        let ids: HashSet<String> = (0..10_000).map(|_| generate_unique_id(None)).collect();
        assert_eq!(ids.len(), 10_000);
    }

    #[test]
    fn test_type_prefix() {
        assert!(generate_unique_id(Some(HighlightType::Entity)).starts_with("entity-"));
        assert!(generate_unique_id(Some(HighlightType::Search)).starts_with("search-"));
        assert!(generate_unique_id(None).starts_with("highlight-"));
    }
}
