//! Change notification for highlight subscribers
//!
//! Callbacks are invoked synchronously, after a mutation has reached both the
//! durable store and the index, and before the mutating call returns.
//! Payloads are hints to re-query, not diffs.

use std::collections::BTreeSet;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde::Serialize;

use crate::highlights::HighlightType;

/// Scope of a change. Omitted trailing fields widen the scope: no page means
/// file-wide, no file means every file.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HighlightChange {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub highlight_type: Option<HighlightType>,
}

impl HighlightChange {
    /// Everything may have changed
    pub fn global() -> Self {
        Self {
            file_key: None,
            page: None,
            highlight_type: None,
        }
    }

    pub fn file(file_key: &str) -> Self {
        Self {
            file_key: Some(file_key.to_string()),
            page: None,
            highlight_type: None,
        }
    }

    pub fn page(file_key: &str, page: u32) -> Self {
        Self {
            file_key: Some(file_key.to_string()),
            page: Some(page),
            highlight_type: None,
        }
    }

    /// A type changed somewhere in a file
    pub fn file_type(file_key: &str, highlight_type: HighlightType) -> Self {
        Self {
            file_key: Some(file_key.to_string()),
            page: None,
            highlight_type: Some(highlight_type),
        }
    }

    pub fn exact(file_key: &str, page: u32, highlight_type: HighlightType) -> Self {
        Self {
            file_key: Some(file_key.to_string()),
            page: Some(page),
            highlight_type: Some(highlight_type),
        }
    }

    /// Whether this change may affect the given page of a file
    pub fn affects(&self, file_key: &str, page: u32) -> bool {
        self.file_key.as_deref().map_or(true, |key| key == file_key)
            && self.page.map_or(true, |p| p == page)
    }
}

type Callback = Arc<dyn Fn(&HighlightChange) + Send + Sync>;

#[derive(Default)]
struct Listeners {
    next_id: u64,
    entries: Vec<(u64, Callback)>,
}

/// Registry of change callbacks
#[derive(Clone, Default)]
pub struct ChangeNotifier {
    listeners: Arc<Mutex<Listeners>>,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback. It stays registered until the returned
    /// [`Subscription`] is unsubscribed or dropped.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&HighlightChange) + Send + Sync + 'static,
    {
        let mut listeners = self.listeners.lock();
        let id = listeners.next_id;
        listeners.next_id += 1;
        listeners.entries.push((id, Arc::new(callback)));

        Subscription {
            id,
            listeners: Arc::downgrade(&self.listeners),
        }
    }

    /// Deliver one change to every listener
    pub fn notify(&self, change: &HighlightChange) {
        // Snapshot so callbacks may subscribe or unsubscribe re-entrantly
        let callbacks: Vec<Callback> = self
            .listeners
            .lock()
            .entries
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();

        tracing::trace!(?change, listeners = callbacks.len(), "Notifying highlight change");

        for callback in callbacks {
            callback(change);
        }
    }

    /// Deliver a set of changes, each at most once
    pub fn notify_all(&self, changes: BTreeSet<HighlightChange>) {
        for change in &changes {
            self.notify(change);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().entries.len()
    }
}

/// Handle to a registered callback
#[must_use = "dropping a Subscription unsubscribes its callback"]
pub struct Subscription {
    id: u64,
    listeners: Weak<Mutex<Listeners>>,
}

impl Subscription {
    /// Remove the callback. Other subscribers are unaffected.
    pub fn unsubscribe(self) {
        // Drop does the work
    }

    fn detach(&self) {
        if let Some(listeners) = self.listeners.upgrade() {
            listeners.lock().entries.retain(|(id, _)| *id != self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.detach();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter(notifier: &ChangeNotifier) -> (Arc<AtomicUsize>, Subscription) {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        let subscription = notifier.subscribe(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        (count, subscription)
    }

    #[test]
    fn test_notify_reaches_all_listeners() {
        let notifier = ChangeNotifier::new();
        let (a, _sub_a) = counter(&notifier);
        let (b, _sub_b) = counter(&notifier);

        notifier.notify(&HighlightChange::page("f", 1));

        assert_eq!(a.load(Ordering::SeqCst), 1);
        assert_eq!(b.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unsubscribe_only_affects_one_listener() {
        let notifier = ChangeNotifier::new();
        let (a, sub_a) = counter(&notifier);
        let (b, _sub_b) = counter(&notifier);

        sub_a.unsubscribe();
        notifier.notify(&HighlightChange::global());

        assert_eq!(a.load(Ordering::SeqCst), 0);
        assert_eq!(b.load(Ordering::SeqCst), 1);
        assert_eq!(notifier.listener_count(), 1);
    }

    #[test]
    fn test_dropped_subscription_is_cleaned_up() {
        let notifier = ChangeNotifier::new();
        {
            let (_count, _sub) = counter(&notifier);
            assert_eq!(notifier.listener_count(), 1);
        }
        assert_eq!(notifier.listener_count(), 0);
    }

    #[test]
    fn test_unsubscribe_inside_callback() {
        let notifier = ChangeNotifier::new();
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let inner = Arc::clone(&slot);
        let sub = notifier.subscribe(move |_| {
            inner.lock().take();
        });
        *slot.lock() = Some(sub);

        notifier.notify(&HighlightChange::global());
        assert_eq!(notifier.listener_count(), 0);
    }

    #[test]
    fn test_notify_all_dedupes() {
        let notifier = ChangeNotifier::new();
        let (count, _sub) = counter(&notifier);

        let changes: BTreeSet<HighlightChange> = [
            HighlightChange::page("f", 1),
            HighlightChange::page("f", 1),
            HighlightChange::page("f", 2),
        ]
        .into_iter()
        .collect();
        notifier.notify_all(changes);

        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_change_scope() {
        assert!(HighlightChange::global().affects("f", 3));
        assert!(HighlightChange::file("f").affects("f", 3));
        assert!(!HighlightChange::file("g").affects("f", 3));
        assert!(!HighlightChange::page("f", 2).affects("f", 3));
    }
}
