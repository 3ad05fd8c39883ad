//! Application state management

use std::sync::Arc;

use crate::config::Config;
use crate::events::EventBus;
use crate::highlights::HighlightStore;
use crate::sync::FileLifecycle;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    store: Arc<HighlightStore>,
    lifecycle: FileLifecycle,
}

impl AppState {
    /// Wire the store to a fresh event bus sized from the config
    pub fn new(config: Config, store: Arc<HighlightStore>) -> Self {
        let bus = EventBus::new(config.highlights.event_bus_capacity);
        let lifecycle = FileLifecycle::new(store.clone(), bus)
            .with_confirm_timeout(config.highlights.cleanup_confirm_timeout());

        Self {
            inner: Arc::new(AppStateInner {
                config,
                store,
                lifecycle,
            }),
        }
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn store(&self) -> &HighlightStore {
        &self.inner.store
    }

    pub fn bus(&self) -> &EventBus {
        self.inner.lifecycle.bus()
    }

    pub fn lifecycle(&self) -> &FileLifecycle {
        &self.inner.lifecycle
    }
}
