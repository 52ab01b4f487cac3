//! Debounced note lookup behind the command palette.

use crate::config::EditorConfig;
use crate::models::Note;
use crate::scheduler::{Debouncer, Scheduler};
use crate::state::NoteStore;
use crate::storage::StorageBackend;
use leptos::prelude::*;
use std::cell::Cell;
use std::rc::Rc;
use tracing::debug;

#[derive(Clone)]
pub struct CommandSearch<B: StorageBackend, S: Scheduler> {
    store: NoteStore<B>,
    debouncer: Debouncer<S>,
    delay_ms: u32,
    latest: Rc<Cell<u64>>,
    pub query: RwSignal<String>,
    pub results: RwSignal<Vec<Note>>,
    pub searching: RwSignal<bool>,
}

impl<B: StorageBackend, S: Scheduler> CommandSearch<B, S> {
    pub fn new(store: NoteStore<B>, scheduler: S, config: &EditorConfig) -> Self {
        Self {
            store,
            debouncer: Debouncer::new(scheduler),
            delay_ms: config.search_debounce_ms,
            latest: Rc::new(Cell::new(0)),
            query: RwSignal::new(String::new()),
            results: RwSignal::new(vec![]),
            searching: RwSignal::new(false),
        }
    }

    /// Only the newest query's results are ever shown. A blank query clears them immediately.
    pub fn set_query(&self, raw: &str) {
        let query = raw.trim().to_string();
        let request = self.latest.get() + 1;
        self.latest.set(request);
        self.query.set(query.clone());

        if query.is_empty() {
            self.debouncer.cancel();
            self.results.set(vec![]);
            self.searching.set(false);
            return;
        }

        self.searching.set(true);
        let search = self.clone();
        self.debouncer.reschedule(self.delay_ms, async move {
            let hits = search.store.search_notes(&query).await;
            if search.latest.get() != request {
                debug!(%query, "dropping stale search results");
                return;
            }
            search.searching.set(false);
            // Failures are already logged by the store.
            search.results.set(hits.unwrap_or_default());
        });
    }

    pub fn clear(&self) {
        self.set_query("");
    }
}
