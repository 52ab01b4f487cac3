use super::log_failure;
use crate::models::{Note, DEFAULT_NOTE_TITLE};
use crate::storage::{StorageBackend, StorageError, StorageResult};
use leptos::prelude::*;
use std::collections::HashMap;
use tracing::debug;

/// Cached notes plus the note currently open in the editor.
///
/// The cache only changes after a successful backend call, always by replacing the list.
#[derive(Clone)]
pub struct NoteStore<B: StorageBackend> {
    backend: B,
    pub notes: RwSignal<Vec<Note>>,
    pub active_note: RwSignal<Option<Note>>,
    pub loading: RwSignal<bool>,
    pub last_error: RwSignal<Option<StorageError>>,

    /// Bumped per list fetch; a response for an older id is dropped.
    list_request_id: RwSignal<u64>,

    /// Latest write issued per note; an older write's response never overwrites a newer one.
    write_seq: RwSignal<HashMap<String, u64>>,

    /// Bumped whenever the active note is about to change; an older load is not applied.
    note_request_id: RwSignal<u64>,
}

impl<B: StorageBackend> NoteStore<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            notes: RwSignal::new(vec![]),
            active_note: RwSignal::new(None),
            loading: RwSignal::new(false),
            last_error: RwSignal::new(None),
            list_request_id: RwSignal::new(0),
            write_seq: RwSignal::new(HashMap::new()),
            note_request_id: RwSignal::new(0),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn fail<T>(&self, op: &'static str, e: StorageError) -> StorageResult<T> {
        log_failure(op, &e);
        self.last_error.set(Some(e.clone()));
        Err(e)
    }

    async fn load_list(
        &self,
        op: &'static str,
        fetch: impl std::future::Future<Output = StorageResult<Vec<Note>>>,
    ) -> StorageResult<()> {
        self.list_request_id.update(|id| *id += 1);
        let request_id = self.list_request_id.get_untracked();
        self.loading.set(true);

        let result = fetch.await;

        if self.list_request_id.get_untracked() != request_id {
            debug!(op, request_id, "dropping stale note list");
            return Ok(());
        }
        self.loading.set(false);
        match result {
            Ok(notes) => {
                self.notes.set(notes);
                self.last_error.set(None);
                Ok(())
            }
            Err(e) => self.fail(op, e),
        }
    }

    pub async fn fetch_notes(&self, subject_id: &str) -> StorageResult<()> {
        let backend = self.backend.clone();
        self.load_list("fetch_notes", async move {
            backend.list_notes_by_subject(subject_id).await
        })
        .await
    }

    pub async fn fetch_all_notes(&self) -> StorageResult<()> {
        let backend = self.backend.clone();
        self.load_list("fetch_all_notes", async move { backend.list_all_notes().await })
            .await
    }

    fn next_note_request(&self) -> u64 {
        self.note_request_id.update(|r| *r += 1);
        self.note_request_id.get_untracked()
    }

    /// Load one note and make it the active note, unless another note was opened meanwhile.
    pub async fn fetch_note(&self, id: &str) -> StorageResult<Note> {
        let request_id = self.next_note_request();
        let result = self.backend.get_note(id).await;
        if self.note_request_id.get_untracked() != request_id {
            debug!(note_id = %id, request_id, "dropping stale note load");
            return result;
        }
        match result {
            Ok(note) => {
                self.active_note.set(Some(note.clone()));
                Ok(note)
            }
            Err(e) => self.fail("fetch_note", e),
        }
    }

    /// Create a note at the top of the list and make it active. The title defaults to "Untitled".
    pub async fn create_note(&self, subject_id: &str, title: Option<&str>) -> StorageResult<Note> {
        let title = title.unwrap_or(DEFAULT_NOTE_TITLE);
        self.next_note_request();
        match self.backend.create_note(subject_id, title).await {
            Ok(note) => {
                let created = note.clone();
                self.notes.update(|notes| {
                    let mut next = Vec::with_capacity(notes.len() + 1);
                    next.push(created);
                    next.append(notes);
                    *notes = next;
                });
                self.active_note.set(Some(note.clone()));
                Ok(note)
            }
            Err(e) => self.fail("create_note", e),
        }
    }

    pub async fn update_note(
        &self,
        id: &str,
        title: &str,
        content_json: &str,
        plain_text: &str,
    ) -> StorageResult<Note> {
        let mut seq = 0;
        self.write_seq.update(|m| {
            let entry = m.entry(id.to_string()).or_insert(0);
            *entry += 1;
            seq = *entry;
        });

        let result = self
            .backend
            .update_note(id, title, content_json, plain_text)
            .await;

        let latest = self
            .write_seq
            .with_untracked(|m| m.get(id).copied().unwrap_or(0));
        if latest != seq {
            debug!(note_id = %id, seq, latest, "ignoring superseded write response");
            return result;
        }

        match result {
            Ok(note) => {
                let saved = note.clone();
                self.notes.update(|notes| {
                    *notes = notes
                        .iter()
                        .map(|n| if n.id == saved.id { saved.clone() } else { n.clone() })
                        .collect();
                });
                if self
                    .active_note
                    .with_untracked(|a| a.as_ref().is_some_and(|a| a.id == note.id))
                {
                    self.active_note.set(Some(note.clone()));
                }
                Ok(note)
            }
            Err(e) => self.fail("update_note", e),
        }
    }

    pub async fn delete_note(&self, id: &str) -> StorageResult<()> {
        match self.backend.delete_note(id).await {
            Ok(()) => {
                self.notes
                    .update(|notes| *notes = notes.iter().filter(|n| n.id != id).cloned().collect());
                if self
                    .active_note
                    .with_untracked(|a| a.as_ref().is_some_and(|a| a.id == id))
                {
                    self.active_note.set(None);
                }
                self.write_seq.update(|m| {
                    m.remove(id);
                });
                Ok(())
            }
            Err(e) => self.fail("delete_note", e),
        }
    }

    /// Pass-through search; results are not cached here.
    pub async fn search_notes(&self, query: &str) -> StorageResult<Vec<Note>> {
        match self.backend.search_notes(query).await {
            Ok(hits) => Ok(hits),
            Err(e) => self.fail("search_notes", e),
        }
    }

    pub fn set_active_note(&self, note: Option<Note>) {
        self.active_note.set(note);
    }

    /// Forget every cached note of a deleted subject. Returns the ids that were dropped,
    /// including the active note's if it belonged to the subject.
    pub fn purge_subject(&self, subject_id: &str) -> Vec<String> {
        let mut removed: Vec<String> = self.notes.with_untracked(|notes| {
            notes
                .iter()
                .filter(|n| n.subject_id == subject_id)
                .map(|n| n.id.clone())
                .collect()
        });
        self.notes.update(|notes| {
            *notes = notes
                .iter()
                .filter(|n| n.subject_id != subject_id)
                .cloned()
                .collect()
        });

        let active = self.active_note.get_untracked();
        if let Some(active) = active.filter(|n| n.subject_id == subject_id) {
            if !removed.contains(&active.id) {
                removed.push(active.id);
            }
            self.active_note.set(None);
        }
        removed
    }
}
