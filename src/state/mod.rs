mod notes;
pub(crate) mod note_sync;
mod subjects;

pub use note_sync::{EditorSurface, NoteSession, Reconciled};
pub use notes::NoteStore;
pub use subjects::SubjectStore;

use crate::config::EditorConfig;
use crate::models::Note;
use crate::storage::{Backend, ErrorKind, StorageBackend, StorageError, StorageResult};
use leptos::prelude::*;
use tracing::{error, warn};

/// Log a failure caught at a store boundary.
pub(crate) fn log_failure(op: &'static str, e: &StorageError) {
    match e.kind() {
        ErrorKind::NotFound => warn!(op, error = %e, "storage call failed"),
        _ => error!(op, error = %e, "storage call failed"),
    }
}

/// Which subject and note the user is looking at.
#[derive(Clone, Copy)]
pub struct Selection {
    pub active_subject_id: RwSignal<Option<String>>,
    pub active_note_id: RwSignal<Option<String>>,
}

impl Selection {
    pub fn new() -> Self {
        Self {
            active_subject_id: RwSignal::new(None),
            active_note_id: RwSignal::new(None),
        }
    }

    /// Switching subject closes the open note.
    pub fn select_subject(&self, id: Option<String>) {
        self.active_subject_id.set(id);
        self.active_note_id.set(None);
    }

    /// No-op when `id` is already selected, so effects keyed on the selection do not re-fire.
    pub fn select_note(&self, id: Option<String>) {
        if self.active_note_id.get_untracked() != id {
            self.active_note_id.set(id);
        }
    }

    pub fn forget_subject(&self, id: &str) {
        if self.active_subject_id.get_untracked().as_deref() == Some(id) {
            self.select_subject(None);
        }
    }

    pub fn forget_note(&self, id: &str) {
        if self.active_note_id.get_untracked().as_deref() == Some(id) {
            self.active_note_id.set(None);
        }
    }
}

impl Default for Selection {
    fn default() -> Self {
        Self::new()
    }
}

/// Global UI toggles. The keyboard layer flips these; nothing here listens for keys.
#[derive(Clone, Copy)]
pub struct UiFlags {
    pub sidebar_open: RwSignal<bool>,
    pub command_palette_open: RwSignal<bool>,
}

impl UiFlags {
    pub fn new() -> Self {
        Self {
            sidebar_open: RwSignal::new(true),
            command_palette_open: RwSignal::new(false),
        }
    }

    pub fn toggle_sidebar(&self) {
        self.sidebar_open.update(|open| *open = !*open);
    }

    pub fn set_command_palette_open(&self, open: bool) {
        self.command_palette_open.set(open);
    }

    pub fn toggle_command_palette(&self) {
        self.command_palette_open.update(|open| *open = !*open);
    }
}

impl Default for UiFlags {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone)]
pub struct AppState<B: StorageBackend = Backend> {
    pub config: EditorConfig,
    pub subjects: SubjectStore<B>,
    pub notes: NoteStore<B>,
    pub selection: Selection,
    pub ui: UiFlags,
}

impl<B: StorageBackend> AppState<B> {
    pub fn new(backend: B, config: EditorConfig) -> Self {
        Self {
            subjects: SubjectStore::new(backend.clone()),
            notes: NoteStore::new(backend),
            selection: Selection::new(),
            ui: UiFlags::new(),
            config,
        }
    }

    /// Delete a subject and drop its notes from the cache and the selection.
    pub async fn delete_subject(&self, id: &str) -> StorageResult<()> {
        self.subjects.delete_subject(id).await?;
        for note_id in self.notes.purge_subject(id) {
            self.selection.forget_note(&note_id);
        }
        self.selection.forget_subject(id);
        Ok(())
    }

    pub async fn delete_note(&self, id: &str) -> StorageResult<()> {
        self.notes.delete_note(id).await?;
        self.selection.forget_note(id);
        Ok(())
    }

    /// Create an untitled note in `subject_id` and open it.
    pub async fn create_note(&self, subject_id: &str) -> StorageResult<Note> {
        let note = self.notes.create_note(subject_id, None).await?;
        self.selection.select_note(Some(note.id.clone()));
        Ok(note)
    }

    /// The note the editor should show: the selected note, once it is loaded. Tracked.
    pub fn editor_note_id(&self) -> Option<String> {
        let selected = self.selection.active_note_id.get()?;
        self.notes
            .active_note
            .with(|n| n.as_ref().filter(|n| n.id == selected).map(|n| n.id.clone()))
    }

    /// Load a note into the active slot. A note that no longer exists is deselected.
    pub async fn open_note(&self, id: &str) -> StorageResult<Note> {
        self.selection.select_note(Some(id.to_string()));
        match self.notes.fetch_note(id).await {
            Ok(note) => Ok(note),
            Err(e) => {
                if e.is_not_found() {
                    self.selection.forget_note(id);
                    self.notes.set_active_note(None);
                }
                Err(e)
            }
        }
    }
}

#[derive(Clone)]
pub struct AppContext(pub AppState);
