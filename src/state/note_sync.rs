use super::NoteStore;
use crate::config::EditorConfig;
use crate::document::Document;
use crate::models::Note;
use crate::scheduler::{Debouncer, Scheduler};
use crate::storage::{ErrorKind, StorageBackend};
use leptos::prelude::*;
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, error, warn};

/// The editing toolkit as seen by the save pipeline.
pub trait EditorSurface {
    fn document(&self) -> Document;

    /// Swap the whole document in. The toolkit resets the cursor when this runs.
    fn replace_content(&self, document: Document);
}

impl EditorSurface for RwSignal<Document> {
    fn document(&self) -> Document {
        self.get_untracked()
    }

    fn replace_content(&self, document: Document) {
        self.set(document);
    }
}

/// What [`NoteSession::reconcile_loaded`] did with a freshly loaded note.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reconciled {
    Replaced,
    Unchanged,
    PendingEdits,
    OtherNote,
    Invalid,
}

struct Draft {
    note_id: String,
    title: String,
    document: Document,
    dirty: bool,
    /// Bumped by every commit that sends a write.
    generation: u64,
}

/// Autosave for the one note open in the editor.
///
/// Title and content edits share one debounce timer; the commit reads the draft when it
/// fires, so it always writes the latest title together with the latest document and the
/// plain text derived from that same document.
#[derive(Clone)]
pub struct NoteSession<B: StorageBackend, S: Scheduler> {
    store: NoteStore<B>,
    debouncer: Debouncer<S>,
    draft: Rc<RefCell<Draft>>,
    autosave_ms: u32,
    flush_on_close: bool,
}

impl<B: StorageBackend, S: Scheduler> NoteSession<B, S> {
    pub fn open(store: NoteStore<B>, scheduler: S, note: &Note, config: &EditorConfig) -> Self {
        let document = note.document().unwrap_or_else(|e| {
            warn!(note_id = %note.id, error = %e, "stored content unreadable, starting empty");
            Document::default()
        });
        Self::open_with(store, scheduler, note, document, config)
    }

    /// Open with the document the editor actually shows, which may differ from the stored
    /// one (an empty note is shown as a blank paragraph).
    pub fn open_with(
        store: NoteStore<B>,
        scheduler: S,
        note: &Note,
        document: Document,
        config: &EditorConfig,
    ) -> Self {
        Self {
            store,
            debouncer: Debouncer::new(scheduler),
            draft: Rc::new(RefCell::new(Draft {
                note_id: note.id.clone(),
                title: note.title.clone(),
                document,
                dirty: false,
                generation: 0,
            })),
            autosave_ms: config.autosave_ms,
            flush_on_close: config.flush_on_close,
        }
    }

    pub fn note_id(&self) -> String {
        self.draft.borrow().note_id.clone()
    }

    pub fn title(&self) -> String {
        self.draft.borrow().title.clone()
    }

    pub fn document(&self) -> Document {
        self.draft.borrow().document.clone()
    }

    pub fn is_dirty(&self) -> bool {
        self.draft.borrow().dirty
    }

    pub fn has_pending_commit(&self) -> bool {
        self.debouncer.is_pending()
    }

    pub fn on_title_changed(&self, title: &str) {
        {
            let mut draft = self.draft.borrow_mut();
            draft.title = title.to_string();
            draft.dirty = true;
        }
        self.schedule_commit();
    }

    pub fn on_content_changed(&self, document: Document) {
        {
            let mut draft = self.draft.borrow_mut();
            draft.document = document;
            draft.dirty = true;
        }
        self.schedule_commit();
    }

    fn schedule_commit(&self) {
        let session = self.clone();
        self.debouncer
            .reschedule(self.autosave_ms, async move { session.commit().await });
    }

    /// Write the draft if it has unsaved changes.
    pub async fn commit(&self) {
        let (id, title, content_json, plain_text, generation) = {
            let mut draft = self.draft.borrow_mut();
            if !draft.dirty {
                return;
            }
            let content_json = match draft.document.to_json() {
                Ok(json) => json,
                Err(e) => {
                    error!(note_id = %draft.note_id, error = %e, "could not serialize note");
                    return;
                }
            };
            draft.dirty = false;
            draft.generation += 1;
            (
                draft.note_id.clone(),
                draft.title.clone(),
                content_json,
                draft.document.plain_text(),
                draft.generation,
            )
        };

        match self
            .store
            .update_note(&id, &title, &content_json, &plain_text)
            .await
        {
            Ok(_) => debug!(note_id = %id, "note saved"),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                // The note is gone; nothing left to retry.
            }
            Err(_) => {
                // A newer commit already carries everything this one did.
                let mut draft = self.draft.borrow_mut();
                if draft.generation == generation {
                    draft.dirty = true;
                }
            }
        }
    }

    /// Commit now instead of waiting for the timer.
    pub async fn flush(&self) {
        self.debouncer.cancel();
        self.commit().await;
    }

    /// Editor is going away. A pending commit is dropped unless `flush_on_close` is set, in
    /// which case it is handed to the scheduler to run right away.
    pub fn close(&self) {
        self.debouncer.cancel();
        if self.flush_on_close && self.is_dirty() {
            self.schedule_flush_now();
        }
    }

    fn schedule_flush_now(&self) {
        let session = self.clone();
        self.debouncer
            .reschedule(0, async move { session.commit().await });
    }

    /// Bring a (re)loaded copy of the note into the editor without disturbing the cursor
    /// when nothing actually changed.
    pub fn reconcile_loaded(&self, note: &Note, editor: &impl EditorSurface) -> Reconciled {
        let mut draft = self.draft.borrow_mut();
        if note.id != draft.note_id {
            return Reconciled::OtherNote;
        }
        if draft.dirty || self.debouncer.is_pending() {
            return Reconciled::PendingEdits;
        }

        draft.title = note.title.clone();
        let stored = match note.document() {
            Ok(doc) => doc,
            Err(e) => {
                warn!(note_id = %note.id, error = %e, "ignoring unreadable stored content");
                return Reconciled::Invalid;
            }
        };
        if stored.is_empty() || stored == editor.document() {
            return Reconciled::Unchanged;
        }

        draft.document = stored.clone();
        editor.replace_content(stored);
        Reconciled::Replaced
    }
}
