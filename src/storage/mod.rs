//! Persistence contract shared by the desktop host and the browser fallback.
//!
//! Callers only ever see [`StorageBackend`]; which implementation sits behind it is decided once
//! by [`Backend::select`] and never changes for the rest of the session.

mod command;
mod local;

pub use command::CommandBackend;
pub use local::{BlobStore, BrowserStorage, LocalBackend, LocalDb, MemoryStorage};

use crate::config::EditorConfig;
use crate::models::{Note, Subject};
use thiserror::Error;
use tracing::info;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Unavailable,
    InvalidLocalState,
    UnknownCommand,
}

#[derive(Clone, Debug, Error, PartialEq)]
pub enum StorageError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("invalid local state: {0}")]
    InvalidLocalState(String),

    #[error("unknown backend command: {0}")]
    UnknownCommand(String),

    #[error("serialization failed: {0}")]
    Serialization(String),
}

impl StorageError {
    pub(crate) fn note_not_found(id: &str) -> Self {
        StorageError::NotFound {
            entity: "note",
            id: id.to_string(),
        }
    }

    pub(crate) fn subject_not_found(id: &str) -> Self {
        StorageError::NotFound {
            entity: "subject",
            id: id.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            StorageError::NotFound { .. } => ErrorKind::NotFound,
            StorageError::Unavailable(_) | StorageError::Serialization(_) => ErrorKind::Unavailable,
            StorageError::InvalidLocalState(_) => ErrorKind::InvalidLocalState,
            StorageError::UnknownCommand(_) => ErrorKind::UnknownCommand,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        StorageError::Serialization(e.to_string())
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

/// CRUD and search over subjects and notes.
///
/// - `list_subjects` is ordered by name, case-insensitively.
/// - Note lists and search hits are ordered by `updated_at`, newest first.
/// - `search_notes` matches title or plain text as a case-insensitive substring; a blank
///   query matches nothing.
/// - `delete_subject` also deletes the subject's notes.
#[allow(async_fn_in_trait)]
pub trait StorageBackend: Clone + 'static {
    async fn list_subjects(&self) -> StorageResult<Vec<Subject>>;
    async fn create_subject(&self, name: &str, color_hex: &str) -> StorageResult<Subject>;
    async fn update_subject(&self, id: &str, name: &str, color_hex: &str)
        -> StorageResult<Subject>;
    async fn delete_subject(&self, id: &str) -> StorageResult<()>;
    async fn list_notes_by_subject(&self, subject_id: &str) -> StorageResult<Vec<Note>>;
    async fn list_all_notes(&self) -> StorageResult<Vec<Note>>;
    async fn get_note(&self, id: &str) -> StorageResult<Note>;
    async fn create_note(&self, subject_id: &str, title: &str) -> StorageResult<Note>;
    async fn update_note(
        &self,
        id: &str,
        title: &str,
        content_json: &str,
        plain_text: &str,
    ) -> StorageResult<Note>;
    async fn delete_note(&self, id: &str) -> StorageResult<()>;
    async fn search_notes(&self, query: &str) -> StorageResult<Vec<Note>>;
}

#[derive(Clone, Debug)]
pub enum Backend {
    Command(CommandBackend),
    Local(LocalBackend<BrowserStorage>),
}

impl Backend {
    /// Use the desktop host when its command bridge is present, otherwise `localStorage`.
    pub fn select(config: &EditorConfig) -> Self {
        match CommandBackend::detect() {
            Some(host) => {
                info!("using desktop command backend");
                Backend::Command(host)
            }
            None => {
                info!(key = %config.storage_key, "desktop host not detected, using local storage");
                Backend::Local(LocalBackend::from_config(BrowserStorage, config))
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Backend::Command(_) => "command",
            Backend::Local(_) => "local",
        }
    }
}

macro_rules! dispatch {
    ($self:ident, $b:ident => $call:expr) => {
        match $self {
            Backend::Command($b) => $call.await,
            Backend::Local($b) => $call.await,
        }
    };
}

impl StorageBackend for Backend {
    async fn list_subjects(&self) -> StorageResult<Vec<Subject>> {
        dispatch!(self, b => b.list_subjects())
    }

    async fn create_subject(&self, name: &str, color_hex: &str) -> StorageResult<Subject> {
        dispatch!(self, b => b.create_subject(name, color_hex))
    }

    async fn update_subject(
        &self,
        id: &str,
        name: &str,
        color_hex: &str,
    ) -> StorageResult<Subject> {
        dispatch!(self, b => b.update_subject(id, name, color_hex))
    }

    async fn delete_subject(&self, id: &str) -> StorageResult<()> {
        dispatch!(self, b => b.delete_subject(id))
    }

    async fn list_notes_by_subject(&self, subject_id: &str) -> StorageResult<Vec<Note>> {
        dispatch!(self, b => b.list_notes_by_subject(subject_id))
    }

    async fn list_all_notes(&self) -> StorageResult<Vec<Note>> {
        dispatch!(self, b => b.list_all_notes())
    }

    async fn get_note(&self, id: &str) -> StorageResult<Note> {
        dispatch!(self, b => b.get_note(id))
    }

    async fn create_note(&self, subject_id: &str, title: &str) -> StorageResult<Note> {
        dispatch!(self, b => b.create_note(subject_id, title))
    }

    async fn update_note(
        &self,
        id: &str,
        title: &str,
        content_json: &str,
        plain_text: &str,
    ) -> StorageResult<Note> {
        dispatch!(self, b => b.update_note(id, title, content_json, plain_text))
    }

    async fn delete_note(&self, id: &str) -> StorageResult<()> {
        dispatch!(self, b => b.delete_note(id))
    }

    async fn search_notes(&self, query: &str) -> StorageResult<Vec<Note>> {
        dispatch!(self, b => b.search_notes(query))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use futures::channel::oneshot;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    /// Local backend over memory that records every `update_note` call and can be told to fail.
    #[derive(Clone)]
    pub(crate) struct RecordingBackend {
        pub inner: LocalBackend<MemoryStorage>,
        pub updates: Rc<RefCell<Vec<(String, String, String, String)>>>,
        pub fail_with: Rc<RefCell<Option<StorageError>>>,
        pub holds: Rc<RefCell<VecDeque<oneshot::Receiver<()>>>>,
    }

    impl RecordingBackend {
        pub(crate) fn new() -> Self {
            Self {
                inner: LocalBackend::new(MemoryStorage::default(), "test_db", 20),
                updates: Rc::new(RefCell::new(Vec::new())),
                fail_with: Rc::new(RefCell::new(None)),
                holds: Rc::new(RefCell::new(VecDeque::new())),
            }
        }

        /// Hold the next `update_note` response until the returned sender fires.
        pub(crate) fn hold_next(&self) -> oneshot::Sender<()> {
            let (release, gate) = oneshot::channel();
            self.holds.borrow_mut().push_back(gate);
            release
        }

        pub(crate) fn fail_next(&self, err: StorageError) {
            *self.fail_with.borrow_mut() = Some(err);
        }

        fn check(&self) -> StorageResult<()> {
            match self.fail_with.borrow_mut().take() {
                Some(e) => Err(e),
                None => Ok(()),
            }
        }
    }

    impl StorageBackend for RecordingBackend {
        async fn list_subjects(&self) -> StorageResult<Vec<Subject>> {
            self.check()?;
            self.inner.list_subjects().await
        }

        async fn create_subject(&self, name: &str, color_hex: &str) -> StorageResult<Subject> {
            self.check()?;
            self.inner.create_subject(name, color_hex).await
        }

        async fn update_subject(
            &self,
            id: &str,
            name: &str,
            color_hex: &str,
        ) -> StorageResult<Subject> {
            self.check()?;
            self.inner.update_subject(id, name, color_hex).await
        }

        async fn delete_subject(&self, id: &str) -> StorageResult<()> {
            self.check()?;
            self.inner.delete_subject(id).await
        }

        async fn list_notes_by_subject(&self, subject_id: &str) -> StorageResult<Vec<Note>> {
            self.check()?;
            self.inner.list_notes_by_subject(subject_id).await
        }

        async fn list_all_notes(&self) -> StorageResult<Vec<Note>> {
            self.check()?;
            self.inner.list_all_notes().await
        }

        async fn get_note(&self, id: &str) -> StorageResult<Note> {
            self.check()?;
            self.inner.get_note(id).await
        }

        async fn create_note(&self, subject_id: &str, title: &str) -> StorageResult<Note> {
            self.check()?;
            self.inner.create_note(subject_id, title).await
        }

        async fn update_note(
            &self,
            id: &str,
            title: &str,
            content_json: &str,
            plain_text: &str,
        ) -> StorageResult<Note> {
            self.updates.borrow_mut().push((
                id.to_string(),
                title.to_string(),
                content_json.to_string(),
                plain_text.to_string(),
            ));
            let outcome = self.check();
            let hold = self.holds.borrow_mut().pop_front();
            if let Some(hold) = hold {
                let _ = hold.await;
            }
            outcome?;
            self.inner
                .update_note(id, title, content_json, plain_text)
                .await
        }

        async fn delete_note(&self, id: &str) -> StorageResult<()> {
            self.check()?;
            self.inner.delete_note(id).await
        }

        async fn search_notes(&self, query: &str) -> StorageResult<Vec<Note>> {
            self.check()?;
            self.inner.search_notes(query).await
        }
    }
}
