use super::{StorageBackend, StorageError, StorageResult};
use crate::config::EditorConfig;
use crate::models::{Note, Subject, EMPTY_CONTENT_JSON};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// Keyed string storage holding the whole workspace blob.
pub trait BlobStore: Clone + 'static {
    fn read(&self, key: &str) -> StorageResult<Option<String>>;
    fn write(&self, key: &str, value: &str) -> StorageResult<()>;
}

/// `window.localStorage`, looked up on every access.
#[derive(Clone, Copy, Debug, Default)]
pub struct BrowserStorage;

impl BrowserStorage {
    fn storage() -> StorageResult<web_sys::Storage> {
        web_sys::window()
            .and_then(|w| w.local_storage().ok().flatten())
            .ok_or_else(|| StorageError::Unavailable("localStorage is not available".to_string()))
    }
}

impl BlobStore for BrowserStorage {
    fn read(&self, key: &str) -> StorageResult<Option<String>> {
        Self::storage()?
            .get_item(key)
            .map_err(|_| StorageError::Unavailable(format!("could not read {key}")))
    }

    fn write(&self, key: &str, value: &str) -> StorageResult<()> {
        Self::storage()?
            .set_item(key, value)
            .map_err(|_| StorageError::Unavailable(format!("could not write {key}")))
    }
}

/// In-memory blob store. Clones share the same map.
#[derive(Clone, Debug, Default)]
pub struct MemoryStorage {
    items: Arc<Mutex<HashMap<String, String>>>,
}

impl BlobStore for MemoryStorage {
    fn read(&self, key: &str) -> StorageResult<Option<String>> {
        let items = self
            .items
            .lock()
            .map_err(|_| StorageError::Unavailable("memory storage poisoned".to_string()))?;
        Ok(items.get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> StorageResult<()> {
        let mut items = self
            .items
            .lock()
            .map_err(|_| StorageError::Unavailable("memory storage poisoned".to_string()))?;
        items.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Persisted shape of the local workspace.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct LocalDb {
    #[serde(default)]
    pub subjects: Vec<Subject>,
    #[serde(default)]
    pub notes: Vec<Note>,
}

impl LocalDb {
    /// Current time, nudged past every stored timestamp so "most recently edited" stays
    /// strictly ordered even when two writes land within one clock tick.
    fn stamp(&self) -> DateTime<Utc> {
        let now = Utc::now();
        let latest = self
            .subjects
            .iter()
            .map(|s| s.updated_at)
            .chain(self.notes.iter().map(|n| n.updated_at))
            .max();
        match latest {
            Some(latest) if latest >= now => latest + TimeDelta::microseconds(1),
            _ => now,
        }
    }
}

fn newest_first(notes: &mut [Note]) {
    notes.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
}

/// Backend that keeps everything in one JSON blob, read in full and rewritten on every mutation.
#[derive(Clone, Debug)]
pub struct LocalBackend<S: BlobStore> {
    store: S,
    key: String,
    search_limit: usize,
}

impl<S: BlobStore> LocalBackend<S> {
    pub fn new(store: S, key: impl Into<String>, search_limit: usize) -> Self {
        Self {
            store,
            key: key.into(),
            search_limit,
        }
    }

    pub fn from_config(store: S, config: &EditorConfig) -> Self {
        Self::new(store, config.storage_key.clone(), config.search_limit)
    }

    /// A missing or corrupt blob is an empty workspace.
    pub fn load(&self) -> StorageResult<LocalDb> {
        let Some(raw) = self.store.read(&self.key)? else {
            return Ok(LocalDb::default());
        };
        match serde_json::from_str(&raw) {
            Ok(db) => Ok(db),
            Err(e) => {
                let err = StorageError::InvalidLocalState(e.to_string());
                warn!(key = %self.key, error = %err, "discarding unreadable local workspace");
                Ok(LocalDb::default())
            }
        }
    }

    fn save(&self, db: &LocalDb) -> StorageResult<()> {
        let raw = serde_json::to_string(db)?;
        self.store.write(&self.key, &raw)
    }
}

impl<S: BlobStore> StorageBackend for LocalBackend<S> {
    async fn list_subjects(&self) -> StorageResult<Vec<Subject>> {
        let mut subjects = self.load()?.subjects;
        subjects.sort_by_key(|s| s.name.to_lowercase());
        Ok(subjects)
    }

    async fn create_subject(&self, name: &str, color_hex: &str) -> StorageResult<Subject> {
        let mut db = self.load()?;
        let now = db.stamp();
        let subject = Subject {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            color_hex: color_hex.to_string(),
            created_at: now,
            updated_at: now,
        };
        db.subjects.push(subject.clone());
        self.save(&db)?;
        Ok(subject)
    }

    async fn update_subject(
        &self,
        id: &str,
        name: &str,
        color_hex: &str,
    ) -> StorageResult<Subject> {
        let mut db = self.load()?;
        let now = db.stamp();
        let subject = db
            .subjects
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| StorageError::subject_not_found(id))?;
        subject.name = name.to_string();
        subject.color_hex = color_hex.to_string();
        subject.updated_at = now;
        let updated = subject.clone();
        self.save(&db)?;
        Ok(updated)
    }

    async fn delete_subject(&self, id: &str) -> StorageResult<()> {
        let mut db = self.load()?;
        if !db.subjects.iter().any(|s| s.id == id) {
            return Err(StorageError::subject_not_found(id));
        }
        db.subjects.retain(|s| s.id != id);
        let before = db.notes.len();
        db.notes.retain(|n| n.subject_id != id);
        debug!(subject_id = %id, removed_notes = before - db.notes.len(), "subject deleted");
        self.save(&db)
    }

    async fn list_notes_by_subject(&self, subject_id: &str) -> StorageResult<Vec<Note>> {
        let mut notes: Vec<Note> = self
            .load()?
            .notes
            .into_iter()
            .filter(|n| n.subject_id == subject_id)
            .collect();
        newest_first(&mut notes);
        Ok(notes)
    }

    async fn list_all_notes(&self) -> StorageResult<Vec<Note>> {
        let mut notes = self.load()?.notes;
        newest_first(&mut notes);
        Ok(notes)
    }

    async fn get_note(&self, id: &str) -> StorageResult<Note> {
        self.load()?
            .notes
            .into_iter()
            .find(|n| n.id == id)
            .ok_or_else(|| StorageError::note_not_found(id))
    }

    async fn create_note(&self, subject_id: &str, title: &str) -> StorageResult<Note> {
        let mut db = self.load()?;
        if !db.subjects.iter().any(|s| s.id == subject_id) {
            return Err(StorageError::subject_not_found(subject_id));
        }
        let now = db.stamp();
        let note = Note {
            id: uuid::Uuid::new_v4().to_string(),
            subject_id: subject_id.to_string(),
            title: title.to_string(),
            content_json: EMPTY_CONTENT_JSON.to_string(),
            plain_text: String::new(),
            created_at: now,
            updated_at: now,
        };
        db.notes.push(note.clone());
        self.save(&db)?;
        Ok(note)
    }

    async fn update_note(
        &self,
        id: &str,
        title: &str,
        content_json: &str,
        plain_text: &str,
    ) -> StorageResult<Note> {
        let mut db = self.load()?;
        let now = db.stamp();
        let note = db
            .notes
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or_else(|| StorageError::note_not_found(id))?;
        note.title = title.to_string();
        note.content_json = content_json.to_string();
        note.plain_text = plain_text.to_string();
        note.updated_at = now;
        let updated = note.clone();
        self.save(&db)?;
        Ok(updated)
    }

    async fn delete_note(&self, id: &str) -> StorageResult<()> {
        let mut db = self.load()?;
        db.notes.retain(|n| n.id != id);
        self.save(&db)
    }

    async fn search_notes(&self, query: &str) -> StorageResult<Vec<Note>> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(Vec::new());
        }
        let mut hits: Vec<Note> = self
            .load()?
            .notes
            .into_iter()
            .filter(|n| {
                n.title.to_lowercase().contains(&needle)
                    || n.plain_text.to_lowercase().contains(&needle)
            })
            .collect();
        newest_first(&mut hits);
        hits.truncate(self.search_limit);
        Ok(hits)
    }
}
