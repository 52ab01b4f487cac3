use super::log_failure;
use crate::models::{subject_color, Subject};
use crate::storage::{StorageBackend, StorageError, StorageResult};
use leptos::prelude::*;
use tracing::debug;

fn sorted(mut subjects: Vec<Subject>) -> Vec<Subject> {
    subjects.sort_by_key(|s| s.name.to_lowercase());
    subjects
}

/// Cached subjects, kept sorted by name (case-insensitive).
#[derive(Clone)]
pub struct SubjectStore<B: StorageBackend> {
    backend: B,
    pub subjects: RwSignal<Vec<Subject>>,
    pub loading: RwSignal<bool>,
    pub last_error: RwSignal<Option<StorageError>>,
    request_id: RwSignal<u64>,
}

impl<B: StorageBackend> SubjectStore<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            subjects: RwSignal::new(vec![]),
            loading: RwSignal::new(false),
            last_error: RwSignal::new(None),
            request_id: RwSignal::new(0),
        }
    }

    fn fail<T>(&self, op: &'static str, e: StorageError) -> StorageResult<T> {
        log_failure(op, &e);
        self.last_error.set(Some(e.clone()));
        Err(e)
    }

    /// Palette colour for the next subject the user creates.
    pub fn next_color(&self) -> &'static str {
        subject_color(self.subjects.with_untracked(Vec::len))
    }

    pub async fn fetch_subjects(&self) -> StorageResult<()> {
        self.request_id.update(|id| *id += 1);
        let request_id = self.request_id.get_untracked();
        self.loading.set(true);

        let result = self.backend.list_subjects().await;

        if self.request_id.get_untracked() != request_id {
            debug!(request_id, "dropping stale subject list");
            return Ok(());
        }
        self.loading.set(false);
        match result {
            Ok(subjects) => {
                self.subjects.set(sorted(subjects));
                self.last_error.set(None);
                Ok(())
            }
            Err(e) => self.fail("fetch_subjects", e),
        }
    }

    pub async fn create_subject(&self, name: &str, color_hex: &str) -> StorageResult<Subject> {
        match self.backend.create_subject(name, color_hex).await {
            Ok(subject) => {
                let created = subject.clone();
                self.subjects.update(|subjects| {
                    let mut next = subjects.clone();
                    next.push(created);
                    *subjects = sorted(next);
                });
                Ok(subject)
            }
            Err(e) => self.fail("create_subject", e),
        }
    }

    pub async fn update_subject(
        &self,
        id: &str,
        name: &str,
        color_hex: &str,
    ) -> StorageResult<Subject> {
        match self.backend.update_subject(id, name, color_hex).await {
            Ok(subject) => {
                let updated = subject.clone();
                self.subjects.update(|subjects| {
                    let next = subjects
                        .iter()
                        .map(|s| if s.id == updated.id { updated.clone() } else { s.clone() })
                        .collect();
                    *subjects = sorted(next);
                });
                Ok(subject)
            }
            Err(e) => self.fail("update_subject", e),
        }
    }

    /// Removes the subject from the cache only. Callers drop its notes from the note cache.
    pub async fn delete_subject(&self, id: &str) -> StorageResult<()> {
        match self.backend.delete_subject(id).await {
            Ok(()) => {
                self.subjects
                    .update(|subjects| *subjects = subjects.iter().filter(|s| s.id != id).cloned().collect());
                Ok(())
            }
            Err(e) => self.fail("delete_subject", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::testing::RecordingBackend;
    use futures::executor::block_on;

    fn names(store: &SubjectStore<RecordingBackend>) -> Vec<String> {
        store
            .subjects
            .get_untracked()
            .into_iter()
            .map(|s| s.name)
            .collect()
    }

    #[test]
    fn test_cache_stays_sorted_through_create_and_rename() {
        let store = SubjectStore::new(RecordingBackend::new());
        block_on(async {
            store.create_subject("physics", "#3b82f6").await.unwrap();
            let b = store.create_subject("Biology", "#10b981").await.unwrap();
            assert_eq!(names(&store), vec!["Biology", "physics"]);

            store.update_subject(&b.id, "zoology", "#10b981").await.unwrap();
            assert_eq!(names(&store), vec!["physics", "zoology"]);
        });
    }

    #[test]
    fn test_failed_fetch_keeps_previous_cache() {
        let backend = RecordingBackend::new();
        let store = SubjectStore::new(backend.clone());
        block_on(async {
            store.create_subject("Math", "#6366f1").await.unwrap();
            backend.fail_next(StorageError::Unavailable("offline".into()));

            assert!(store.fetch_subjects().await.is_err());
            assert_eq!(names(&store), vec!["Math"]);
            assert!(!store.loading.get_untracked());
            assert!(store.last_error.get_untracked().is_some());

            store.fetch_subjects().await.unwrap();
            assert!(store.last_error.get_untracked().is_none());
        });
    }

    #[test]
    fn test_next_color_walks_the_palette() {
        let store = SubjectStore::new(RecordingBackend::new());
        assert_eq!(store.next_color(), "#6366f1");
        block_on(store.create_subject("A", "#6366f1")).unwrap();
        assert_eq!(store.next_color(), "#3b82f6");
    }
}
