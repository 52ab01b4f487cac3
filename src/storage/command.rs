use super::{StorageBackend, StorageError, StorageResult};
use crate::models::{Note, Subject};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;

const HOST_GLOBAL: &str = "__TAURI_INTERNALS__";

// The host deserializes command arguments from camelCase keys.

#[derive(Serialize)]
struct NoArgs {}

#[derive(Serialize)]
struct IdArgs<'a> {
    id: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SubjectArgs<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<&'a str>,
    name: &'a str,
    color_hex: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SubjectIdArgs<'a> {
    subject_id: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateNoteArgs<'a> {
    subject_id: &'a str,
    title: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateNoteArgs<'a> {
    id: &'a str,
    title: &'a str,
    content_json: &'a str,
    plain_text: &'a str,
}

#[derive(Serialize)]
struct QueryArgs<'a> {
    query: &'a str,
}

fn entity_of(command: &str) -> &'static str {
    if command.contains("subject") {
        "subject"
    } else {
        "note"
    }
}

/// Map a host rejection message onto the error taxonomy. `target` is the id the call was about.
fn classify_rejection(command: &str, target: &str, message: &str) -> StorageError {
    let lower = message.to_lowercase();
    if lower.contains("command") && lower.contains("not found") {
        StorageError::UnknownCommand(command.to_string())
    } else if lower.contains("foreign key") {
        // Only note rows reference another table, and only through their subject.
        StorageError::subject_not_found(target)
    } else if lower.contains("not found") || lower.contains("no rows") {
        StorageError::NotFound {
            entity: entity_of(command),
            id: target.to_string(),
        }
    } else {
        StorageError::Unavailable(format!("{command}: {message}"))
    }
}

/// The host deletes and inserts against missing subjects without complaint.
fn require_subject(subjects: &[Subject], id: &str) -> StorageResult<()> {
    if subjects.iter().any(|s| s.id == id) {
        Ok(())
    } else {
        Err(StorageError::subject_not_found(id))
    }
}

fn js_error_message(e: &JsValue) -> String {
    if let Some(s) = e.as_string() {
        return s;
    }
    if let Some(err) = e.dyn_ref::<js_sys::Error>() {
        return String::from(err.message());
    }
    format!("{e:?}")
}

/// Desktop host reached through its injected `invoke` bridge.
#[derive(Clone, Copy, Debug, Default)]
pub struct CommandBackend;

impl CommandBackend {
    fn host() -> Option<JsValue> {
        let win = web_sys::window()?;
        js_sys::Reflect::get(&win, &HOST_GLOBAL.into())
            .ok()
            .filter(|v| !v.is_undefined() && !v.is_null())
    }

    /// `Some` when running inside the desktop shell.
    pub fn detect() -> Option<Self> {
        Self::host().map(|_| Self)
    }

    async fn invoke<A, T>(&self, command: &str, target: &str, args: &A) -> StorageResult<T>
    where
        A: Serialize,
        T: DeserializeOwned,
    {
        let host = Self::host()
            .ok_or_else(|| StorageError::Unavailable("desktop host went away".to_string()))?;
        let invoke: js_sys::Function = js_sys::Reflect::get(&host, &"invoke".into())
            .ok()
            .and_then(|f| f.dyn_into().ok())
            .ok_or_else(|| StorageError::Unavailable("host has no invoke bridge".to_string()))?;

        let args = js_sys::JSON::parse(&serde_json::to_string(args)?)
            .map_err(|e| StorageError::Serialization(js_error_message(&e)))?;

        debug!(command, "invoking host command");
        let promise: js_sys::Promise = invoke
            .call2(&host, &JsValue::from_str(command), &args)
            .map_err(|e| classify_rejection(command, target, &js_error_message(&e)))?
            .dyn_into()
            .map_err(|_| StorageError::Unavailable(format!("{command}: host returned no promise")))?;

        let value = JsFuture::from(promise)
            .await
            .map_err(|e| classify_rejection(command, target, &js_error_message(&e)))?;

        // Commands without a result resolve to `undefined`.
        let json = if value.is_undefined() {
            "null".to_string()
        } else {
            js_sys::JSON::stringify(&value)
                .map(String::from)
                .map_err(|e| StorageError::Serialization(js_error_message(&e)))?
        };
        Ok(serde_json::from_str(&json)?)
    }
}

impl StorageBackend for CommandBackend {
    async fn list_subjects(&self) -> StorageResult<Vec<Subject>> {
        self.invoke("get_subjects", "", &NoArgs {}).await
    }

    async fn create_subject(&self, name: &str, color_hex: &str) -> StorageResult<Subject> {
        let args = SubjectArgs {
            id: None,
            name,
            color_hex,
        };
        self.invoke("create_subject", "", &args).await
    }

    async fn update_subject(
        &self,
        id: &str,
        name: &str,
        color_hex: &str,
    ) -> StorageResult<Subject> {
        let args = SubjectArgs {
            id: Some(id),
            name,
            color_hex,
        };
        self.invoke("update_subject", id, &args).await
    }

    async fn delete_subject(&self, id: &str) -> StorageResult<()> {
        require_subject(&self.list_subjects().await?, id)?;
        self.invoke("delete_subject", id, &IdArgs { id }).await
    }

    async fn list_notes_by_subject(&self, subject_id: &str) -> StorageResult<Vec<Note>> {
        self.invoke("get_notes", subject_id, &SubjectIdArgs { subject_id })
            .await
    }

    async fn list_all_notes(&self) -> StorageResult<Vec<Note>> {
        self.invoke("get_all_notes", "", &NoArgs {}).await
    }

    async fn get_note(&self, id: &str) -> StorageResult<Note> {
        self.invoke("get_note", id, &IdArgs { id }).await
    }

    async fn create_note(&self, subject_id: &str, title: &str) -> StorageResult<Note> {
        require_subject(&self.list_subjects().await?, subject_id)?;
        let args = CreateNoteArgs { subject_id, title };
        self.invoke("create_note", subject_id, &args).await
    }

    async fn update_note(
        &self,
        id: &str,
        title: &str,
        content_json: &str,
        plain_text: &str,
    ) -> StorageResult<Note> {
        let args = UpdateNoteArgs {
            id,
            title,
            content_json,
            plain_text,
        };
        self.invoke("update_note", id, &args).await
    }

    async fn delete_note(&self, id: &str) -> StorageResult<()> {
        self.invoke("delete_note", id, &IdArgs { id }).await
    }

    async fn search_notes(&self, query: &str) -> StorageResult<Vec<Note>> {
        // The host would match everything for a blank pattern.
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        self.invoke("search_notes", "", &QueryArgs { query }).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_note_args_use_camel_case() {
        let v = serde_json::to_value(UpdateNoteArgs {
            id: "n1",
            title: "T",
            content_json: "{}",
            plain_text: "",
        })
        .expect("should serialize");
        assert_eq!(v["contentJson"], "{}");
        assert_eq!(v["plainText"], "");
        assert!(v.get("content_json").is_none());
    }

    #[test]
    fn test_subject_args_omit_missing_id() {
        let create = serde_json::to_value(SubjectArgs {
            id: None,
            name: "Math",
            color_hex: "#6366f1",
        })
        .expect("should serialize");
        assert!(create.get("id").is_none());
        assert_eq!(create["colorHex"], "#6366f1");

        let args = serde_json::to_value(SubjectIdArgs { subject_id: "s1" }).expect("should serialize");
        assert_eq!(args["subjectId"], "s1");
    }

    #[test]
    fn test_host_rejections_are_classified() {
        assert_eq!(
            classify_rejection("get_note", "n1", "Query returned no rows"),
            StorageError::NotFound {
                entity: "note",
                id: "n1".to_string()
            }
        );
        assert_eq!(
            classify_rejection("update_subject", "s1", "Subject not found"),
            StorageError::NotFound {
                entity: "subject",
                id: "s1".to_string()
            }
        );
        assert_eq!(
            classify_rejection("archive_note", "", "command archive_note not found"),
            StorageError::UnknownCommand("archive_note".to_string())
        );
        assert_eq!(
            classify_rejection("create_note", "s9", "FOREIGN KEY constraint failed"),
            StorageError::NotFound {
                entity: "subject",
                id: "s9".to_string()
            }
        );
        assert!(matches!(
            classify_rejection("get_subjects", "", "database is locked"),
            StorageError::Unavailable(_)
        ));
    }

    #[test]
    fn test_missing_subject_is_not_found() {
        let now = chrono::Utc::now();
        let subjects = vec![Subject {
            id: "s1".to_string(),
            name: "Math".to_string(),
            color_hex: "#6366f1".to_string(),
            created_at: now,
            updated_at: now,
        }];
        assert!(require_subject(&subjects, "s1").is_ok());
        assert_eq!(
            require_subject(&subjects, "gone"),
            Err(StorageError::NotFound {
                entity: "subject",
                id: "gone".to_string()
            })
        );
        assert!(require_subject(&[], "s1").unwrap_err().is_not_found());
    }
}
