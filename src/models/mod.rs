use crate::document::{Document, DocumentError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Content stored for a note that has never been edited.
pub const EMPTY_CONTENT_JSON: &str = "{}";

pub const DEFAULT_NOTE_TITLE: &str = "Untitled";

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Subject {
    pub id: String,
    pub name: String,
    pub color_hex: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Note {
    pub id: String,
    pub subject_id: String,
    pub title: String,

    /// Serialized [`Document`]. Opaque to storage.
    pub content_json: String,

    /// Flattened text of `content_json`, written in the same save.
    pub plain_text: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Note {
    pub fn document(&self) -> Result<Document, DocumentError> {
        Document::from_json(&self.content_json)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SubjectColor {
    pub name: &'static str,
    pub hex: &'static str,
}

pub const SUBJECT_COLORS: [SubjectColor; 10] = [
    SubjectColor { name: "Indigo", hex: "#6366f1" },
    SubjectColor { name: "Blue", hex: "#3b82f6" },
    SubjectColor { name: "Cyan", hex: "#06b6d4" },
    SubjectColor { name: "Emerald", hex: "#10b981" },
    SubjectColor { name: "Amber", hex: "#f59e0b" },
    SubjectColor { name: "Orange", hex: "#f97316" },
    SubjectColor { name: "Rose", hex: "#f43f5e" },
    SubjectColor { name: "Pink", hex: "#ec4899" },
    SubjectColor { name: "Purple", hex: "#a855f7" },
    SubjectColor { name: "Slate", hex: "#64748b" },
];

/// Palette colour for the `n`-th subject, cycling.
pub fn subject_color(n: usize) -> &'static str {
    SUBJECT_COLORS[n % SUBJECT_COLORS.len()].hex
}
