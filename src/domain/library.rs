//! Library Entities
//!
//! Folders are ordered among themselves in a single scope; notes are ordered
//! within the folder that holds them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::entity::Entity;
use super::positioned::{Positioned, Relocatable};

/// The folder every library starts with; it cannot be deleted
pub const DEFAULT_FOLDER_ID: &str = "default";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Folder {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub order: i32,
}

impl Folder {
    pub fn new(id: impl Into<String>, name: impl Into<String>, order: i32) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: name.into(),
            created_at: now,
            updated_at: now,
            order,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: String,
    pub folder_id: String,
    pub title: String,
    #[serde(default)]
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub order: i32,
}

impl Note {
    pub fn new(id: impl Into<String>, folder_id: impl Into<String>, title: impl Into<String>, order: i32) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            folder_id: folder_id.into(),
            title: title.into(),
            content: String::new(),
            created_at: now,
            updated_at: now,
            order,
        }
    }
}

/// Partial edit of a note
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotePatch {
    pub title: Option<String>,
    pub content: Option<String>,
    pub folder_id: Option<String>,
}

/// Everything the library persists, saved and loaded as one unit
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LibrarySnapshot {
    #[serde(default)]
    pub folders: Vec<Folder>,
    #[serde(default)]
    pub notes: Vec<Note>,
}

impl LibrarySnapshot {
    pub fn folder(&self, id: &str) -> Option<&Folder> {
        self.folders.iter().find(|f| f.id == id)
    }

    pub fn note(&self, id: &str) -> Option<&Note> {
        self.notes.iter().find(|n| n.id == id)
    }
}

/// First-run library: one default folder with a welcome note
pub fn default_snapshot() -> LibrarySnapshot {
    let mut welcome = Note::new("welcome", DEFAULT_FOLDER_ID, "Welcome!", 0);
    welcome.content = "Create folders to separate subjects and use notes to record the important points.".to_string();
    LibrarySnapshot {
        folders: vec![Folder::new(DEFAULT_FOLDER_ID, "General", 0)],
        notes: vec![welcome],
    }
}

impl Entity for Folder {
    type Id = String;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Folders share one scope, so their container key is `()`
impl Positioned for Folder {
    type Container = ();

    fn container(&self) -> &() {
        &()
    }

    fn order(&self) -> i32 {
        self.order
    }

    fn set_order(&mut self, order: i32) {
        self.order = order;
    }
}

impl Relocatable for Folder {
    fn relocate(&mut self, _to: (), now: DateTime<Utc>) {
        self.updated_at = now;
    }
}

impl Entity for Note {
    type Id = String;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl Positioned for Note {
    type Container = String;

    fn container(&self) -> &String {
        &self.folder_id
    }

    fn order(&self) -> i32 {
        self.order
    }

    fn set_order(&mut self, order: i32) {
        self.order = order;
    }
}

impl Relocatable for Note {
    fn relocate(&mut self, to: String, now: DateTime<Utc>) {
        self.folder_id = to;
        self.updated_at = now;
    }
}
