//! Free-form notes attached to a source or project.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::defaults;
use crate::events::EventKind;
use crate::ids;
use crate::timestamp;
use crate::traits::{Collection, CollectionItem, Document, DocumentKind};
use crate::version::default_schema_version;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(with = "timestamp", default = "timestamp::unknown")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "timestamp::option", default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Note {
    /// Replace the content and stamp `updated_at`.
    pub fn edit(&mut self, content: impl Into<String>) {
        self.content = content.into();
        self.updated_at = Some(timestamp::now());
    }
}

impl CollectionItem for Note {
    fn id(&self) -> &str {
        &self.id
    }

    fn tags(&self) -> &[String] {
        &self.tags
    }
}

/// Fields supplied when adding a note.
#[derive(Debug, Clone, Default)]
pub struct NewNote {
    pub content: String,
    pub page: Option<u32>,
    pub tags: Vec<String>,
}

impl NewNote {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }

    pub fn with_page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notes {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    #[serde(default)]
    pub notes: Vec<Note>,
}

impl Default for Notes {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            notes: Vec::new(),
        }
    }
}

impl Notes {
    pub fn get_by_page(&self, page: u32) -> Vec<&Note> {
        self.notes.iter().filter(|n| n.page == Some(page)).collect()
    }
}

impl Document for Notes {
    const KIND: DocumentKind = DocumentKind::Notes;

    fn schema_version(&self) -> &str {
        &self.schema_version
    }
}

impl Collection for Notes {
    type Item = Note;
    type NewItem = NewNote;

    const FILE_NAME: &'static str = defaults::NOTES_FILE;
    const ID_PREFIX: &'static str = ids::NOTE_PREFIX;

    const ADDED: EventKind = EventKind::NoteAdded;
    const UPDATED: EventKind = EventKind::NoteUpdated;
    const DELETED: EventKind = EventKind::NoteDeleted;

    fn items(&self) -> &[Note] {
        &self.notes
    }

    fn items_mut(&mut self) -> &mut Vec<Note> {
        &mut self.notes
    }

    fn build_item(id: String, new: NewNote) -> Note {
        Note {
            id,
            content: new.content,
            page: new.page,
            tags: new.tags,
            created_at: timestamp::now(),
            updated_at: None,
        }
    }
}
