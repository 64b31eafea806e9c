//! Core traits for folio abstractions.
//!
//! These traits define the shared contract of every persisted document and
//! collection, plus the seam to the text-generation service.

use std::fmt;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::events::EventKind;
use crate::ids;

// =============================================================================
// DOCUMENTS
// =============================================================================

/// The closed set of persisted document kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Project,
    SourceMeta,
    Notes,
    Quotes,
    Tasks,
    Summaries,
}

impl DocumentKind {
    pub const ALL: [DocumentKind; 6] = [
        DocumentKind::Project,
        DocumentKind::SourceMeta,
        DocumentKind::Notes,
        DocumentKind::Quotes,
        DocumentKind::Tasks,
        DocumentKind::Summaries,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Project => "project",
            DocumentKind::SourceMeta => "source_meta",
            DocumentKind::Notes => "notes",
            DocumentKind::Quotes => "quotes",
            DocumentKind::Tasks => "tasks",
            DocumentKind::Summaries => "summaries",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A schema-versioned document persisted as one JSON file.
pub trait Document: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Kind used to look up the document's schema.
    const KIND: DocumentKind;

    /// Version string the document was written with.
    fn schema_version(&self) -> &str;
}

// =============================================================================
// COLLECTIONS
// =============================================================================

/// An item stored inside a collection document.
pub trait CollectionItem: Clone + Serialize + Send + Sync {
    fn id(&self) -> &str;
    fn tags(&self) -> &[String];
}

/// A document holding an ordered list of id-addressed items.
///
/// Items keep insertion order. `add` assigns a fresh id and `created_at`;
/// the caller is responsible for persisting the collection afterwards.
pub trait Collection: Document + Default {
    type Item: CollectionItem;
    /// Caller-supplied fields of a new item.
    type NewItem;

    /// File name of the collection inside a source folder.
    const FILE_NAME: &'static str;
    /// Prefix of generated item ids.
    const ID_PREFIX: &'static str;

    const ADDED: EventKind;
    const UPDATED: EventKind;
    const DELETED: EventKind;

    fn items(&self) -> &[Self::Item];
    fn items_mut(&mut self) -> &mut Vec<Self::Item>;

    /// Build an item from its id and caller fields. `created_at` is now.
    fn build_item(id: String, new: Self::NewItem) -> Self::Item;

    /// Append a new item with a fresh, unused id.
    fn add(&mut self, new: Self::NewItem) -> Self::Item {
        let id = ids::generate_unique_id(
            Self::ID_PREFIX,
            self.items().iter().map(|item| item.id()),
        );
        let item = Self::build_item(id, new);
        self.items_mut().push(item.clone());
        item
    }

    /// Remove the item with `id`. Returns whether anything was removed.
    fn remove(&mut self, id: &str) -> bool {
        let items = self.items_mut();
        let before = items.len();
        items.retain(|item| item.id() != id);
        items.len() != before
    }

    fn get(&self, id: &str) -> Option<&Self::Item> {
        self.items().iter().find(|item| item.id() == id)
    }

    fn get_mut(&mut self, id: &str) -> Option<&mut Self::Item> {
        self.items_mut().iter_mut().find(|item| item.id() == id)
    }

    fn get_by_tag(&self, tag: &str) -> Vec<&Self::Item> {
        self.items()
            .iter()
            .filter(|item| item.tags().iter().any(|t| t == tag))
            .collect()
    }

    fn len(&self) -> usize {
        self.items().len()
    }

    fn is_empty(&self) -> bool {
        self.items().is_empty()
    }
}

// =============================================================================
// INFERENCE
// =============================================================================

/// Backend for text generation.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Generate a completion for `prompt`, using `model` or the default model.
    async fn generate(&self, model: Option<&str>, prompt: &str) -> Result<String>;

    /// Names of the models the service has installed.
    async fn list_models(&self) -> Result<Vec<String>>;

    /// Whether the service is reachable. Never errors.
    async fn is_available(&self) -> bool;

    /// Model used when a request names none.
    fn default_model(&self) -> &str;
}
