//! Summaries of a source, written by hand or generated by a model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::defaults;
use crate::events::EventKind;
use crate::ids;
use crate::timestamp;
use crate::traits::{Collection, CollectionItem, Document, DocumentKind};
use crate::version::default_schema_version;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryType {
    #[default]
    Full,
    Chapter,
    Section,
    Abstract,
}

/// Where a summary came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryOrigin {
    #[default]
    Manual,
    AiGenerated,
    Imported,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(rename = "type", default)]
    pub summary_type: SummaryType,
    #[serde(default)]
    pub source: SummaryOrigin,
    #[serde(default)]
    pub ai_model: Option<String>,
    /// Page span covered, free-form ("1-20").
    #[serde(default)]
    pub pages: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(with = "timestamp", default = "timestamp::unknown")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "timestamp::option", default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Summary {
    pub fn update_content(&mut self, content: impl Into<String>) {
        self.content = content.into();
        self.updated_at = Some(timestamp::now());
    }
}

impl CollectionItem for Summary {
    fn id(&self) -> &str {
        &self.id
    }

    fn tags(&self) -> &[String] {
        &self.tags
    }
}

/// Fields supplied when adding a summary.
#[derive(Debug, Clone, Default)]
pub struct NewSummary {
    pub title: String,
    pub content: String,
    pub summary_type: SummaryType,
    pub source: SummaryOrigin,
    pub ai_model: Option<String>,
    pub pages: Option<String>,
    pub tags: Vec<String>,
}

impl NewSummary {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            ..Default::default()
        }
    }

    /// Mark as generated by `model`.
    pub fn generated_by(mut self, model: impl Into<String>) -> Self {
        self.source = SummaryOrigin::AiGenerated;
        self.ai_model = Some(model.into());
        self
    }

    pub fn with_type(mut self, summary_type: SummaryType) -> Self {
        self.summary_type = summary_type;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summaries {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    #[serde(default)]
    pub summaries: Vec<Summary>,
}

impl Default for Summaries {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            summaries: Vec::new(),
        }
    }
}

impl Summaries {
    pub fn get_by_type(&self, summary_type: SummaryType) -> Vec<&Summary> {
        self.summaries
            .iter()
            .filter(|s| s.summary_type == summary_type)
            .collect()
    }

    fn get_by_origin(&self, origin: SummaryOrigin) -> Vec<&Summary> {
        self.summaries.iter().filter(|s| s.source == origin).collect()
    }

    pub fn get_ai_generated(&self) -> Vec<&Summary> {
        self.get_by_origin(SummaryOrigin::AiGenerated)
    }

    pub fn get_manual(&self) -> Vec<&Summary> {
        self.get_by_origin(SummaryOrigin::Manual)
    }
}

impl Document for Summaries {
    const KIND: DocumentKind = DocumentKind::Summaries;

    fn schema_version(&self) -> &str {
        &self.schema_version
    }
}

impl Collection for Summaries {
    type Item = Summary;
    type NewItem = NewSummary;

    const FILE_NAME: &'static str = defaults::SUMMARIES_FILE;
    const ID_PREFIX: &'static str = ids::SUMMARY_PREFIX;

    const ADDED: EventKind = EventKind::SummaryAdded;
    const UPDATED: EventKind = EventKind::SummaryUpdated;
    const DELETED: EventKind = EventKind::SummaryDeleted;

    fn items(&self) -> &[Summary] {
        &self.summaries
    }

    fn items_mut(&mut self) -> &mut Vec<Summary> {
        &mut self.summaries
    }

    fn build_item(id: String, new: NewSummary) -> Summary {
        Summary {
            id,
            title: new.title,
            content: new.content,
            summary_type: new.summary_type,
            source: new.source,
            ai_model: new.ai_model,
            pages: new.pages,
            tags: new.tags,
            created_at: timestamp::now(),
            updated_at: None,
        }
    }
}
