//! Core data models for folio.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::defaults;
use crate::error::Error;
use crate::naming;
use crate::timestamp;
use crate::traits::{Document, DocumentKind};
use crate::version::default_schema_version;

fn default_language() -> String {
    defaults::LANGUAGE.to_string()
}

fn default_sources_folder() -> String {
    defaults::SOURCES_FOLDER.to_string()
}

fn default_metadata_source() -> String {
    defaults::METADATA_SOURCE.to_string()
}

// =============================================================================
// PROJECT
// =============================================================================

/// Citation style configured for a project.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CitationStyle {
    #[default]
    Apa,
    Mla,
    Chicago,
    Din,
    Harvard,
}

impl CitationStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            CitationStyle::Apa => "apa",
            CitationStyle::Mla => "mla",
            CitationStyle::Chicago => "chicago",
            CitationStyle::Din => "din",
            CitationStyle::Harvard => "harvard",
        }
    }
}

impl fmt::Display for CitationStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CitationStyle {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "apa" => Ok(CitationStyle::Apa),
            "mla" => Ok(CitationStyle::Mla),
            "chicago" => Ok(CitationStyle::Chicago),
            "din" => Ok(CitationStyle::Din),
            "harvard" => Ok(CitationStyle::Harvard),
            other => Err(Error::InvalidInput(format!(
                "unknown citation style: {}",
                other
            ))),
        }
    }
}

/// Project configuration stored in the project marker document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub citation_style: CitationStyle,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_sources_folder")]
    pub sources_folder: String,
    #[serde(with = "timestamp", default = "timestamp::unknown")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "timestamp", default = "timestamp::unknown")]
    pub updated_at: DateTime<Utc>,
}

impl ProjectConfig {
    pub fn new(name: impl Into<String>) -> Self {
        let now = timestamp::now();
        Self {
            schema_version: default_schema_version(),
            name: name.into(),
            description: None,
            citation_style: CitationStyle::default(),
            language: default_language(),
            sources_folder: default_sources_folder(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = timestamp::now();
    }
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self::new("")
    }
}

impl Document for ProjectConfig {
    const KIND: DocumentKind = DocumentKind::Project;

    fn schema_version(&self) -> &str {
        &self.schema_version
    }
}

// =============================================================================
// SOURCE
// =============================================================================

/// Bibliographic type of a source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    #[default]
    Article,
    Book,
    Chapter,
    Thesis,
    Conference,
    Website,
    Other,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Article => "article",
            SourceType::Book => "book",
            SourceType::Chapter => "chapter",
            SourceType::Thesis => "thesis",
            SourceType::Conference => "conference",
            SourceType::Website => "website",
            SourceType::Other => "other",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "article" => Ok(SourceType::Article),
            "book" => Ok(SourceType::Book),
            "chapter" => Ok(SourceType::Chapter),
            "thesis" => Ok(SourceType::Thesis),
            "conference" => Ok(SourceType::Conference),
            "website" => Ok(SourceType::Website),
            "other" => Ok(SourceType::Other),
            other => Err(Error::InvalidInput(format!("unknown source type: {}", other))),
        }
    }
}

/// Bibliographic metadata of one source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceMeta {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub doi: Option<String>,
    #[serde(default)]
    pub isbn: Option<String>,
    #[serde(default)]
    pub publisher: Option<String>,
    #[serde(default)]
    pub journal: Option<String>,
    #[serde(default)]
    pub volume: Option<String>,
    #[serde(default)]
    pub issue: Option<String>,
    #[serde(default)]
    pub pages: Option<String>,
    #[serde(default, rename = "abstract")]
    pub abstract_text: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Artifact filename, relative to the source folder.
    #[serde(default)]
    pub source_file: Option<String>,
    #[serde(default)]
    pub source_type: SourceType,
    /// Provenance of the metadata ("manual", "bibtex_import", ...).
    #[serde(default = "default_metadata_source")]
    pub metadata_source: String,
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(with = "timestamp", default = "timestamp::unknown")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "timestamp", default = "timestamp::unknown")]
    pub updated_at: DateTime<Utc>,
}

impl SourceMeta {
    pub fn new(title: impl Into<String>, authors: Vec<String>, year: Option<i32>) -> Self {
        let now = timestamp::now();
        Self {
            schema_version: default_schema_version(),
            title: title.into(),
            authors,
            year,
            doi: None,
            isbn: None,
            publisher: None,
            journal: None,
            volume: None,
            issue: None,
            pages: None,
            abstract_text: None,
            tags: Vec::new(),
            source_file: None,
            source_type: SourceType::default(),
            metadata_source: default_metadata_source(),
            verified: false,
            url: None,
            language: default_language(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Surname of the first author, or `"Unknown"`.
    pub fn first_author(&self) -> String {
        self.authors
            .first()
            .and_then(|a| a.split(',').next())
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .unwrap_or(defaults::UNKNOWN_AUTHOR)
            .to_string()
    }

    /// Short citation key, e.g. `Smith2024`.
    pub fn citation_key(&self) -> String {
        let year = self
            .year
            .map(|y| y.to_string())
            .unwrap_or_else(|| defaults::UNKNOWN_YEAR.to_string());
        format!("{}{}", self.first_author().replace(' ', ""), year)
    }

    /// Deterministic folder name for this source.
    pub fn folder_name(&self) -> String {
        naming::folder_name(&self.first_author(), self.year, &self.title)
    }

    pub fn touch(&mut self) {
        self.updated_at = timestamp::now();
    }
}

impl Default for SourceMeta {
    fn default() -> Self {
        Self::new("", Vec::new(), None)
    }
}

impl fmt::Display for SourceMeta {
    /// `A, B et al. (year): title`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shown: Vec<&str> = self.authors.iter().take(2).map(String::as_str).collect();
        write!(f, "{}", shown.join(", "))?;
        if self.authors.len() > 2 {
            write!(f, " et al.")?;
        }
        if let Some(year) = self.year {
            write!(f, " ({})", year)?;
        }
        write!(f, ": {}", self.title)
    }
}

impl Document for SourceMeta {
    const KIND: DocumentKind = DocumentKind::SourceMeta;

    fn schema_version(&self) -> &str {
        &self.schema_version
    }
}

// =============================================================================
// JOBS
// =============================================================================

/// Identifier of a queued job, `job_{YYYYMMDD_HHMMSS}_{counter}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        JobId(id.into())
    }

    /// Build an id from a local timestamp and a per-queue counter.
    pub fn generate(counter: u64) -> Self {
        let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        JobId(format!("job_{}_{}", stamp, counter))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Kind of work a job asks the model service to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    Summarize,
    ExtractQuotes,
    MetadataLookup,
}

impl JobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::Summarize => "summarize",
            JobType::ExtractQuotes => "extract_quotes",
            JobType::MetadataLookup => "metadata_lookup",
        }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "summarize" => Ok(JobType::Summarize),
            "extract_quotes" => Ok(JobType::ExtractQuotes),
            "metadata_lookup" => Ok(JobType::MetadataLookup),
            other => Err(Error::InvalidInput(format!("unknown job type: {}", other))),
        }
    }
}

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit of model work and its outcome.
///
/// Status moves `pending -> running -> completed | failed`, or
/// `pending -> cancelled`. The transition methods enforce this and return
/// `false` when called from the wrong state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub job_type: JobType,
    pub input_text: String,
    /// Free-form parameters. Recognized key: `model`.
    #[serde(default)]
    pub params: Map<String, JsonValue>,
    #[serde(default)]
    pub status: JobStatus,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "timestamp::option", default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(with = "timestamp::option", default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn new(
        id: JobId,
        job_type: JobType,
        input_text: impl Into<String>,
        params: Map<String, JsonValue>,
    ) -> Self {
        Self {
            id,
            job_type,
            input_text: input_text.into(),
            params,
            status: JobStatus::Pending,
            result: None,
            error: None,
            created_at: timestamp::now(),
            started_at: None,
            completed_at: None,
        }
    }

    /// Model requested via `params.model`, if any.
    pub fn model(&self) -> Option<&str> {
        self.params
            .get("model")
            .and_then(JsonValue::as_str)
            .filter(|m| !m.trim().is_empty())
    }

    pub fn mark_running(&mut self) -> bool {
        if self.status != JobStatus::Pending {
            return false;
        }
        self.status = JobStatus::Running;
        self.started_at = Some(timestamp::now());
        true
    }

    pub fn mark_completed(&mut self, result: String) -> bool {
        if self.status != JobStatus::Running {
            return false;
        }
        self.status = JobStatus::Completed;
        self.result = Some(result);
        self.completed_at = Some(timestamp::now());
        true
    }

    pub fn mark_failed(&mut self, error: String) -> bool {
        if self.status != JobStatus::Running {
            return false;
        }
        self.status = JobStatus::Failed;
        self.error = Some(error);
        self.completed_at = Some(timestamp::now());
        true
    }

    pub fn cancel(&mut self) -> bool {
        if self.status != JobStatus::Pending {
            return false;
        }
        self.status = JobStatus::Cancelled;
        self.completed_at = Some(timestamp::now());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn smith() -> SourceMeta {
        SourceMeta::new("Understanding AI", vec!["Smith, John".to_string()], Some(2024))
    }

    #[test]
    fn test_first_author_and_citation_key() {
        let meta = smith();
        assert_eq!(meta.first_author(), "Smith");
        assert_eq!(meta.citation_key(), "Smith2024");
        assert_eq!(meta.folder_name(), "Smith2024_Understanding_AI");
    }

    #[test]
    fn test_first_author_fallbacks() {
        let meta = SourceMeta::new("Anonymous", vec![], None);
        assert_eq!(meta.first_author(), "Unknown");
        assert_eq!(meta.citation_key(), "Unknownnd");

        let meta = SourceMeta::new("Two words", vec!["van Dijk, Anna".into()], Some(2001));
        assert_eq!(meta.citation_key(), "vanDijk2001");
    }

    #[test]
    fn test_source_display() {
        let mut meta = smith();
        assert_eq!(meta.to_string(), "Smith, John (2024): Understanding AI");

        meta.authors = vec!["A".into(), "B".into(), "C".into()];
        meta.year = None;
        assert_eq!(meta.to_string(), "A, B et al.: Understanding AI");
    }

    #[test]
    fn test_source_meta_defaults_on_sparse_json() {
        let meta: SourceMeta = serde_json::from_str(r#"{"title":"Sparse"}"#).unwrap();
        assert_eq!(meta.schema_version, "1.0.0");
        assert_eq!(meta.source_type, SourceType::Article);
        assert_eq!(meta.metadata_source, "manual");
        assert_eq!(meta.language, "en");
        assert!(!meta.verified);
        assert!(meta.authors.is_empty());
    }

    #[test]
    fn test_source_meta_abstract_field_name() {
        let mut meta = smith();
        meta.abstract_text = Some("We study things.".into());
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["abstract"], "We study things.");
    }

    #[test]
    fn test_unknown_source_type_rejected() {
        let r: Result<SourceMeta, _> =
            serde_json::from_str(r#"{"title":"X","source_type":"podcast"}"#);
        assert!(r.is_err());
    }

    #[test]
    fn test_project_config_round_trip() {
        let mut cfg = ProjectConfig::new("P");
        cfg.citation_style = CitationStyle::Harvard;
        let json = serde_json::to_string(&cfg).unwrap();
        let back: ProjectConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cfg);
    }

    #[test]
    fn test_citation_style_parse() {
        assert_eq!("APA".parse::<CitationStyle>().unwrap(), CitationStyle::Apa);
        assert_eq!("din".parse::<CitationStyle>().unwrap(), CitationStyle::Din);
        assert!("ieee".parse::<CitationStyle>().is_err());
    }

    #[test]
    fn test_job_id_format() {
        let id = JobId::generate(3);
        let s = id.to_string();
        assert!(s.starts_with("job_"));
        assert!(s.ends_with("_3"));
        // job_ + YYYYMMDD_HHMMSS + _3
        assert_eq!(s.len(), 4 + 15 + 2);
    }

    #[test]
    fn test_job_lifecycle() {
        let mut job = Job::new(JobId::new("job_1"), JobType::Summarize, "text", Map::new());
        assert!(!job.mark_completed("early".into()));
        assert!(job.mark_running());
        assert!(job.started_at.is_some());
        assert!(!job.mark_running());
        assert!(!job.cancel());
        assert!(job.mark_completed("done".into()));
        assert_eq!(job.status, JobStatus::Completed);
        assert!(!job.mark_failed("late".into()));
        assert!(job.status.is_terminal());
    }

    #[test]
    fn test_job_cancel_only_while_pending() {
        let mut job = Job::new(JobId::new("job_2"), JobType::ExtractQuotes, "", Map::new());
        assert!(job.cancel());
        assert_eq!(job.status, JobStatus::Cancelled);
        assert!(!job.mark_running());
    }

    #[test]
    fn test_job_model_param() {
        let mut params = Map::new();
        params.insert("model".into(), JsonValue::String("llama3:8b".into()));
        let job = Job::new(JobId::new("job_3"), JobType::MetadataLookup, "", params);
        assert_eq!(job.model(), Some("llama3:8b"));

        let job = Job::new(JobId::new("job_4"), JobType::MetadataLookup, "", Map::new());
        assert_eq!(job.model(), None);
    }

    #[test]
    fn test_job_type_names() {
        assert_eq!(JobType::ExtractQuotes.to_string(), "extract_quotes");
        assert_eq!(
            "metadata_lookup".parse::<JobType>().unwrap(),
            JobType::MetadataLookup
        );
        assert!("translate".parse::<JobType>().is_err());
    }
}
