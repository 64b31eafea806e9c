//! Write completed job results back into a source.
//!
//! Each function takes a finished [`Job`] snapshot and stores its result
//! through the [`SourceRepository`], so saves are validated and events are
//! published like any other edit.

use folio_core::{
    Error, Job, JobStatus, JobType, NewQuote, NewSummary, Quote, QuoteType, Quotes, Result,
    Summaries, Summary,
};
use folio_store::{Source, SourceRepository};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value as JsonValue;
use tracing::{debug, info};

/// `metadata_source` recorded when a lookup job filled any field.
pub const AI_METADATA_SOURCE: &str = "ai_lookup";

/// `- "quote" (comment)`, tolerating typographic quotes and `*` bullets.
static QUOTE_LINE: Lazy<std::result::Result<Regex, regex::Error>> = Lazy::new(|| {
    Regex::new(r#"^\s*[-*•]\s*["“„«](?P<text>.+?)["”“»]\s*(?:\((?P<comment>[^)]*)\))?\s*$"#)
});

/// The result text of a completed job of type `expected`.
fn completed_result(job: &Job, expected: JobType) -> Result<&str> {
    if job.job_type != expected {
        return Err(Error::InvalidInput(format!(
            "job {} is a {} job, expected {}",
            job.id, job.job_type, expected
        )));
    }
    if job.status != JobStatus::Completed {
        return Err(Error::InvalidInput(format!(
            "job {} is {}, not completed",
            job.id, job.status
        )));
    }
    job.result
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .ok_or_else(|| Error::InvalidInput(format!("job {} has no result", job.id)))
}

/// Store a summarize job's output as an AI-generated summary.
pub fn store_summary(
    repo: &SourceRepository,
    source: &Source,
    job: &Job,
    title: &str,
) -> Result<Summary> {
    let content = completed_result(job, JobType::Summarize)?;
    let model = job.model().unwrap_or("unknown");
    let summary =
        repo.add_item::<Summaries>(source, NewSummary::new(title, content).generated_by(model))?;
    info!(
        subsystem = "jobs",
        component = "writeback",
        job_id = %job.id,
        item_id = %summary.id,
        "Summary stored"
    );
    Ok(summary)
}

/// Parse `- "quote" (comment)` lines into direct quotes. Other lines are ignored.
pub fn parse_quotes(text: &str) -> Result<Vec<NewQuote>> {
    let pattern = QUOTE_LINE
        .as_ref()
        .map_err(|e| Error::Internal(format!("quote pattern: {}", e)))?;
    let quotes = text
        .lines()
        .filter_map(|line| pattern.captures(line))
        .filter_map(|caps| {
            let quote = caps.name("text")?.as_str().trim();
            if quote.is_empty() {
                return None;
            }
            let mut new = NewQuote::new(quote).with_type(QuoteType::Direct);
            if let Some(comment) = caps
                .name("comment")
                .map(|c| c.as_str().trim())
                .filter(|c| !c.is_empty())
            {
                new = new.with_comment(comment);
            }
            Some(new)
        })
        .collect();
    Ok(quotes)
}

/// Store every quote found in an extract-quotes job's output.
pub fn store_quotes(repo: &SourceRepository, source: &Source, job: &Job) -> Result<Vec<Quote>> {
    let text = completed_result(job, JobType::ExtractQuotes)?;
    let parsed = parse_quotes(text)?;
    debug!(
        job_id = %job.id,
        result_count = parsed.len(),
        "Parsed quotes from job result"
    );

    let mut stored = Vec::with_capacity(parsed.len());
    for new in parsed {
        stored.push(repo.add_item::<Quotes>(source, new)?);
    }
    Ok(stored)
}

/// First `{ ... }` span of `text` parsed as a JSON object.
fn extract_json_object(text: &str) -> Option<serde_json::Map<String, JsonValue>> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    match serde_json::from_str(&text[start..=end]).ok()? {
        JsonValue::Object(map) => Some(map),
        _ => None,
    }
}

fn text_field(map: &serde_json::Map<String, JsonValue>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| map.get(*k))
        .find_map(|v| match v {
            JsonValue::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            JsonValue::Number(n) => Some(n.to_string()),
            _ => None,
        })
}

fn authors_field(map: &serde_json::Map<String, JsonValue>) -> Vec<String> {
    let value = map.get("authors").or_else(|| map.get("author"));
    let names: Vec<String> = match value {
        Some(JsonValue::Array(items)) => items
            .iter()
            .filter_map(JsonValue::as_str)
            .map(String::from)
            .collect(),
        Some(JsonValue::String(s)) => s.split(';').map(String::from).collect(),
        _ => Vec::new(),
    };
    names
        .into_iter()
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .collect()
}

/// Fill empty metadata fields of `source` from a metadata-lookup job's JSON
/// output and save. Fields that already have a value are left alone.
///
/// Returns the names of the fields that were filled.
pub fn store_metadata(
    repo: &SourceRepository,
    source: &mut Source,
    job: &Job,
) -> Result<Vec<&'static str>> {
    let text = completed_result(job, JobType::MetadataLookup)?;
    let found = extract_json_object(text).ok_or_else(|| {
        Error::InvalidInput(format!("job {} result contains no JSON object", job.id))
    })?;

    let meta = &mut source.meta;
    let mut filled = Vec::new();

    if meta.authors.is_empty() {
        let authors = authors_field(&found);
        if !authors.is_empty() {
            meta.authors = authors;
            filled.push("authors");
        }
    }
    if meta.year.is_none() {
        if let Some(year) = text_field(&found, &["year"]).and_then(|y| y.parse().ok()) {
            meta.year = Some(year);
            filled.push("year");
        }
    }
    let optional: [(&'static str, &mut Option<String>); 4] = [
        ("doi", &mut meta.doi),
        ("isbn", &mut meta.isbn),
        ("publisher", &mut meta.publisher),
        ("journal", &mut meta.journal),
    ];
    for (key, slot) in optional {
        if slot.is_none() {
            if let Some(value) = text_field(&found, &[key]) {
                *slot = Some(value);
                filled.push(key);
            }
        }
    }

    if !filled.is_empty() {
        meta.metadata_source = AI_METADATA_SOURCE.to_string();
        repo.update(source)?;
    }
    info!(
        subsystem = "jobs",
        component = "writeback",
        job_id = %job.id,
        result_count = filled.len(),
        "Metadata merged"
    );
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_core::{CitationStyle, JobId, NotificationBus, SourceMeta, SummaryOrigin};
    use folio_store::{DocumentStore, ProjectRepository};
    use serde_json::Map;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn finished(job_type: JobType, result: &str) -> Job {
        let mut params = Map::new();
        params.insert("model".into(), JsonValue::String("mistral:latest".into()));
        let mut job = Job::new(JobId::new("job_20240101_120000_1"), job_type, "input", params);
        job.mark_running();
        job.mark_completed(result.to_string());
        job
    }

    fn setup() -> (TempDir, SourceRepository, Source) {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(DocumentStore::default());
        let bus = Arc::new(NotificationBus::new());
        let projects = ProjectRepository::new(store.clone(), bus.clone());
        let project = projects
            .create(&dir.path().join("P"), "P", None, CitationStyle::Apa)
            .unwrap();
        let repo = SourceRepository::new(store, bus);
        let source = repo
            .create(
                &project,
                SourceMeta::new("Understanding AI", vec!["Smith, John".into()], Some(2024)),
                None,
            )
            .unwrap();
        (dir, repo, source)
    }

    #[test]
    fn test_parse_quotes() {
        let text = r#"Here are the key quotes:
- "Alignment is a moving target." (central thesis)
- "Models generalize." ()
* “Typographic quotes work too” (style)
Some trailing prose.
- not a quote line"#;
        let quotes = parse_quotes(text).unwrap();
        assert_eq!(quotes.len(), 3);
        assert_eq!(quotes[0].text, "Alignment is a moving target.");
        assert_eq!(quotes[0].comment.as_deref(), Some("central thesis"));
        assert_eq!(quotes[0].quote_type, QuoteType::Direct);
        assert!(quotes[1].comment.is_none());
        assert_eq!(quotes[2].text, "Typographic quotes work too");
    }

    #[test]
    fn test_parse_quotes_empty() {
        assert!(parse_quotes("").unwrap().is_empty());
        assert!(parse_quotes("No quotes found.").unwrap().is_empty());
    }

    #[test]
    fn test_store_summary() {
        let (_dir, repo, source) = setup();
        let job = finished(JobType::Summarize, "  1. Thesis: AI can be aligned.\n");
        let summary = store_summary(&repo, &source, &job, "AI summary").unwrap();

        assert_eq!(summary.content, "1. Thesis: AI can be aligned.");
        assert_eq!(summary.source, SummaryOrigin::AiGenerated);
        assert_eq!(summary.ai_model.as_deref(), Some("mistral:latest"));

        let summaries: Summaries = repo.collection(&source).unwrap();
        assert_eq!(summaries.get_ai_generated().len(), 1);
    }

    #[test]
    fn test_rejects_unfinished_or_mismatched_jobs() {
        let (_dir, repo, source) = setup();

        let pending = Job::new(JobId::new("job_x_1"), JobType::Summarize, "input", Map::new());
        assert!(matches!(
            store_summary(&repo, &source, &pending, "t"),
            Err(Error::InvalidInput(_))
        ));

        let quotes_job = finished(JobType::ExtractQuotes, "- \"q\"");
        assert!(matches!(
            store_summary(&repo, &source, &quotes_job, "t"),
            Err(Error::InvalidInput(_))
        ));

        let mut failed = Job::new(JobId::new("job_x_2"), JobType::ExtractQuotes, "input", Map::new());
        failed.mark_running();
        failed.mark_failed("boom".into());
        assert!(matches!(
            store_quotes(&repo, &source, &failed),
            Err(Error::InvalidInput(_))
        ));

        let blank = finished(JobType::Summarize, "   ");
        assert!(matches!(
            store_summary(&repo, &source, &blank, "t"),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_store_quotes() {
        let (_dir, repo, source) = setup();
        let job = finished(
            JobType::ExtractQuotes,
            "- \"First claim.\" (intro)\n- \"Second claim.\" (results)",
        );
        let stored = store_quotes(&repo, &source, &job).unwrap();
        assert_eq!(stored.len(), 2);

        let quotes: Quotes = repo.collection(&source).unwrap();
        assert_eq!(quotes.get_direct().len(), 2);
        assert_eq!(quotes.quotes[1].comment.as_deref(), Some("results"));
    }

    #[test]
    fn test_store_metadata_fills_only_empty_fields() {
        let (_dir, repo, mut source) = setup();
        source.meta.journal = Some("Existing Journal".into());

        let job = finished(
            JobType::MetadataLookup,
            r#"Found metadata:
{"title": "Other", "authors": ["Doe, Jane"], "year": 2020, "doi": "10.1000/xyz",
 "journal": "Nature", "publisher": ""}"#,
        );
        let filled = store_metadata(&repo, &mut source, &job).unwrap();

        assert_eq!(filled, vec!["doi"]);
        assert_eq!(source.meta.title, "Understanding AI");
        assert_eq!(source.meta.authors, vec!["Smith, John".to_string()]);
        assert_eq!(source.meta.year, Some(2024));
        assert_eq!(source.meta.journal.as_deref(), Some("Existing Journal"));
        assert_eq!(source.meta.metadata_source, AI_METADATA_SOURCE);

        let reloaded = repo.load(&source.path).unwrap();
        assert_eq!(reloaded.meta.doi.as_deref(), Some("10.1000/xyz"));
    }

    #[test]
    fn test_store_metadata_fills_authors_and_year() {
        let (_dir, repo, mut source) = setup();
        source.meta.authors.clear();
        source.meta.year = None;

        let job = finished(
            JobType::MetadataLookup,
            r#"{"author": "Doe, Jane; Roe, Rick", "year": "2019"}"#,
        );
        let filled = store_metadata(&repo, &mut source, &job).unwrap();
        assert_eq!(filled, vec!["authors", "year"]);
        assert_eq!(source.meta.authors, vec!["Doe, Jane", "Roe, Rick"]);
        assert_eq!(source.meta.year, Some(2019));
    }

    #[test]
    fn test_store_metadata_without_json() {
        let (_dir, repo, mut source) = setup();
        let job = finished(JobType::MetadataLookup, "Nothing useful here.");
        assert!(matches!(
            store_metadata(&repo, &mut source, &job),
            Err(Error::InvalidInput(_))
        ));
    }
}
