//! Document schemas.
//!
//! Each [`DocumentKind`] may carry a JSON Schema (draft 7) that the
//! document's JSON form must satisfy. The built-in schemas live in
//! `schemas/*.schema.json` and are embedded at compile time. Rules JSON
//! Schema cannot state (unique item ids, page order, major-version
//! compatibility) are attached as [`DocumentCheck`]s. A kind without a
//! registered schema is always valid.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use folio_core::{DocumentKind, Error, Result, Version};
use jsonschema::{Draft, JSONSchema};
use serde_json::Value as JsonValue;
use tracing::error;

const PROJECT_SCHEMA: &str = include_str!("../schemas/project.schema.json");
const SOURCE_META_SCHEMA: &str = include_str!("../schemas/source_meta.schema.json");
const NOTES_SCHEMA: &str = include_str!("../schemas/notes.schema.json");
const QUOTES_SCHEMA: &str = include_str!("../schemas/quotes.schema.json");
const TASKS_SCHEMA: &str = include_str!("../schemas/tasks.schema.json");
const SUMMARIES_SCHEMA: &str = include_str!("../schemas/summaries.schema.json");

/// Extra check on the whole document. Returns a message per violation.
pub type DocumentCheck = fn(&JsonValue) -> Vec<String>;

/// A compiled JSON Schema plus extra checks for one document kind.
#[derive(Clone)]
pub struct Schema {
    compiled: Arc<JSONSchema>,
    checks: Vec<DocumentCheck>,
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("checks", &self.checks.len())
            .finish_non_exhaustive()
    }
}

impl Schema {
    /// Compile a draft 7 JSON Schema.
    pub fn compile(schema: &JsonValue) -> Result<Self> {
        let compiled = JSONSchema::options()
            .with_draft(Draft::Draft7)
            .compile(schema)
            .map_err(|e| Error::Config(format!("Failed to compile document schema: {}", e)))?;
        Ok(Self {
            compiled: Arc::new(compiled),
            checks: Vec::new(),
        })
    }

    /// Parse and compile a schema given as JSON text.
    pub fn from_json(text: &str) -> Result<Self> {
        let value: JsonValue = serde_json::from_str(text)
            .map_err(|e| Error::Config(format!("Document schema is not JSON: {}", e)))?;
        Self::compile(&value)
    }

    pub fn check(mut self, check: DocumentCheck) -> Self {
        self.checks.push(check);
        self
    }

    /// Collect every violation in `doc`.
    pub fn violations(&self, doc: &JsonValue) -> Vec<String> {
        let mut errors: Vec<String> = match self.compiled.validate(doc) {
            Ok(()) => Vec::new(),
            Err(found) => found
                .map(|e| {
                    let path = e.instance_path.to_string();
                    if path.is_empty() {
                        e.to_string()
                    } else {
                        format!("{} at {}", e, path)
                    }
                })
                .collect(),
        };
        for check in &self.checks {
            errors.extend(check(doc));
        }
        errors
    }
}

/// Documents from another major version cannot be read.
fn compatible_version(doc: &JsonValue) -> Vec<String> {
    let Some(raw) = doc.get("schema_version").and_then(JsonValue::as_str) else {
        return Vec::new();
    };
    match Version::parse(raw) {
        Ok(version) if !version.is_readable_by(&Version::current()) => vec![format!(
            "schema_version {} is incompatible with {}",
            version,
            Version::current()
        )],
        _ => Vec::new(),
    }
}

/// Item ids must be unique within each collection array.
fn unique_item_ids(doc: &JsonValue) -> Vec<String> {
    let Some(fields) = doc.as_object() else {
        return Vec::new();
    };
    let mut errors = Vec::new();
    for (field, value) in fields {
        let Some(items) = value.as_array() else {
            continue;
        };
        let mut seen = HashSet::new();
        for (idx, item) in items.iter().enumerate() {
            if let Some(id) = item.get("id").and_then(JsonValue::as_str) {
                if !seen.insert(id) {
                    errors.push(format!("{}[{}]: duplicate id {}", field, idx, id));
                }
            }
        }
    }
    errors
}

/// Quotes spanning pages must not end before they start.
fn quote_page_order(doc: &JsonValue) -> Vec<String> {
    let Some(quotes) = doc.get("quotes").and_then(JsonValue::as_array) else {
        return Vec::new();
    };
    quotes
        .iter()
        .enumerate()
        .filter_map(|(idx, q)| {
            let page = q.get("page").and_then(JsonValue::as_u64)?;
            let end = q.get("page_end").and_then(JsonValue::as_u64)?;
            (end < page).then(|| format!("quotes[{}]: page_end {} is before page {}", idx, end, page))
        })
        .collect()
}

/// Schemas keyed by document kind.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: HashMap<DocumentKind, Schema>,
}

impl SchemaRegistry {
    /// An empty registry: every document is valid.
    pub fn new() -> Self {
        Self::default()
    }

    /// Schemas for every built-in document kind.
    pub fn builtin() -> Self {
        let builtin: [(DocumentKind, &str, &[DocumentCheck]); 6] = [
            (DocumentKind::Project, PROJECT_SCHEMA, &[]),
            (DocumentKind::SourceMeta, SOURCE_META_SCHEMA, &[]),
            (DocumentKind::Notes, NOTES_SCHEMA, &[unique_item_ids]),
            (
                DocumentKind::Quotes,
                QUOTES_SCHEMA,
                &[unique_item_ids, quote_page_order],
            ),
            (DocumentKind::Tasks, TASKS_SCHEMA, &[unique_item_ids]),
            (DocumentKind::Summaries, SUMMARIES_SCHEMA, &[unique_item_ids]),
        ];

        let mut registry = Self::new();
        for (kind, text, checks) in builtin {
            match Schema::from_json(text) {
                Ok(schema) => {
                    let schema = checks
                        .iter()
                        .fold(schema.check(compatible_version), |s, c| s.check(*c));
                    registry.register(kind, schema);
                }
                Err(e) => error!(
                    subsystem = "store",
                    component = "schema_registry",
                    document_kind = %kind,
                    error = %e,
                    "Built-in schema rejected, documents of this kind go unchecked"
                ),
            }
        }
        registry
    }

    /// Register or replace the schema for `kind`.
    pub fn register(&mut self, kind: DocumentKind, schema: Schema) {
        self.schemas.insert(kind, schema);
    }

    pub fn get(&self, kind: DocumentKind) -> Option<&Schema> {
        self.schemas.get(&kind)
    }

    /// Violations of `doc` against the schema for `kind` (empty when valid).
    pub fn violations(&self, kind: DocumentKind, doc: &JsonValue) -> Vec<String> {
        self.schemas
            .get(&kind)
            .map(|schema| schema.violations(doc))
            .unwrap_or_default()
    }
}
