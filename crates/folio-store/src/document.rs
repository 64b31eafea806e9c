//! Typed document persistence.
//!
//! Every persisted file goes through [`DocumentStore`]:
//!
//! - save: validate, serialize (pretty JSON), write a sibling temp file,
//!   fsync, rename over the destination
//! - load: read, decode, check schema version, validate
//!
//! A failed save never touches the destination file.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use folio_core::{Document, DocumentKind, Error, Result, Version};
use serde_json::Value as JsonValue;
use tracing::{debug, instrument, warn};

use crate::schema::SchemaRegistry;

/// Validates, saves, and loads [`Document`]s.
#[derive(Debug, Clone)]
pub struct DocumentStore {
    schemas: SchemaRegistry,
}

impl Default for DocumentStore {
    fn default() -> Self {
        Self::new(SchemaRegistry::builtin())
    }
}

impl DocumentStore {
    pub fn new(schemas: SchemaRegistry) -> Self {
        Self { schemas }
    }

    pub fn schemas(&self) -> &SchemaRegistry {
        &self.schemas
    }

    /// Check `doc` against the schema registered for its kind.
    pub fn validate<D: Document>(&self, doc: &D) -> Result<()> {
        let value = serde_json::to_value(doc)?;
        self.check(&value, D::KIND)
            .map_err(|violations| Error::Validation(format!("{}: {}", D::KIND, violations)))
    }

    fn check(&self, value: &JsonValue, kind: DocumentKind) -> std::result::Result<(), String> {
        let violations = self.schemas.violations(kind, value);
        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations.join("; "))
        }
    }

    /// Validate and atomically write `doc` to `path`.
    #[instrument(skip(self, path, doc), fields(
        subsystem = "store",
        component = "document_store",
        op = "save",
        path = %path.display(),
        document_kind = %D::KIND,
    ))]
    pub fn save<D: Document>(&self, path: &Path, doc: &D) -> Result<()> {
        let start = Instant::now();
        self.validate(doc)?;
        let mut bytes = serde_json::to_vec_pretty(doc)?;
        bytes.push(b'\n');
        write_atomic(path, &bytes)?;
        debug!(
            bytes = bytes.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Document saved"
        );
        Ok(())
    }

    /// Read, decode, and validate the document at `path`.
    #[instrument(skip(self, path), fields(
        subsystem = "store",
        component = "document_store",
        op = "load",
        path = %path.display(),
        document_kind = %D::KIND,
    ))]
    pub fn load<D: Document>(&self, path: &Path) -> Result<D> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(Error::NotFound(path.display().to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let mut value: JsonValue = serde_json::from_slice(&bytes)
            .map_err(|e| Error::Format(format!("{}: {}", path.display(), e)))?;

        check_version(path, &mut value)?;

        let doc: D = serde_json::from_value(value)
            .map_err(|e| Error::Format(format!("{}: {}", path.display(), e)))?;

        // Re-serialize so the check sees defaults applied on decode.
        let normalized = serde_json::to_value(&doc)?;
        if let Err(violations) = self.check(&normalized, D::KIND) {
            warn!(error = %violations, "Document failed schema validation");
            return Err(Error::Format(format!("{}: {}", path.display(), violations)));
        }

        debug!(bytes = bytes.len(), "Document loaded");
        Ok(doc)
    }

    /// Like [`load`](Self::load), but a missing file yields `D::default()`.
    pub fn load_or_default<D: Document + Default>(&self, path: &Path) -> Result<D> {
        match self.load(path) {
            Err(Error::NotFound(_)) => Ok(D::default()),
            other => other,
        }
    }
}

/// Reject documents from an incompatible major version. A missing version
/// is treated as current.
fn check_version(path: &Path, value: &mut JsonValue) -> Result<()> {
    let Some(obj) = value.as_object_mut() else {
        return Err(Error::Format(format!(
            "{}: document must be a JSON object",
            path.display()
        )));
    };
    let raw = match obj.get("schema_version") {
        None | Some(JsonValue::Null) => {
            obj.insert(
                "schema_version".to_string(),
                JsonValue::String(folio_core::CURRENT_SCHEMA_VERSION.to_string()),
            );
            return Ok(());
        }
        Some(JsonValue::String(s)) => s.clone(),
        Some(other) => {
            return Err(Error::Format(format!(
                "{}: schema_version must be a string, got {}",
                path.display(),
                other
            )))
        }
    };
    let version = Version::parse(&raw)
        .map_err(|e| Error::Format(format!("{}: {}", path.display(), e)))?;
    if !version.is_readable_by(&Version::current()) {
        return Err(Error::Format(format!(
            "{}: incompatible schema version {} (supported: {}.x)",
            path.display(),
            version,
            Version::current().major
        )));
    }
    Ok(())
}

/// Sibling temp path: `notes.linote` -> `notes.linote.tmp`.
fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Atomic write: temp file + fsync + rename.
pub fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            warn!(parent = %parent.display(), error = %e, "create_dir_all failed");
            e
        })?;
    }

    let temp_path = temp_path_for(path);
    let written = (|| -> std::io::Result<()> {
        let mut file = fs::File::create(&temp_path)?;
        file.write_all(data)?;
        file.sync_all()
    })();
    if let Err(e) = written {
        warn!(temp_path = %temp_path.display(), error = %e, "temp file write failed");
        let _ = fs::remove_file(&temp_path);
        return Err(e.into());
    }

    fs::rename(&temp_path, path).map_err(|e| {
        warn!(from = %temp_path.display(), to = %path.display(), error = %e, "rename failed");
        let _ = fs::remove_file(&temp_path);
        e
    })?;
    Ok(())
}
