//! Centralized default constants for folio.
//!
//! Every crate references these instead of defining its own magic numbers.
//! Organized by domain area.

// =============================================================================
// DOCUMENTS
// =============================================================================

/// Schema version written into every new document.
pub const SCHEMA_VERSION: &str = "1.0.0";

/// Project marker document.
pub const PROJECT_FILE: &str = "project.liproj";

/// Project-level notes collection.
pub const PROJECT_NOTES_FILE: &str = "project_notes.linote";

/// Project-level tasks collection.
pub const PROJECT_TASKS_FILE: &str = "project_tasks.litask";

/// Default name of the folder holding one subfolder per source.
pub const SOURCES_FOLDER: &str = "Sources";

/// Source metadata document.
pub const META_FILE: &str = "meta.limeta";

/// Per-source collection documents.
pub const NOTES_FILE: &str = "notes.linote";
pub const QUOTES_FILE: &str = "quotes.liquote";
pub const TASKS_FILE: &str = "tasks.litask";
pub const SUMMARIES_FILE: &str = "summaries.lisum";

/// Default document language.
pub const LANGUAGE: &str = "en";

/// Default `metadata_source` for manually entered sources.
pub const METADATA_SOURCE: &str = "manual";

// =============================================================================
// SOURCE NAMING
// =============================================================================

/// Number of title characters kept in a source folder name.
pub const FOLDER_TITLE_CHARS: usize = 30;

/// Author placeholder when a source has no authors.
pub const UNKNOWN_AUTHOR: &str = "Unknown";

/// Year placeholder ("no date") when a source has no year.
pub const UNKNOWN_YEAR: &str = "nd";

/// Title placeholder when a source title is empty.
pub const UNTITLED: &str = "Untitled";

// =============================================================================
// RECENT PROJECTS
// =============================================================================

/// Maximum entries kept in the recent-projects list.
pub const RECENT_PROJECTS_MAX: usize = 10;

// =============================================================================
// EVENTS
// =============================================================================

/// Broadcast buffer for `NotificationBus::stream` receivers.
pub const EVENT_BUS_CAPACITY: usize = 256;

/// Handler failures retained for inspection.
pub const EVENT_FAILURES_RETAINED: usize = 100;

// =============================================================================
// INFERENCE
// =============================================================================

/// Default Ollama endpoint.
pub const OLLAMA_URL: &str = "http://localhost:11434";

/// Default generation model.
pub const GEN_MODEL: &str = "mistral:latest";

/// Timeout for `/api/generate` requests (seconds).
pub const GEN_TIMEOUT_SECS: u64 = 120;

/// Timeout for the `/api/tags` availability check (seconds).
pub const PROBE_TIMEOUT_SECS: u64 = 2;

/// Timeout for model listing (seconds).
pub const LIST_MODELS_TIMEOUT_SECS: u64 = 5;

/// Maximum characters of job input placed in a prompt.
pub const PROMPT_INPUT_MAX_CHARS: usize = 10_000;

// =============================================================================
// JOBS
// =============================================================================

/// How long `JobQueue::stop` waits for the running job (milliseconds).
pub const JOB_STOP_GRACE_MS: u64 = 2_000;

// =============================================================================
// SETTINGS
// =============================================================================

/// Default PDF viewer zoom (percent).
pub const PDF_ZOOM: u32 = 100;

/// Default backup interval (minutes).
pub const BACKUP_INTERVAL_MINUTES: u32 = 30;
