//! # folio-core
//!
//! Core types, traits, and abstractions for folio.
//!
//! This crate provides:
//! - Document models (project config, source metadata, collections, jobs)
//! - The `Document` and `Collection` contracts shared by every persisted file
//! - The notification bus
//! - Error types, identifiers, timestamps, and settings

pub mod collections;
pub mod defaults;
pub mod error;
pub mod events;
pub mod ids;
pub mod models;
pub mod naming;
pub mod settings;
pub mod timestamp;
pub mod traits;
pub mod version;

// Re-export commonly used types
pub use collections::{
    NewNote, NewQuote, NewSummary, NewTask, Note, Notes, Quote, QuoteType, Quotes, Summaries,
    Summary, SummaryOrigin, SummaryType, Task, TaskPriority, TaskStatus, Tasks,
};
pub use error::{Error, Result};
pub use events::{Event, EventKind, EventPayload, Handler, HandlerFailure, NotificationBus};
pub use models::{
    CitationStyle, Job, JobId, JobStatus, JobType, ProjectConfig, SourceMeta, SourceType,
};
pub use settings::AppSettings;
pub use traits::{Collection, CollectionItem, Document, DocumentKind, GenerationBackend};
pub use version::{Version, CURRENT_SCHEMA_VERSION};
