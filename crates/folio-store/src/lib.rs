//! # folio-store
//!
//! Folder-based persistence for folio.
//!
//! This crate provides:
//! - [`DocumentStore`]: validated, atomic JSON document IO
//! - [`SchemaRegistry`]: per-kind JSON Schemas and extra checks
//! - [`ProjectRepository`] and [`SourceRepository`]: the project folder layout
//! - [`RecentProjects`]: most-recently-opened tracking backed by settings

pub mod document;
pub mod project;
pub mod recent;
pub mod schema;
pub mod source;

pub use document::{write_atomic, DocumentStore};
pub use project::{Project, ProjectRepository, SourceRef};
pub use recent::RecentProjects;
pub use schema::{DocumentCheck, Schema, SchemaRegistry};
pub use source::{Source, SourceRepository};
