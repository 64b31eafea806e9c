//! Per-source collection documents.
//!
//! Each source folder holds four collections (notes, quotes, tasks,
//! summaries) sharing the [`Collection`](crate::traits::Collection) contract.
//! A project additionally holds its own notes and tasks.

pub mod notes;
pub mod quotes;
pub mod summaries;
pub mod tasks;

pub use notes::{NewNote, Note, Notes};
pub use quotes::{NewQuote, Quote, QuoteType, Quotes};
pub use summaries::{NewSummary, Summaries, Summary, SummaryOrigin, SummaryType};
pub use tasks::{NewTask, Task, TaskPriority, TaskStatus, Tasks};
