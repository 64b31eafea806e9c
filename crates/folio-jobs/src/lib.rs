//! # folio-jobs
//!
//! Background model jobs for folio.
//!
//! This crate provides:
//! - [`JobQueue`]: a FIFO queue served by one lazily started worker thread
//! - Write-back of completed job results into source collections and metadata
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use folio_core::{JobType, NotificationBus};
//! use folio_inference::OllamaBackend;
//! use folio_jobs::{JobQueue, QueueConfig};
//!
//! let backend = Arc::new(OllamaBackend::from_env()?);
//! let bus = Arc::new(NotificationBus::new());
//! let queue = JobQueue::new(backend, bus, QueueConfig::default());
//!
//! let id = queue.add_job(JobType::Summarize, text, Default::default());
//! let job = queue.wait_for(&id, std::time::Duration::from_secs(180));
//! queue.stop();
//! ```

pub mod queue;
pub mod writeback;

pub use queue::{JobQueue, QueueConfig};
pub use writeback::{parse_quotes, store_metadata, store_quotes, store_summary};
