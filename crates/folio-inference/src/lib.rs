//! # folio-inference
//!
//! Model-server access for folio.
//!
//! This crate provides:
//! - [`OllamaBackend`], the [`GenerationBackend`](folio_core::GenerationBackend)
//!   implementation for a local Ollama server
//! - Prompt templates for each [`JobType`](folio_core::JobType)
//!
//! # Example
//!
//! ```rust,no_run
//! use folio_core::GenerationBackend;
//! use folio_inference::OllamaBackend;
//!
//! #[tokio::main]
//! async fn main() -> folio_core::Result<()> {
//!     let backend = OllamaBackend::from_env()?;
//!     if backend.is_available().await {
//!         let text = backend.generate(None, "Say hello").await?;
//!         println!("{}", text);
//!     }
//!     Ok(())
//! }
//! ```

pub mod ollama;
pub mod prompts;

pub use ollama::OllamaBackend;
pub use prompts::{build_prompt, truncate_chars};
