//! Thin async wrapper over the OpenAI-compatible Batch API.
//!
//! Exposes the handful of remote operations the batch orchestrator needs: uploading
//! a JSONL file, creating a batch from it, polling a batch's status, downloading its
//! output/error file, cancelling it, and deleting a file. Everything else the
//! provider API offers (assistants, chat streaming, images, ...) is out of scope --
//! the orchestrator only ever drives batches.
//!
//! ```no_run
//! use batch_provider_client::{Client, config::OpenAIConfig};
//!
//! let client = Client::with_config(OpenAIConfig::new().with_api_key("sk-..."));
//! ```
mod batches;
mod client;
pub mod config;
pub mod error;
mod file;
pub mod request_options;
pub mod types;
mod util;

pub use batches::Batches;
pub use client::Client;
pub use file::Files;
pub use request_options::RequestOptions;
