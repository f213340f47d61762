//! Batch ingestion of product files into a broadcast's cart.

mod config;
mod engine;
mod types;

pub use config::{IngestConfig, RetryPolicy};
pub use engine::BatchIngestionEngine;
pub use types::{FileReport, IngestError, IngestFailure, IngestStage, IngestionReport};
