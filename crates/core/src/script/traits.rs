//! Text generator abstraction.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TextGenError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("JSON error: {0}")]
    Json(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Generator returned no text")]
    Empty,
}

/// Generates free text from a prompt.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generator name for logging.
    fn name(&self) -> &str;

    async fn generate(&self, prompt: &str) -> Result<String, TextGenError>;
}
