//! Mock text generator for testing.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::script::{TextGenError, TextGenerator};

/// Mock implementation of the TextGenerator trait.
///
/// Queued responses are returned in order; once the queue is empty every
/// prompt gets a generated line mentioning the prompt length.
#[derive(Debug, Default)]
pub struct MockTextGenerator {
    responses: Mutex<VecDeque<Result<String, TextGenError>>>,
    prompts: Mutex<Vec<String>>,
}

impl MockTextGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_response(&self, response: Result<String, TextGenError>) {
        if let Ok(mut responses) = self.responses.lock() {
            responses.push_back(response);
        }
    }

    /// Prompts received, in order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl TextGenerator for MockTextGenerator {
    fn name(&self) -> &str {
        "mock"
    }

    async fn generate(&self, prompt: &str) -> Result<String, TextGenError> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        let queued = self
            .responses
            .lock()
            .ok()
            .and_then(|mut responses| responses.pop_front());
        queued.unwrap_or_else(|| Ok(format!("Generated script ({} chars of prompt)", prompt.len())))
    }
}
