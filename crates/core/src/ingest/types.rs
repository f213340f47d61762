//! Ingestion report types.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("No active session to ingest into")]
    NoActiveSession,
}

/// Which backend call a skipped step was making.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestStage {
    FetchDetails,
    AddToCart,
    /// Cart-added products whose session disappeared mid-run.
    AppendToSession,
}

impl IngestStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            IngestStage::FetchDetails => "fetch_details",
            IngestStage::AddToCart => "add_to_cart",
            IngestStage::AppendToSession => "append_to_session",
        }
    }
}

/// A chunk or batch that was skipped after exhausting its retries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestFailure {
    pub file_name: String,
    pub stage: IngestStage,
    /// Ids in the skipped chunk or batch.
    pub product_ids: Vec<String>,
    pub attempts: u32,
    pub message: String,
}

/// Per-file counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileReport {
    pub file_id: String,
    pub file_name: String,
    /// Ids eligible under the file's quota.
    pub selected: usize,
    /// Ids sent to detail lookup.
    pub fetched: usize,
    pub success: usize,
    pub invalid: usize,
}

/// Outcome of one ingestion run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestionReport {
    pub session_id: String,
    pub files: Vec<FileReport>,
    pub success: usize,
    pub target: usize,
    pub failures: Vec<IngestFailure>,
    /// All files were used up before reaching the target.
    pub partial: bool,
}

impl IngestionReport {
    pub fn invalid(&self) -> usize {
        self.files.iter().map(|f| f.invalid).sum()
    }
}
