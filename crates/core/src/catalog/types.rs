//! Product catalog types.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while importing or managing product files.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Content has rows but none of them carries a product id.
    #[error("invalid catalog format: {0}")]
    InvalidFormat(String),

    /// Content has no rows at all.
    #[error("catalog is empty: {0}")]
    Empty(String),

    #[error("product file not found: {0}")]
    FileNotFound(String),
}

/// How many ids of a file one ingestion run may use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quota {
    /// Use every id in the file.
    #[default]
    All,
    /// Use at most this many ids, from the top of the file.
    Limit(usize),
}

impl Quota {
    /// Number of ids to take from a file with `available` ids.
    pub fn take(&self, available: usize) -> usize {
        match self {
            Quota::All => available,
            Quota::Limit(n) => (*n).min(available),
        }
    }
}

/// Result of parsing one catalog file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCatalog {
    /// Ids in file order, de-duplicated within the file.
    pub product_ids: Vec<String>,
    /// Id occurrences before de-duplication.
    pub total_count: usize,
    pub unique_count: usize,
}

/// An imported, ordered list of product ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductFile {
    pub id: String,
    pub name: String,
    pub ordered_product_ids: Vec<String>,
    pub total_count: usize,
    pub unique_count: usize,
    pub per_session_quota: Quota,
}

impl ProductFile {
    pub fn from_parsed(name: impl Into<String>, parsed: ParsedCatalog) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            ordered_product_ids: parsed.product_ids,
            total_count: parsed.total_count,
            unique_count: parsed.unique_count,
            per_session_quota: Quota::All,
        }
    }

    /// Ids eligible for one ingestion run: the first `quota` ids.
    pub fn selected_ids(&self) -> &[String] {
        let n = self.per_session_quota.take(self.ordered_product_ids.len());
        &self.ordered_product_ids[..n]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(ids: &[&str], quota: Quota) -> ProductFile {
        ProductFile {
            id: "f".to_string(),
            name: "f.csv".to_string(),
            ordered_product_ids: ids.iter().map(|s| s.to_string()).collect(),
            total_count: ids.len(),
            unique_count: ids.len(),
            per_session_quota: quota,
        }
    }

    #[test]
    fn test_quota_all_selects_everything() {
        let f = file(&["1", "2", "3"], Quota::All);
        assert_eq!(f.selected_ids().len(), 3);
    }

    #[test]
    fn test_quota_limit_takes_prefix() {
        let f = file(&["1", "2", "3"], Quota::Limit(2));
        assert_eq!(f.selected_ids(), &["1".to_string(), "2".to_string()]);
    }

    #[test]
    fn test_quota_larger_than_file() {
        let f = file(&["1"], Quota::Limit(10));
        assert_eq!(f.selected_ids().len(), 1);
    }

    #[test]
    fn test_quota_serde() {
        assert_eq!(serde_json::to_string(&Quota::All).unwrap(), "\"all\"");
        assert_eq!(
            serde_json::to_string(&Quota::Limit(5)).unwrap(),
            "{\"limit\":5}"
        );
        let q: Quota = serde_json::from_str("{\"limit\":3}").unwrap();
        assert_eq!(q, Quota::Limit(3));
    }
}
