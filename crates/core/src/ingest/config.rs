use serde::{Deserialize, Serialize};

/// Batch ingestion configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Extra ids requested per detail lookup once a file has shown invalid
    /// ids, to compensate for the ones the backend drops.
    #[serde(default = "default_overfetch_margin")]
    pub overfetch_margin: usize,
    /// Upper bound on ids per detail lookup.
    #[serde(default = "default_max_fetch_size")]
    pub max_fetch_size: usize,
    /// Upper bound on products per add-to-cart call.
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
    #[serde(default)]
    pub retry: RetryPolicy,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            overfetch_margin: default_overfetch_margin(),
            max_fetch_size: default_max_fetch_size(),
            max_batch_size: default_max_batch_size(),
            retry: RetryPolicy::default(),
        }
    }
}

fn default_overfetch_margin() -> usize {
    20
}

fn default_max_fetch_size() -> usize {
    100
}

fn default_max_batch_size() -> usize {
    150
}

/// What to do when a detail lookup or cart add fails.
///
/// `max_attempts = 1` means skip the chunk (or batch) after logging it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles for each further attempt.
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

fn default_max_attempts() -> u32 {
    1
}

fn default_backoff_ms() -> u64 {
    500
}

impl RetryPolicy {
    /// Delay before attempt number `attempt + 1`.
    pub fn backoff(&self, attempt: u32) -> std::time::Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(16);
        std::time::Duration::from_millis(self.backoff_ms.saturating_mul(factor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_defaults() {
        let config = IngestConfig::default();
        assert_eq!(config.overfetch_margin, 20);
        assert_eq!(config.max_fetch_size, 100);
        assert_eq!(config.max_batch_size, 150);
        assert_eq!(config.retry.max_attempts, 1);
    }

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy {
            max_attempts: 4,
            backoff_ms: 100,
        };
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(400));
    }
}
