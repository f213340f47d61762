//! Commerce backend gateway.
//!
//! The gateway carries the broadcaster's session credentials and exposes the
//! handful of backend calls the orchestrator needs: product detail lookup,
//! cart adds, explain begin/end, live room creation, plus the read-only
//! account and broadcast lookups the control panel shows.

mod jd;
mod types;

pub use jd::JdGateway;
pub use types::*;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur when talking to the commerce backend.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Backend answered with `success: false`.
    #[error("Backend error {code}: {message}")]
    Api { code: String, message: String },

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Response body did not match the expected envelope.
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// Gateway misconfigured (e.g. credentials that are not a valid header).
    #[error("Gateway not configured: {0}")]
    Config(String),

    /// Explain begin refused because a product is already being explained.
    #[error("Product {0} is already being explained")]
    AlreadyExplaining(String),

    /// Explain end refused because no explain was running.
    #[error("Explain for product {0} was not started")]
    NotStarted(String),
}

impl GatewayError {
    /// Conflicts between local and backend explain state.
    pub fn is_state_conflict(&self) -> bool {
        matches!(
            self,
            GatewayError::AlreadyExplaining(_) | GatewayError::NotStarted(_)
        )
    }
}

/// Calls to the commerce backend for one broadcast.
#[async_trait]
pub trait CommerceGateway: Send + Sync {
    /// Name of this backend (for logging).
    fn name(&self) -> &str;

    /// Look up product details. Unknown or invalid ids are silently
    /// omitted, so the result may be shorter than `ids`.
    async fn fetch_details(
        &self,
        live_id: &str,
        ids: &[String],
    ) -> Result<Vec<ProductDetail>, GatewayError>;

    /// Add products to the broadcast's shopping bag.
    async fn add_to_cart(
        &self,
        live_id: &str,
        batch: &[ProductDetail],
    ) -> Result<CartAddOutcome, GatewayError>;

    /// Mark `product_id` as being explained on air.
    async fn explain_begin(&self, live_id: &str, product_id: &str) -> Result<(), GatewayError>;

    /// Stop explaining `product_id`.
    async fn explain_end(&self, live_id: &str, product_id: &str) -> Result<(), GatewayError>;

    /// Create a live room and return its id.
    async fn create_live_room(&self, request: &CreateLiveRequest) -> Result<String, GatewayError>;

    /// Check the configured credentials. A rejected login is
    /// `Ok(AccountInfo { logged_in: false, .. })`, not an error.
    async fn verify_login(&self) -> Result<AccountInfo, GatewayError>;

    /// Live rooms the account used recently, as the backend orders them.
    async fn recent_live_rooms(&self) -> Result<Vec<RecentLiveRoom>, GatewayError>;

    /// Real-time figures for a broadcast.
    async fn live_stats(&self, live_id: &str) -> Result<LiveStats, GatewayError>;

    /// Public viewer page for a broadcast.
    async fn viewer_url(&self, live_id: &str) -> Result<String, GatewayError>;
}
