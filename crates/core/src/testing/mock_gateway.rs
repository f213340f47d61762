//! Mock commerce gateway for testing.

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::gateway::{
    AccountInfo, CartAddOutcome, CommerceGateway, CreateLiveRequest, GatewayError, LiveStats,
    ProductDetail, RecentLiveRoom,
};

/// Mock implementation of the CommerceGateway trait.
///
/// Provides controllable behavior for testing:
/// - Mark product ids the backend does not know
/// - Queue failures (or explicit successes) for upcoming calls of a kind
/// - Cap how many products one cart add accepts
/// - Run a hook inside each cart add
/// - Script the account, recent rooms and live stats lookups
/// - Record every call for assertions
///
/// # Example
///
/// ```rust,ignore
/// use livedeck_core::testing::MockGateway;
///
/// let gateway = MockGateway::new();
/// gateway.mark_invalid(&["1003"]).await;
/// gateway.push_cart_error(GatewayError::Timeout(Duration::from_secs(1))).await;
///
/// // ... run ingestion ...
///
/// assert_eq!(gateway.cart_calls().await.len(), 2);
/// ```
#[derive(Debug)]
pub struct MockGateway {
    invalid: Arc<RwLock<HashSet<String>>>,
    /// `None` entries let that call succeed.
    fetch_errors: Arc<RwLock<VecDeque<Option<GatewayError>>>>,
    cart_errors: Arc<RwLock<VecDeque<Option<GatewayError>>>>,
    explain_errors: Arc<RwLock<VecDeque<GatewayError>>>,
    cart_hook: Arc<RwLock<Option<CartHook>>>,
    /// Simulated latency of explain begin/end.
    explain_delay: Arc<RwLock<Option<Duration>>>,
    /// Maximum products accepted per cart add.
    cart_limit: Arc<RwLock<Option<usize>>>,
    fetch_calls: Arc<RwLock<Vec<Vec<String>>>>,
    cart_calls: Arc<RwLock<Vec<Vec<String>>>>,
    explain_calls: Arc<RwLock<Vec<(String, String)>>>,
    created_rooms: Arc<RwLock<Vec<CreateLiveRequest>>>,
    account: Arc<RwLock<AccountInfo>>,
    recent_rooms: Arc<RwLock<Vec<RecentLiveRoom>>>,
    live_stats: Arc<RwLock<HashMap<String, LiveStats>>>,
    /// Shared by the read-only lookups.
    lookup_errors: Arc<RwLock<VecDeque<GatewayError>>>,
}

#[derive(Clone)]
struct CartHook(Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>);

impl fmt::Debug for CartHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CartHook")
    }
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl MockGateway {
    pub fn new() -> Self {
        Self {
            invalid: Arc::new(RwLock::new(HashSet::new())),
            fetch_errors: Arc::new(RwLock::new(VecDeque::new())),
            cart_errors: Arc::new(RwLock::new(VecDeque::new())),
            explain_errors: Arc::new(RwLock::new(VecDeque::new())),
            cart_hook: Arc::new(RwLock::new(None)),
            explain_delay: Arc::new(RwLock::new(None)),
            cart_limit: Arc::new(RwLock::new(None)),
            fetch_calls: Arc::new(RwLock::new(Vec::new())),
            cart_calls: Arc::new(RwLock::new(Vec::new())),
            explain_calls: Arc::new(RwLock::new(Vec::new())),
            created_rooms: Arc::new(RwLock::new(Vec::new())),
            account: Arc::new(RwLock::new(AccountInfo {
                logged_in: true,
                nickname: Some("Mock Broadcaster".to_string()),
                avatar: None,
                account_ref: Some("mock-account".to_string()),
            })),
            recent_rooms: Arc::new(RwLock::new(Vec::new())),
            live_stats: Arc::new(RwLock::new(HashMap::new())),
            lookup_errors: Arc::new(RwLock::new(VecDeque::new())),
        }
    }

    /// Ids the backend omits from detail lookups.
    pub async fn mark_invalid(&self, ids: &[&str]) {
        let mut invalid = self.invalid.write().await;
        invalid.extend(ids.iter().map(|id| id.to_string()));
    }

    /// Fail the next unscripted detail lookup with `error`.
    pub async fn push_fetch_error(&self, error: GatewayError) {
        self.fetch_errors.write().await.push_back(Some(error));
    }

    /// Let the next unscripted detail lookup succeed.
    pub async fn push_fetch_ok(&self) {
        self.fetch_errors.write().await.push_back(None);
    }

    /// Fail the next unscripted cart add with `error`.
    pub async fn push_cart_error(&self, error: GatewayError) {
        self.cart_errors.write().await.push_back(Some(error));
    }

    /// Let the next unscripted cart add succeed.
    pub async fn push_cart_ok(&self) {
        self.cart_errors.write().await.push_back(None);
    }

    /// Run `hook` at the start of every cart add.
    pub async fn on_cart_add<F, Fut>(&self, hook: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        *self.cart_hook.write().await = Some(CartHook(Arc::new(move || hook().boxed())));
    }

    /// Fail the next explain begin or end with `error`.
    pub async fn push_explain_error(&self, error: GatewayError) {
        self.explain_errors.write().await.push_back(error);
    }

    pub async fn set_explain_delay(&self, delay: Option<Duration>) {
        *self.explain_delay.write().await = delay;
    }

    pub async fn set_cart_limit(&self, limit: Option<usize>) {
        *self.cart_limit.write().await = limit;
    }

    /// Account reported by `verify_login`. Starts logged in.
    pub async fn set_account(&self, account: AccountInfo) {
        *self.account.write().await = account;
    }

    pub async fn set_recent_rooms(&self, rooms: Vec<RecentLiveRoom>) {
        *self.recent_rooms.write().await = rooms;
    }

    /// Figures reported for `live_id`. Unknown broadcasts report defaults.
    pub async fn set_live_stats(&self, live_id: &str, stats: LiveStats) {
        self.live_stats
            .write()
            .await
            .insert(live_id.to_string(), stats);
    }

    /// Fail the next account, recent rooms, stats or viewer url lookup.
    pub async fn push_lookup_error(&self, error: GatewayError) {
        self.lookup_errors.write().await.push_back(error);
    }

    /// Ids requested per detail lookup, in call order.
    pub async fn fetch_calls(&self) -> Vec<Vec<String>> {
        self.fetch_calls.read().await.clone()
    }

    /// Skus sent per cart add attempt, failed attempts included.
    pub async fn cart_calls(&self) -> Vec<Vec<String>> {
        self.cart_calls.read().await.clone()
    }

    /// `("begin" | "end", product_id)` per explain call, failed ones included.
    pub async fn explain_calls(&self) -> Vec<(String, String)> {
        self.explain_calls.read().await.clone()
    }

    pub async fn created_rooms(&self) -> Vec<CreateLiveRequest> {
        self.created_rooms.read().await.clone()
    }

    async fn next_lookup_error(&self) -> Result<(), GatewayError> {
        match self.lookup_errors.write().await.pop_front() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn record_explain(&self, kind: &str, product_id: &str) -> Result<(), GatewayError> {
        let delay = *self.explain_delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.explain_calls
            .write()
            .await
            .push((kind.to_string(), product_id.to_string()));
        match self.explain_errors.write().await.pop_front() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

/// Details the mock backend returns for `sku`.
pub fn detail_for(sku: &str) -> ProductDetail {
    ProductDetail {
        sku: sku.to_string(),
        title: format!("Product {}", sku),
        image_url: format!("https://img.example/{}.jpg", sku),
        price: "19.90".to_string(),
        shop_name: "Mock Shop".to_string(),
    }
}

#[async_trait]
impl CommerceGateway for MockGateway {
    fn name(&self) -> &str {
        "mock"
    }

    async fn fetch_details(
        &self,
        _live_id: &str,
        ids: &[String],
    ) -> Result<Vec<ProductDetail>, GatewayError> {
        self.fetch_calls.write().await.push(ids.to_vec());

        if let Some(error) = self.fetch_errors.write().await.pop_front().flatten() {
            return Err(error);
        }

        let invalid = self.invalid.read().await;
        Ok(ids
            .iter()
            .filter(|id| !invalid.contains(id.as_str()))
            .map(|id| detail_for(id))
            .collect())
    }

    async fn add_to_cart(
        &self,
        _live_id: &str,
        batch: &[ProductDetail],
    ) -> Result<CartAddOutcome, GatewayError> {
        let hook = self.cart_hook.read().await.clone();
        if let Some(CartHook(hook)) = hook {
            hook().await;
        }

        self.cart_calls
            .write()
            .await
            .push(batch.iter().map(|d| d.sku.clone()).collect());

        if let Some(error) = self.cart_errors.write().await.pop_front().flatten() {
            return Err(error);
        }

        let accepted = match *self.cart_limit.read().await {
            Some(limit) => batch.len().min(limit),
            None => batch.len(),
        };
        let error_message = (accepted < batch.len())
            .then(|| format!("Cart accepted {} of {} products", accepted, batch.len()));
        Ok(CartAddOutcome {
            success_count: accepted,
            error_message,
        })
    }

    async fn explain_begin(&self, _live_id: &str, product_id: &str) -> Result<(), GatewayError> {
        self.record_explain("begin", product_id).await
    }

    async fn explain_end(&self, _live_id: &str, product_id: &str) -> Result<(), GatewayError> {
        self.record_explain("end", product_id).await
    }

    async fn create_live_room(&self, request: &CreateLiveRequest) -> Result<String, GatewayError> {
        let mut rooms = self.created_rooms.write().await;
        rooms.push(request.clone());
        Ok(format!("mock-live-{}", rooms.len()))
    }

    async fn verify_login(&self) -> Result<AccountInfo, GatewayError> {
        self.next_lookup_error().await?;
        Ok(self.account.read().await.clone())
    }

    async fn recent_live_rooms(&self) -> Result<Vec<RecentLiveRoom>, GatewayError> {
        self.next_lookup_error().await?;
        Ok(self.recent_rooms.read().await.clone())
    }

    async fn live_stats(&self, live_id: &str) -> Result<LiveStats, GatewayError> {
        self.next_lookup_error().await?;
        Ok(self
            .live_stats
            .read()
            .await
            .get(live_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn viewer_url(&self, live_id: &str) -> Result<String, GatewayError> {
        self.next_lookup_error().await?;
        Ok(format!("https://live.example/{}", live_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_invalid_ids_are_omitted() {
        let gateway = MockGateway::new();
        gateway.mark_invalid(&["2"]).await;

        let ids = vec!["1".to_string(), "2".to_string(), "3".to_string()];
        let details = gateway.fetch_details("live", &ids).await.unwrap();
        let skus: Vec<&str> = details.iter().map(|d| d.sku.as_str()).collect();
        assert_eq!(skus, vec!["1", "3"]);
        assert_eq!(gateway.fetch_calls().await, vec![ids]);
    }

    #[tokio::test]
    async fn test_queued_errors_are_consumed_once() {
        let gateway = MockGateway::new();
        gateway
            .push_explain_error(GatewayError::NotStarted("1".into()))
            .await;

        assert!(gateway.explain_end("live", "1").await.is_err());
        assert!(gateway.explain_end("live", "1").await.is_ok());
        assert_eq!(gateway.explain_calls().await.len(), 2);
    }

    #[tokio::test]
    async fn test_scripted_steps_run_in_order() {
        let gateway = MockGateway::new();
        gateway.push_cart_ok().await;
        gateway
            .push_cart_error(GatewayError::Decode("bad".into()))
            .await;

        let batch = vec![detail_for("1")];
        assert!(gateway.add_to_cart("live", &batch).await.is_ok());
        assert!(gateway.add_to_cart("live", &batch).await.is_err());
        assert!(gateway.add_to_cart("live", &batch).await.is_ok());
    }

    #[tokio::test]
    async fn test_lookups_report_scripted_values() {
        let gateway = MockGateway::new();
        assert!(gateway.verify_login().await.unwrap().logged_in);

        gateway.set_account(AccountInfo::logged_out()).await;
        gateway
            .set_live_stats(
                "live-1",
                LiveStats {
                    online_count: Some(40),
                    ..LiveStats::default()
                },
            )
            .await;
        gateway
            .push_lookup_error(GatewayError::Timeout(Duration::from_secs(1)))
            .await;

        assert!(gateway.live_stats("live-1").await.is_err());
        assert_eq!(
            gateway.live_stats("live-1").await.unwrap().online_count,
            Some(40)
        );
        assert_eq!(gateway.live_stats("other").await.unwrap(), LiveStats::default());
        assert!(!gateway.verify_login().await.unwrap().logged_in);
    }

    #[tokio::test]
    async fn test_cart_limit() {
        let gateway = MockGateway::new();
        gateway.set_cart_limit(Some(2)).await;

        let batch = vec![detail_for("1"), detail_for("2"), detail_for("3")];
        let outcome = gateway.add_to_cart("live", &batch).await.unwrap();
        assert_eq!(outcome.success_count, 2);
        assert!(outcome.error_message.is_some());
    }
}
