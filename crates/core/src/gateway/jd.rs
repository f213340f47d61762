//! JD live-commerce backend client.
//!
//! Write endpoints are JSON POSTs answered with the envelope
//! `{success, code, errorMsg, data}`. Read-only lookups are GETs; some of
//! them answer with the payload beside `success` instead of under `data`.
//! Credentials travel as a `Cookie` header taken verbatim from
//! configuration.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, COOKIE, REFERER};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{
    AccountInfo, CartAddOutcome, CommerceGateway, CreateLiveRequest, GatewayError, LiveStats,
    ProductDetail, RecentLiveRoom,
};
use crate::config::GatewayConfig;
use crate::metrics::GATEWAY_REQUEST_DURATION;

/// Backend messages meaning "a product is already on air".
const ALREADY_EXPLAINING_HINTS: &[&str] = &["already", "正在讲解", "讲解中"];

/// Backend messages meaning "nothing to end".
const NOT_STARTED_HINTS: &[&str] = &["not started", "未开始", "没有正在讲解", "未在讲解"];

/// JD live backend client.
pub struct JdGateway {
    client: Client,
    config: GatewayConfig,
    timeout: Duration,
}

impl JdGateway {
    /// Create a new client from gateway configuration.
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        let timeout = Duration::from_secs(config.timeout_secs as u64);

        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/json, text/plain, */*"),
        );
        let referer = format!("{}/", config.base_url.trim_end_matches('/'));
        headers.insert(
            REFERER,
            HeaderValue::from_str(&referer)
                .map_err(|e| GatewayError::Config(format!("invalid base_url: {}", e)))?,
        );
        if let Some(cookie) = config.cookie.as_deref().filter(|c| !c.is_empty()) {
            let mut value = HeaderValue::from_str(cookie)
                .map_err(|e| GatewayError::Config(format!("invalid cookie: {}", e)))?;
            value.set_sensitive(true);
            headers.insert(COOKIE, value);
        } else {
            warn!("No backend cookie configured; requests will be anonymous");
        }

        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            config,
            timeout,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// POST `body` to `path` and unwrap the response envelope.
    async fn post<B, T>(
        &self,
        operation: &'static str,
        path: &str,
        body: &B,
    ) -> Result<Option<T>, GatewayError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let text = self
            .timed(operation, self.client.post(self.url(path)).json(body))
            .await?;
        decode_envelope(&text)
    }

    /// GET `path` with `query` and return the raw body.
    async fn get(
        &self,
        operation: &'static str,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<String, GatewayError> {
        self.timed(operation, self.client.get(self.url(path)).query(query))
            .await
    }

    async fn timed(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<String, GatewayError> {
        let start = Instant::now();
        let result = self.send(request).await;
        let status = if result.is_ok() { "success" } else { "error" };
        GATEWAY_REQUEST_DURATION
            .with_label_values(&[operation, status])
            .observe(start.elapsed().as_secs_f64());

        let text = result?;
        debug!("{} response: {}", operation, text);
        Ok(text)
    }

    async fn send(&self, request: RequestBuilder) -> Result<String, GatewayError> {
        let response = request.send().await.map_err(|e| self.map_transport(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Api {
                code: status.as_u16().to_string(),
                message: body,
            });
        }

        response.text().await.map_err(|e| self.map_transport(e))
    }

    fn map_transport(&self, e: reqwest::Error) -> GatewayError {
        if e.is_timeout() {
            GatewayError::Timeout(self.timeout)
        } else {
            GatewayError::Http(e)
        }
    }
}

#[async_trait]
impl CommerceGateway for JdGateway {
    fn name(&self) -> &str {
        "jd"
    }

    async fn fetch_details(
        &self,
        live_id: &str,
        ids: &[String],
    ) -> Result<Vec<ProductDetail>, GatewayError> {
        let request = SkuListRequest {
            live_id,
            sku_ids: ids,
        };
        let data: Option<DetailsData> = self
            .post("fetch_details", &self.config.endpoints.details, &request)
            .await?;

        let details: Vec<ProductDetail> = data
            .map(|d| d.into_details())
            .unwrap_or_default();
        debug!(
            "Detail lookup for live {}: {} of {} ids valid",
            live_id,
            details.len(),
            ids.len()
        );
        Ok(details)
    }

    async fn add_to_cart(
        &self,
        live_id: &str,
        batch: &[ProductDetail],
    ) -> Result<CartAddOutcome, GatewayError> {
        let sku_ids: Vec<String> = batch.iter().map(|d| d.sku.clone()).collect();
        let request = SkuListRequest {
            live_id,
            sku_ids: &sku_ids,
        };
        let data: Option<CartAddData> = self
            .post("add_to_cart", &self.config.endpoints.add_to_cart, &request)
            .await?;

        let success_count = data
            .as_ref()
            .and_then(|d| d.success_count)
            .unwrap_or(batch.len())
            .min(batch.len());
        let error_message = data.and_then(|d| d.error_msg);
        info!(
            "Added {}/{} products to live {}",
            success_count,
            batch.len(),
            live_id
        );
        Ok(CartAddOutcome {
            success_count,
            error_message,
        })
    }

    async fn explain_begin(&self, live_id: &str, product_id: &str) -> Result<(), GatewayError> {
        let request = ExplainRequest {
            live_id,
            sku_id: product_id,
        };
        self.post::<_, serde_json::Value>(
            "explain_begin",
            &self.config.endpoints.explain_begin,
            &request,
        )
        .await
        .map_err(|e| classify_explain_error(e, product_id))?;
        info!("Explain started for {} on live {}", product_id, live_id);
        Ok(())
    }

    async fn explain_end(&self, live_id: &str, product_id: &str) -> Result<(), GatewayError> {
        let request = ExplainRequest {
            live_id,
            sku_id: product_id,
        };
        self.post::<_, serde_json::Value>(
            "explain_end",
            &self.config.endpoints.explain_end,
            &request,
        )
        .await
        .map_err(|e| classify_explain_error(e, product_id))?;
        info!("Explain ended for {} on live {}", product_id, live_id);
        Ok(())
    }

    async fn create_live_room(&self, request: &CreateLiveRequest) -> Result<String, GatewayError> {
        let data: Option<CreateLiveData> = self
            .post("create_live_room", &self.config.endpoints.live_create, request)
            .await?;

        let live_id = data
            .and_then(|d| d.live_id)
            .map(|id| value_to_string(&id))
            .filter(|id| !id.is_empty())
            .ok_or_else(|| GatewayError::Decode("live room created without an id".to_string()))?;
        info!("Created live room {} ({})", live_id, request.title);
        Ok(live_id)
    }

    async fn verify_login(&self) -> Result<AccountInfo, GatewayError> {
        let text = self
            .get("verify_login", &self.config.endpoints.account, &[])
            .await?;
        let account = decode_account(&text)?;
        if account.logged_in {
            info!(
                "Backend login verified for {}",
                account.nickname.as_deref().unwrap_or("unnamed account")
            );
        } else {
            warn!("Backend rejected the configured credentials");
        }
        Ok(account)
    }

    async fn recent_live_rooms(&self) -> Result<Vec<RecentLiveRoom>, GatewayError> {
        let text = self
            .get("recent_live_rooms", &self.config.endpoints.recent_rooms, &[])
            .await?;
        let data: Option<RecentRoomsData> = decode_envelope(&text)?;
        let rooms: Vec<RecentLiveRoom> = data
            .map(|d| d.live_list.into_iter().map(RawRoom::into_room).collect())
            .unwrap_or_default();
        debug!("{} recent live rooms", rooms.len());
        Ok(rooms)
    }

    async fn live_stats(&self, live_id: &str) -> Result<LiveStats, GatewayError> {
        let text = self
            .get(
                "live_stats",
                &self.config.endpoints.live_stats,
                &[("liveId", live_id)],
            )
            .await?;
        let data: Option<LiveStats> = decode_envelope(&text)?;
        Ok(data.unwrap_or_default())
    }

    async fn viewer_url(&self, live_id: &str) -> Result<String, GatewayError> {
        let text = self
            .get(
                "viewer_url",
                &self.config.endpoints.viewer_url,
                &[("liveId", live_id)],
            )
            .await?;
        decode_viewer_url(&text)
    }
}

/// Reclassify backend refusals that mean local state is out of sync.
fn classify_explain_error(error: GatewayError, product_id: &str) -> GatewayError {
    let GatewayError::Api { message, .. } = &error else {
        return error;
    };
    let lower = message.to_lowercase();
    if ALREADY_EXPLAINING_HINTS.iter().any(|h| lower.contains(h)) {
        GatewayError::AlreadyExplaining(product_id.to_string())
    } else if NOT_STARTED_HINTS.iter().any(|h| lower.contains(h)) {
        GatewayError::NotStarted(product_id.to_string())
    } else {
        error
    }
}

/// Unwrap `{success, code, errorMsg, data}`.
fn decode_envelope<T: DeserializeOwned>(text: &str) -> Result<Option<T>, GatewayError> {
    let envelope: Envelope<T> =
        serde_json::from_str(text).map_err(|e| GatewayError::Decode(e.to_string()))?;

    if envelope.success {
        Ok(envelope.data)
    } else {
        Err(GatewayError::Api {
            code: value_to_string(&envelope.code),
            message: envelope
                .error_msg
                .unwrap_or_else(|| "request rejected".to_string()),
        })
    }
}

/// `{success, authorInfo: {name, pic, pin}}`. Anything short of a
/// successful answer with author details means the login is not usable.
fn decode_account(text: &str) -> Result<AccountInfo, GatewayError> {
    let response: AuthorResponse =
        serde_json::from_str(text).map_err(|e| GatewayError::Decode(e.to_string()))?;

    match response.author_info {
        Some(author) if response.success => Ok(AccountInfo {
            logged_in: true,
            nickname: non_empty(author.name),
            avatar: non_empty(author.pic),
            account_ref: non_empty(value_to_string(&author.pin)),
        }),
        _ => Ok(AccountInfo::logged_out()),
    }
}

/// `{success, url}`.
fn decode_viewer_url(text: &str) -> Result<String, GatewayError> {
    let response: ViewerUrlResponse =
        serde_json::from_str(text).map_err(|e| GatewayError::Decode(e.to_string()))?;

    match response.url.filter(|u| !u.is_empty()) {
        Some(url) if response.success => Ok(url),
        _ => Err(GatewayError::Api {
            code: value_to_string(&response.code),
            message: response
                .error_msg
                .unwrap_or_else(|| "no viewer url returned".to_string()),
        }),
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

fn value_to_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

// ============================================================================
// Wire types (private)
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope<T> {
    success: bool,
    #[serde(default)]
    code: serde_json::Value,
    #[serde(default)]
    error_msg: Option<String>,
    data: Option<T>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SkuListRequest<'a> {
    live_id: &'a str,
    sku_ids: &'a [String],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExplainRequest<'a> {
    live_id: &'a str,
    sku_id: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DetailsData {
    List(Vec<RawSku>),
    Wrapped {
        #[serde(default, alias = "skuList", alias = "list")]
        sku_list: Vec<RawSku>,
    },
}

impl DetailsData {
    fn into_details(self) -> Vec<ProductDetail> {
        let raw = match self {
            DetailsData::List(list) => list,
            DetailsData::Wrapped { sku_list } => sku_list,
        };
        raw.into_iter().map(RawSku::into_detail).collect()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSku {
    #[serde(alias = "sku")]
    sku_id: serde_json::Value,
    #[serde(default, alias = "title")]
    sku_name: String,
    #[serde(default, alias = "imageUrl")]
    img_url: String,
    #[serde(default)]
    price: serde_json::Value,
    #[serde(default)]
    shop_name: String,
}

impl RawSku {
    fn into_detail(self) -> ProductDetail {
        ProductDetail {
            sku: value_to_string(&self.sku_id),
            title: self.sku_name,
            image_url: self.img_url,
            price: value_to_string(&self.price),
            shop_name: self.shop_name,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CartAddData {
    #[serde(default)]
    success_count: Option<usize>,
    #[serde(default)]
    error_msg: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateLiveData {
    #[serde(default)]
    live_id: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthorResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    author_info: Option<RawAuthor>,
}

#[derive(Debug, Deserialize)]
struct RawAuthor {
    #[serde(default)]
    name: String,
    #[serde(default)]
    pic: String,
    #[serde(default)]
    pin: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecentRoomsData {
    #[serde(default)]
    live_list: Vec<RawRoom>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRoom {
    live_id: serde_json::Value,
    #[serde(default)]
    title: String,
    #[serde(default)]
    cover_url: Option<String>,
    #[serde(default)]
    status: Option<i64>,
    #[serde(default)]
    start_time: serde_json::Value,
    #[serde(default)]
    end_time: serde_json::Value,
}

impl RawRoom {
    fn into_room(self) -> RecentLiveRoom {
        RecentLiveRoom {
            live_id: value_to_string(&self.live_id),
            title: self.title,
            cover_url: self.cover_url.filter(|u| !u.is_empty()),
            status: self.status,
            start_time: non_empty(value_to_string(&self.start_time)),
            end_time: non_empty(value_to_string(&self.end_time)),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ViewerUrlResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    code: serde_json::Value,
    #[serde(default)]
    error_msg: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_success_envelope() {
        let text = r#"{"success":true,"code":0,"errorMsg":null,"data":[{"skuId":100012,"skuName":"Kettle","imgUrl":"https://img/1.jpg","price":59.9,"shopName":"Home"}]}"#;
        let data: Option<DetailsData> = decode_envelope(text).unwrap();
        let details = data.unwrap().into_details();
        assert_eq!(details.len(), 1);
        assert_eq!(details[0].sku, "100012");
        assert_eq!(details[0].price, "59.9");
        assert_eq!(details[0].shop_name, "Home");
    }

    #[test]
    fn test_decode_wrapped_list() {
        let text = r#"{"success":true,"code":"0","data":{"skuList":[{"skuId":"2","skuName":"Mug"}]}}"#;
        let data: Option<DetailsData> = decode_envelope(text).unwrap();
        let details = data.unwrap().into_details();
        assert_eq!(details[0].sku, "2");
        assert_eq!(details[0].title, "Mug");
        assert!(details[0].image_url.is_empty());
    }

    #[test]
    fn test_decode_failure_envelope() {
        let text = r#"{"success":false,"code":401,"errorMsg":"login required"}"#;
        let result: Result<Option<serde_json::Value>, _> = decode_envelope(text);
        match result {
            Err(GatewayError::Api { code, message }) => {
                assert_eq!(code, "401");
                assert_eq!(message, "login required");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_decode_success_without_data() {
        let text = r#"{"success":true,"code":0}"#;
        let result: Option<CartAddData> = decode_envelope(text).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_decode_account() {
        let text = r#"{"success":true,"authorInfo":{"name":"Ann's Kitchen","pic":"https://img/a.jpg","pin":"ann_01"}}"#;
        let account = decode_account(text).unwrap();
        assert!(account.logged_in);
        assert_eq!(account.nickname.as_deref(), Some("Ann's Kitchen"));
        assert_eq!(account.avatar.as_deref(), Some("https://img/a.jpg"));
        assert_eq!(account.account_ref.as_deref(), Some("ann_01"));
    }

    #[test]
    fn test_decode_account_rejected() {
        let expired = r#"{"success":false,"code":"1001","errorMsg":"not logged in"}"#;
        assert_eq!(decode_account(expired).unwrap(), AccountInfo::logged_out());

        let no_author = r#"{"success":true}"#;
        assert!(!decode_account(no_author).unwrap().logged_in);

        assert!(matches!(decode_account("<html>"), Err(GatewayError::Decode(_))));
    }

    #[test]
    fn test_decode_recent_rooms() {
        let text = r#"{"success":true,"code":0,"data":{"liveList":[
            {"liveId":3001,"title":"Morning","coverUrl":"https://img/c.jpg","status":1,"startTime":1700000000000},
            {"liveId":"3002","title":"Evening","coverUrl":""}
        ]}}"#;
        let data: Option<RecentRoomsData> = decode_envelope(text).unwrap();
        let rooms: Vec<RecentLiveRoom> = data
            .unwrap()
            .live_list
            .into_iter()
            .map(RawRoom::into_room)
            .collect();

        assert_eq!(rooms.len(), 2);
        assert_eq!(rooms[0].live_id, "3001");
        assert_eq!(rooms[0].status, Some(1));
        assert_eq!(rooms[0].start_time.as_deref(), Some("1700000000000"));
        assert_eq!(rooms[1].live_id, "3002");
        assert!(rooms[1].cover_url.is_none());
        assert!(rooms[1].end_time.is_none());
    }

    #[test]
    fn test_decode_live_stats() {
        let text = r#"{"success":true,"data":{"onlineCount":120,"totalWatchCount":4500,"orderCount":12,"orderAmount":1288.5}}"#;
        let stats: LiveStats = decode_envelope(text).unwrap().unwrap();
        assert_eq!(stats.online_count, Some(120));
        assert_eq!(stats.total_watch_count, Some(4500));
        assert_eq!(stats.order_amount, Some(1288.5));
        assert!(stats.like_count.is_none());
    }

    #[test]
    fn test_decode_viewer_url() {
        let ok = r#"{"success":true,"url":"https://m.jd.com/live/3001"}"#;
        assert_eq!(decode_viewer_url(ok).unwrap(), "https://m.jd.com/live/3001");

        let missing = r#"{"success":true,"url":""}"#;
        assert!(matches!(decode_viewer_url(missing), Err(GatewayError::Api { .. })));

        let rejected = r#"{"success":false,"code":3,"errorMsg":"live not found"}"#;
        match decode_viewer_url(rejected) {
            Err(GatewayError::Api { code, message }) => {
                assert_eq!(code, "3");
                assert_eq!(message, "live not found");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_decode_garbage() {
        let result: Result<Option<serde_json::Value>, _> = decode_envelope("<html>");
        assert!(matches!(result, Err(GatewayError::Decode(_))));
    }

    #[test]
    fn test_classify_explain_conflicts() {
        let already = GatewayError::Api {
            code: "1".into(),
            message: "Product is already being explained".into(),
        };
        assert!(matches!(
            classify_explain_error(already, "42"),
            GatewayError::AlreadyExplaining(id) if id == "42"
        ));

        let not_started = GatewayError::Api {
            code: "1".into(),
            message: "当前商品未开始讲解".into(),
        };
        assert!(matches!(
            classify_explain_error(not_started, "42"),
            GatewayError::NotStarted(_)
        ));

        let other = GatewayError::Api {
            code: "1".into(),
            message: "system busy".into(),
        };
        assert!(matches!(
            classify_explain_error(other, "42"),
            GatewayError::Api { .. }
        ));
    }

    #[test]
    fn test_new_rejects_invalid_cookie() {
        let config = GatewayConfig {
            cookie: Some("bad\ncookie".to_string()),
            ..GatewayConfig::default()
        };
        assert!(matches!(JdGateway::new(config), Err(GatewayError::Config(_))));
    }

    #[test]
    fn test_url_joins_base_and_path() {
        let config = GatewayConfig {
            base_url: "https://example.test/".to_string(),
            ..GatewayConfig::default()
        };
        let gateway = JdGateway::new(config).unwrap();
        assert_eq!(
            gateway.url("/live/pc/explainBegin"),
            "https://example.test/live/pc/explainBegin"
        );
    }
}
