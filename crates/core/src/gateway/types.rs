//! Gateway request and response types.

use serde::{Deserialize, Serialize};

use crate::session::LiveProduct;

/// Product details as returned by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDetail {
    #[serde(alias = "skuId")]
    pub sku: String,
    #[serde(alias = "skuName")]
    pub title: String,
    #[serde(default, alias = "imgUrl")]
    pub image_url: String,
    #[serde(default)]
    pub price: String,
    #[serde(default)]
    pub shop_name: String,
}

impl From<ProductDetail> for LiveProduct {
    fn from(detail: ProductDetail) -> Self {
        LiveProduct {
            sku: detail.sku,
            title: detail.title,
            image_url: detail.image_url,
            price: detail.price,
            shop_name: detail.shop_name,
        }
    }
}

/// Result of one add-to-cart call.
///
/// `success_count` counts from the front of the batch: the first
/// `success_count` products were added.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartAddOutcome {
    pub success_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Live room creation parameters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLiveRequest {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
}

/// The broadcaster account the configured credentials belong to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountInfo {
    pub logged_in: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    /// Backend account pin; the default account reference for new sessions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_ref: Option<String>,
}

impl AccountInfo {
    /// Credentials missing, expired or rejected.
    pub fn logged_out() -> Self {
        Self::default()
    }
}

/// A live room the broadcaster used recently.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentLiveRoom {
    pub live_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
}

/// Real-time audience and sales figures for a broadcast. Fields the backend
/// leaves out stay `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveStats {
    #[serde(default)]
    pub online_count: Option<u64>,
    #[serde(default)]
    pub total_watch_count: Option<u64>,
    #[serde(default)]
    pub like_count: Option<u64>,
    #[serde(default)]
    pub comment_count: Option<u64>,
    #[serde(default)]
    pub share_count: Option<u64>,
    #[serde(default)]
    pub order_count: Option<u64>,
    #[serde(default)]
    pub order_amount: Option<f64>,
}
