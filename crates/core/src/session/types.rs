//! Session data model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A product that was validated and added to the broadcast's cart.
///
/// Created only by ingestion, never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveProduct {
    pub sku: String,
    pub title: String,
    pub image_url: String,
    pub price: String,
    pub shop_name: String,
}

/// A narration script for one product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AIScript {
    pub id: String,
    pub content: String,
    pub related_product_id: String,
}

/// One scheduled broadcast with its products and scripts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveSession {
    /// Broadcast (live room) id.
    pub id: String,
    pub title: String,
    /// Account the broadcast belongs to.
    pub account_ref: String,
    #[serde(default)]
    pub scheduled_start_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub products: Vec<LiveProduct>,
    #[serde(default)]
    pub scripts: Vec<AIScript>,
}

impl LiveSession {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        account_ref: impl Into<String>,
        scheduled_start_time: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            account_ref: account_ref.into(),
            scheduled_start_time,
            created_at: Utc::now(),
            products: Vec::new(),
            scripts: Vec::new(),
        }
    }

    pub fn product(&self, sku: &str) -> Option<&LiveProduct> {
        self.products.iter().find(|p| p.sku == sku)
    }

    /// Number of items in narration order.
    pub fn narration_len(&self) -> usize {
        if self.scripts.is_empty() {
            self.products.len()
        } else {
            self.scripts.len()
        }
    }

    /// The item narrated at `index`.
    ///
    /// Scripts define the order when present; otherwise products are narrated
    /// in ingestion order without a script.
    pub fn narration_item(&self, index: usize) -> Option<NarrationItem> {
        if self.scripts.is_empty() {
            let product = self.products.get(index)?;
            return Some(NarrationItem {
                index,
                product_id: product.sku.clone(),
                title: product.title.clone(),
                image_url: Some(product.image_url.clone()),
                script: None,
            });
        }

        let script = self.scripts.get(index)?;
        let product = self.product(&script.related_product_id);
        Some(NarrationItem {
            index,
            product_id: script.related_product_id.clone(),
            title: product.map(|p| p.title.clone()).unwrap_or_default(),
            image_url: product.map(|p| p.image_url.clone()),
            script: Some(script.content.clone()),
        })
    }
}

/// Derived view of one narration step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NarrationItem {
    pub index: usize,
    pub product_id: String,
    pub title: String,
    pub image_url: Option<String>,
    pub script: Option<String>,
}

/// Lightweight listing entry for session history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: String,
    pub title: String,
    pub account_ref: String,
    pub scheduled_start_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub product_count: usize,
    pub script_count: usize,
    pub active: bool,
}

impl SessionSummary {
    pub fn from_session(session: &LiveSession, active: bool) -> Self {
        Self {
            id: session.id.clone(),
            title: session.title.clone(),
            account_ref: session.account_ref.clone(),
            scheduled_start_time: session.scheduled_start_time,
            created_at: session.created_at,
            product_count: session.products.len(),
            script_count: session.scripts.len(),
            active,
        }
    }
}
