//! Testing utilities and mock implementations.
//!
//! Mocks for every external seam (commerce backend, text generator, session
//! persistence, surface windows), so the engine, controller and hub can be
//! exercised end to end without a backend or a display.
//!
//! # Example
//!
//! ```rust,ignore
//! use livedeck_core::testing::{fixtures, MockGateway};
//!
//! let gateway = Arc::new(MockGateway::new());
//! gateway.mark_invalid(&["1003"]).await;
//!
//! let files = vec![fixtures::product_file("a.csv", &["1001", "1003"], Quota::All)];
//! let report = engine.ingest(&files, 8).await?;
//! ```

mod mock_gateway;
mod mock_persistence;
mod mock_text_generator;
mod mock_window_manager;

pub use mock_gateway::MockGateway;
pub use mock_persistence::MockPersistence;
pub use mock_text_generator::MockTextGenerator;
pub use mock_window_manager::MockWindowManager;

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::catalog::{ProductFile, Quota};
    use crate::session::{AIScript, LiveProduct};

    /// A cart-added product as the mock gateway would produce it.
    pub fn product(sku: &str) -> LiveProduct {
        super::mock_gateway::detail_for(sku).into()
    }

    /// A product file with the given ids in order.
    pub fn product_file(name: &str, ids: &[&str], quota: Quota) -> ProductFile {
        let ordered_product_ids: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
        ProductFile {
            id: format!("file-{}", name),
            name: name.to_string(),
            total_count: ordered_product_ids.len(),
            unique_count: ordered_product_ids.len(),
            ordered_product_ids,
            per_session_quota: quota,
        }
    }

    /// A narration script for `sku`.
    pub fn script(sku: &str, content: &str) -> AIScript {
        AIScript {
            id: format!("script-{}", sku),
            content: content.to_string(),
            related_product_id: sku.to_string(),
        }
    }
}
