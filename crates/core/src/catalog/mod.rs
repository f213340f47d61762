//! Product catalog files: parsing ordered product id lists and managing the
//! imported files and their per-session quotas.

mod loader;
mod registry;
mod types;

pub use loader::{ProductCatalogLoader, TextCatalogLoader};
pub use registry::ProductFileRegistry;
pub use types::{CatalogError, ParsedCatalog, ProductFile, Quota};
