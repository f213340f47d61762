//! Imported product files.

use tokio::sync::RwLock;
use tracing::info;

use super::{CatalogError, ParsedCatalog, ProductFile, Quota};

/// Ordered set of imported product files.
#[derive(Default)]
pub struct ProductFileRegistry {
    files: RwLock<Vec<ProductFile>>,
}

impl ProductFileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a parsed file. New files use every id until a quota is set.
    pub async fn import(&self, name: &str, parsed: ParsedCatalog) -> ProductFile {
        let file = ProductFile::from_parsed(name, parsed);
        info!(
            "Imported product file {} ({} ids, {} unique)",
            file.name, file.total_count, file.unique_count
        );
        self.files.write().await.push(file.clone());
        file
    }

    pub async fn list(&self) -> Vec<ProductFile> {
        self.files.read().await.clone()
    }

    pub async fn get(&self, id: &str) -> Option<ProductFile> {
        self.files.read().await.iter().find(|f| f.id == id).cloned()
    }

    pub async fn set_quota(&self, id: &str, quota: Quota) -> Result<ProductFile, CatalogError> {
        let mut files = self.files.write().await;
        let file = files
            .iter_mut()
            .find(|f| f.id == id)
            .ok_or_else(|| CatalogError::FileNotFound(id.to_string()))?;
        file.per_session_quota = quota;
        Ok(file.clone())
    }

    pub async fn remove(&self, id: &str) -> Result<ProductFile, CatalogError> {
        let mut files = self.files.write().await;
        let pos = files
            .iter()
            .position(|f| f.id == id)
            .ok_or_else(|| CatalogError::FileNotFound(id.to_string()))?;
        Ok(files.remove(pos))
    }

    /// Files for an ingestion run: all files in import order, or the given
    /// ids in the given order.
    pub async fn select(&self, ids: Option<&[String]>) -> Result<Vec<ProductFile>, CatalogError> {
        let files = self.files.read().await;
        match ids {
            None => Ok(files.clone()),
            Some(ids) => ids
                .iter()
                .map(|id| {
                    files
                        .iter()
                        .find(|f| &f.id == id)
                        .cloned()
                        .ok_or_else(|| CatalogError::FileNotFound(id.clone()))
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parsed(ids: &[&str]) -> ParsedCatalog {
        ParsedCatalog {
            product_ids: ids.iter().map(|s| s.to_string()).collect(),
            total_count: ids.len(),
            unique_count: ids.len(),
        }
    }

    #[tokio::test]
    async fn test_import_and_list() {
        let registry = ProductFileRegistry::new();
        let a = registry.import("a.csv", parsed(&["1", "2"])).await;
        registry.import("b.csv", parsed(&["3"])).await;

        let files = registry.list().await;
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].id, a.id);
        assert_eq!(files[0].per_session_quota, Quota::All);
    }

    #[tokio::test]
    async fn test_set_quota_and_remove() {
        let registry = ProductFileRegistry::new();
        let a = registry.import("a.csv", parsed(&["1", "2"])).await;

        let updated = registry.set_quota(&a.id, Quota::Limit(1)).await.unwrap();
        assert_eq!(updated.selected_ids().len(), 1);

        registry.remove(&a.id).await.unwrap();
        assert!(registry.get(&a.id).await.is_none());
        assert!(matches!(
            registry.remove(&a.id).await,
            Err(CatalogError::FileNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_select_in_requested_order() {
        let registry = ProductFileRegistry::new();
        let a = registry.import("a.csv", parsed(&["1"])).await;
        let b = registry.import("b.csv", parsed(&["2"])).await;

        let selected = registry
            .select(Some(&[b.id.clone(), a.id.clone()]))
            .await
            .unwrap();
        assert_eq!(selected[0].name, "b.csv");
        assert_eq!(selected[1].name, "a.csv");

        assert!(registry.select(Some(&["nope".to_string()])).await.is_err());
        assert_eq!(registry.select(None).await.unwrap().len(), 2);
    }
}
