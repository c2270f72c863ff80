use relist_core::models::ExpiredItem;
use relist_core::repository::CatalogStore;
use relist_core::WizardResult;
use std::sync::Arc;
use uuid::Uuid;

/// Finds list items whose linked offer has rotated out of validity.
/// Read-only; a data-access error aborts wizard start rather than
/// producing a partial view.
pub struct ExpiredItemDetector {
    catalog: Arc<dyn CatalogStore>,
}

impl ExpiredItemDetector {
    pub fn new(catalog: Arc<dyn CatalogStore>) -> Self {
        Self { catalog }
    }

    pub async fn detect(&self, list_id: Uuid) -> WizardResult<Vec<ExpiredItem>> {
        let items = self.catalog.expired_items(list_id).await?;
        tracing::debug!(%list_id, count = items.len(), "Detected expired items");
        Ok(items)
    }
}
