use std::collections::HashMap;

use crate::{
    db_types::{InventoryEntry, NewStockChange, Product},
    traits::{Pagination, StockHistoryPage, StockLevel, StorageError},
};

#[allow(async_fn_in_trait)]
pub trait StockManagement: Clone {
    async fn fetch_product(&self, product_id: i64) -> Result<Option<Product>, StorageError>;

    /// Appends a ledger entry and moves the product's stock counter by the same amount, atomically.
    ///
    /// Change types that floor at zero never take the counter below zero; the entry still records the requested
    /// change alongside the resulting stock.
    async fn apply_stock_change(&self, change: NewStockChange) -> Result<InventoryEntry, StorageError>;

    /// A consistent snapshot of the current stock of the given products. Unknown ids are left out.
    async fn fetch_stock_levels(&self, product_ids: &[i64]) -> Result<HashMap<i64, StockLevel>, StorageError>;

    /// The ledger for a product, newest entry first.
    async fn fetch_stock_history(
        &self,
        product_id: i64,
        pagination: Pagination,
    ) -> Result<StockHistoryPage, StorageError>;
}
