use std::{collections::HashMap, fmt::Debug};

use log::*;

use crate::{
    db_types::{InventoryEntry, NewStockChange, StockChangeType},
    duka_api::errors::StockLedgerError,
    traits::{Pagination, StockHistoryPage, StockLevel, StockManagement},
};

/// Manual stock changes and stock reporting for merchants.
///
/// Order-driven changes (sales and returns) never go through here. They are written by the order transitions
/// themselves so that the status change and the ledger entries commit together.
pub struct StockLedgerApi<B> {
    db: B,
}

impl<B> Debug for StockLedgerApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "StockLedgerApi")
    }
}

impl<B> StockLedgerApi<B>
where B: StockManagement
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    /// Records a manual change to a product's stock.
    ///
    /// * `restock` and `return` must add stock, `damaged` must remove it.
    /// * `adjustment` can go either way but may not take the counter below zero.
    /// * `sale` entries are reserved for order confirmations.
    pub async fn apply_manual_change(
        &self,
        organization_id: i64,
        product_id: i64,
        quantity_change: i64,
        change_type: StockChangeType,
        reason: Option<String>,
    ) -> Result<InventoryEntry, StockLedgerError> {
        if quantity_change == 0 {
            return Err(StockLedgerError::InvalidRequest("Quantity change cannot be zero".into()));
        }
        match change_type {
            StockChangeType::Sale => {
                return Err(StockLedgerError::InvalidRequest("Sales are recorded when orders are confirmed".into()))
            },
            StockChangeType::Restock | StockChangeType::Return if quantity_change < 0 => {
                return Err(StockLedgerError::InvalidRequest(format!("A {change_type} must increase stock")))
            },
            StockChangeType::Damaged if quantity_change > 0 => {
                return Err(StockLedgerError::InvalidRequest("Damaged stock must decrease stock".into()))
            },
            _ => {},
        }
        let product =
            self.db.fetch_product(product_id).await?.ok_or(StockLedgerError::ProductNotFound(product_id))?;
        if product.organization_id != organization_id {
            return Err(StockLedgerError::Forbidden(format!("Product {product_id} belongs to another merchant")));
        }
        let target = product.stock.checked_add(quantity_change).ok_or_else(|| {
            StockLedgerError::InvalidRequest(format!("Stock of '{}' cannot change by {quantity_change}", product.name))
        })?;
        if change_type == StockChangeType::Adjustment && target < 0 {
            return Err(StockLedgerError::InvalidRequest(format!(
                "Only {} of '{}' in stock. Cannot adjust by {quantity_change}",
                product.stock, product.name
            )));
        }
        let reason = reason.filter(|r| !r.trim().is_empty()).unwrap_or_else(|| format!("Manual {change_type}"));
        let change = NewStockChange::new(product_id, organization_id, quantity_change, change_type, reason);
        let entry = self.db.apply_stock_change(change).await?;
        info!(
            "📦️ Stock for '{}' changed by {} ({change_type}). New stock: {}",
            product.name, entry.quantity_change, entry.new_stock
        );
        Ok(entry)
    }

    /// The current stock of every requested product that exists, read in one query.
    pub async fn stock_levels(&self, product_ids: &[i64]) -> Result<HashMap<i64, StockLevel>, StockLedgerError> {
        if product_ids.is_empty() {
            return Ok(HashMap::new());
        }
        Ok(self.db.fetch_stock_levels(product_ids).await?)
    }

    pub async fn stock_history(
        &self,
        organization_id: i64,
        product_id: i64,
        pagination: Pagination,
    ) -> Result<StockHistoryPage, StockLedgerError> {
        let product =
            self.db.fetch_product(product_id).await?.ok_or(StockLedgerError::ProductNotFound(product_id))?;
        if product.organization_id != organization_id {
            return Err(StockLedgerError::Forbidden(format!("Product {product_id} belongs to another merchant")));
        }
        Ok(self.db.fetch_stock_history(product_id, pagination).await?)
    }
}
