//! The inventory ledger: per-date stock snapshots plus the movement log.

use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::debug;

use stockbook_core::{DomainError, IdGenerator, RecordId, clock};
use stockbook_products::ProductId;
use stockbook_store::{IndexKey, Record, Store, StoreError, WriteTxn};

use crate::stock::{DailyStock, DailyStockId, StockMovement, StockMovementId};

/// A signed stock change to apply for one invoice line.
///
/// `unit_cost` is required for increases (it feeds the average cost) and
/// ignored for decreases.
#[derive(Debug, Clone, PartialEq)]
pub struct ApplyMovement {
    pub product_id: ProductId,
    pub invoice_id: RecordId,
    pub business_date: NaiveDate,
    pub quantity_change: i64,
    pub unit_cost: Option<Decimal>,
}

/// Ledger behaviour switches.
#[derive(Debug, Clone, Copy, Default)]
pub struct LedgerConfig {
    /// Backorder mode: let `available_qty` go negative instead of rejecting
    /// the movement.
    pub allow_negative_stock: bool,
}

/// Errors from ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error(
        "insufficient stock for product {product_id} on {business_date}: \
         attempted {attempted}, available {available}"
    )]
    InsufficientStock {
        product_id: ProductId,
        business_date: NaiveDate,
        attempted: i64,
        available: i64,
    },

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Owns the `daily_stock` and `stock_movements` stores.
///
/// Every mutation goes through [`InventoryLedger::apply_movement`] (or
/// [`InventoryLedger::apply_movement_in`] when a caller already holds a wider
/// transaction); the snapshot write and the movement append always commit or
/// roll back together.
#[derive(Debug, Clone)]
pub struct InventoryLedger {
    store: Arc<Store>,
    ids: Arc<IdGenerator>,
    config: LedgerConfig,
}

impl InventoryLedger {
    pub fn new(store: Arc<Store>, ids: Arc<IdGenerator>, config: LedgerConfig) -> Self {
        Self { store, ids, config }
    }

    /// Apply one signed stock change in its own transaction.
    pub fn apply_movement(&self, cmd: &ApplyMovement) -> Result<StockMovement, LedgerError> {
        let mut txn = self
            .store
            .write(&[DailyStock::STORE, StockMovement::STORE])?;
        let movement = self.apply_movement_in(&mut txn, cmd)?;
        txn.commit()?;
        Ok(movement)
    }

    /// Apply one signed stock change inside a caller-owned transaction whose
    /// scope includes both ledger stores. Later movements in the same
    /// transaction observe the updated snapshot.
    pub fn apply_movement_in(
        &self,
        txn: &mut WriteTxn<'_>,
        cmd: &ApplyMovement,
    ) -> Result<StockMovement, LedgerError> {
        if cmd.quantity_change == 0 {
            return Err(DomainError::validation("quantity change cannot be zero").into());
        }
        let unit_cost = if cmd.quantity_change > 0 {
            Some(cmd.unit_cost.ok_or_else(|| {
                DomainError::validation("unit cost is required for stock increases")
            })?)
        } else {
            // Supplied costs on decreases are ignored, not rejected.
            None
        };

        let key = [
            IndexKey::text(cmd.product_id.to_string()),
            IndexKey::text(cmd.business_date.to_string()),
        ];
        let existing = txn.find_unique::<DailyStock>(DailyStock::PRODUCT_DATE_INDEX, &key)?;
        let mut snapshot = existing.unwrap_or_else(|| DailyStock {
            id: DailyStockId::new(self.ids.next_id()),
            product_id: cmd.product_id,
            date: cmd.business_date,
            available_qty: 0,
            avg_cost: Decimal::ZERO,
            updated_at: clock::now(),
        });

        let quantity_before = snapshot.available_qty;
        let quantity_after = quantity_before
            .checked_add(cmd.quantity_change)
            .ok_or_else(|| DomainError::invariant("stock quantity overflow"))?;

        // Only decreases can be short of stock. An increase always lands,
        // even onto a balance left negative by an earlier backordering run.
        if cmd.quantity_change < 0 && quantity_after < 0 && !self.config.allow_negative_stock {
            return Err(LedgerError::InsufficientStock {
                product_id: cmd.product_id,
                business_date: cmd.business_date,
                attempted: cmd.quantity_change,
                available: quantity_before,
            });
        }

        if let Some(unit_cost) = unit_cost {
            snapshot.avg_cost = weighted_average(
                quantity_before,
                snapshot.avg_cost,
                cmd.quantity_change,
                unit_cost,
                quantity_after,
            )?;
        }
        snapshot.available_qty = quantity_after;
        snapshot.updated_at = clock::now();
        txn.put(&snapshot)?;

        // The log is append-only, so the row count is the next position in
        // application order, across restarts included.
        let sequence = txn.count(StockMovement::STORE)? as u64 + 1;
        let movement = StockMovement {
            id: StockMovementId::new(self.ids.next_id()),
            sequence,
            product_id: cmd.product_id,
            invoice_id: cmd.invoice_id,
            invoice_date: cmd.business_date,
            quantity_before,
            quantity_change: cmd.quantity_change,
            quantity_after,
            created_at: clock::now(),
        };
        txn.insert(&movement)?;

        debug!(
            product_id = %cmd.product_id,
            business_date = %cmd.business_date,
            quantity_change = cmd.quantity_change,
            quantity_after,
            "stock movement applied"
        );
        Ok(movement)
    }

    /// Snapshot for exactly this business date, or `None`. Never falls back
    /// to an earlier date.
    pub fn snapshot(
        &self,
        product_id: ProductId,
        date: NaiveDate,
    ) -> Result<Option<DailyStock>, LedgerError> {
        let key = [
            IndexKey::text(product_id.to_string()),
            IndexKey::text(date.to_string()),
        ];
        Ok(self
            .store
            .find_unique(DailyStock::PRODUCT_DATE_INDEX, &key)?)
    }

    /// Every snapshot of a product, oldest date first. Callers wanting a
    /// position on a date with no row carry the latest earlier row forward
    /// themselves.
    pub fn snapshots_for_product(
        &self,
        product_id: ProductId,
    ) -> Result<Vec<DailyStock>, LedgerError> {
        let mut rows: Vec<DailyStock> = self.store.find(
            DailyStock::PRODUCT_INDEX,
            &[IndexKey::text(product_id.to_string())],
        )?;
        rows.sort_by_key(|s| s.date);
        Ok(rows)
    }

    /// Audit trail of a product, in application order.
    pub fn movements_for_product(
        &self,
        product_id: ProductId,
    ) -> Result<Vec<StockMovement>, LedgerError> {
        let mut rows: Vec<StockMovement> = self.store.find(
            StockMovement::PRODUCT_INDEX,
            &[IndexKey::text(product_id.to_string())],
        )?;
        sort_movements(&mut rows);
        Ok(rows)
    }

    /// Movements created by one invoice, in application order.
    pub fn movements_for_invoice(
        &self,
        invoice_id: RecordId,
    ) -> Result<Vec<StockMovement>, LedgerError> {
        let mut rows: Vec<StockMovement> = self.store.find(
            StockMovement::INVOICE_INDEX,
            &[IndexKey::text(invoice_id.to_string())],
        )?;
        sort_movements(&mut rows);
        Ok(rows)
    }
}

fn sort_movements(rows: &mut [StockMovement]) {
    rows.sort_by_key(|m| m.sequence);
}

/// Weighted moving average unit cost after an increase.
///
/// With no prior position, or a negative one left by backordering, the
/// incoming cost stands alone; otherwise the prior and incoming values are
/// blended over the resulting quantity.
fn weighted_average(
    quantity_before: i64,
    avg_cost: Decimal,
    quantity_change: i64,
    unit_cost: Decimal,
    quantity_after: i64,
) -> Result<Decimal, DomainError> {
    if quantity_before <= 0 {
        return Ok(unit_cost);
    }
    let prior = Decimal::from(quantity_before)
        .checked_mul(avg_cost)
        .ok_or_else(|| DomainError::invariant("average cost overflow"))?;
    let incoming = Decimal::from(quantity_change)
        .checked_mul(unit_cost)
        .ok_or_else(|| DomainError::invariant("average cost overflow"))?;
    let total = prior
        .checked_add(incoming)
        .ok_or_else(|| DomainError::invariant("average cost overflow"))?;
    total
        .checked_div(Decimal::from(quantity_after))
        .ok_or_else(|| DomainError::invariant("average cost overflow"))
}
