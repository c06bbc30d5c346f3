//! Stock snapshot and movement records.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockbook_core::{RecordId, impl_record_id};
use stockbook_products::ProductId;
use stockbook_store::Record;

/// Typed daily stock row identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DailyStockId(RecordId);

impl_record_id!(DailyStockId, "daily stock id");

/// Typed stock movement identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StockMovementId(RecordId);

impl_record_id!(StockMovementId, "stock movement id");

/// Stock position of one product on one business date.
///
/// Exactly one row exists per `(product_id, date)`; it is created lazily by
/// the first movement on that date and then mutated in place. `avg_cost` is
/// the weighted moving average unit cost, recomputed on increases only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyStock {
    pub id: DailyStockId,
    pub product_id: ProductId,
    pub date: NaiveDate,
    pub available_qty: i64,
    pub avg_cost: Decimal,
    pub updated_at: String,
}

impl DailyStock {
    pub const PRODUCT_INDEX: &'static str = "product_id";
    pub const DATE_INDEX: &'static str = "date";
    pub const PRODUCT_DATE_INDEX: &'static str = "product_date";
    pub const AVAILABLE_QTY_INDEX: &'static str = "available_qty";
}

impl Record for DailyStock {
    const STORE: &'static str = "daily_stock";

    fn id(&self) -> RecordId {
        self.id.record_id()
    }
}

/// One entry of the append-only stock movement log.
///
/// Rows are never mutated or deleted. The balance invariant holds for every
/// row: `quantity_after = quantity_before + quantity_change`. `sequence`
/// numbers rows across the whole log in application order; timestamps have
/// second resolution and cannot order movements on their own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockMovement {
    pub id: StockMovementId,
    pub sequence: u64,
    pub product_id: ProductId,
    pub invoice_id: RecordId,
    pub invoice_date: NaiveDate,
    pub quantity_before: i64,
    pub quantity_change: i64,
    pub quantity_after: i64,
    pub created_at: String,
}

impl StockMovement {
    pub const PRODUCT_INDEX: &'static str = "product_id";
    pub const INVOICE_INDEX: &'static str = "invoice_id";
    pub const INVOICE_DATE_INDEX: &'static str = "invoice_date";
}

impl Record for StockMovement {
    const STORE: &'static str = "stock_movements";

    fn id(&self) -> RecordId {
        self.id.record_id()
    }
}
