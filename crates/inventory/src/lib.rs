//! `stockbook-inventory`: the stock ledger.
//!
//! Keeps one [`DailyStock`] snapshot per product and business date and an
//! append-only [`StockMovement`] log. [`InventoryLedger`] is the only writer;
//! each movement updates the snapshot and appends to the log in one
//! transaction.

pub mod ledger;
pub mod stock;

pub use ledger::{ApplyMovement, InventoryLedger, LedgerConfig, LedgerError};
pub use stock::{DailyStock, DailyStockId, StockMovement, StockMovementId};
