//! Invoice and invoice item records.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockbook_core::{RecordId, impl_record_id};
use stockbook_parties::{CustomerId, SupplierId};
use stockbook_products::ProductId;
use stockbook_store::Record;

/// Typed invoice identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InvoiceId(RecordId);

impl_record_id!(InvoiceId, "invoice id");

/// Typed invoice item identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InvoiceItemId(RecordId);

impl_record_id!(InvoiceItemId, "invoice item id");

/// Whether an invoice buys stock in or sells it out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceType {
    Buy,
    Sell,
}

impl InvoiceType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::Sell => "sell",
        }
    }
}

impl core::fmt::Display for InvoiceType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Settlement state derived from `amount_paid` against `total_amount`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Paid,
    Partial,
    Pending,
}

impl PaymentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Paid => "paid",
            Self::Partial => "partial",
            Self::Pending => "pending",
        }
    }
}

impl core::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which standard product price a line uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceType {
    Retail,
    Wholesale,
}

impl PriceType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Retail => "retail",
            Self::Wholesale => "wholesale",
        }
    }
}

impl core::fmt::Display for PriceType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derive the settlement state. The rules apply in order: a fully covered
/// total is `paid` (so a zero-total invoice counts as paid), a partially
/// covered one is `partial`, an untouched balance is `pending`.
pub fn payment_status_for(total_amount: Decimal, amount_paid: Decimal) -> PaymentStatus {
    if amount_paid >= total_amount {
        PaymentStatus::Paid
    } else if amount_paid > Decimal::ZERO {
        PaymentStatus::Partial
    } else {
        PaymentStatus::Pending
    }
}

/// A committed invoice.
///
/// Exactly one of `customer_id` / `supplier_id` is set, matching the invoice
/// type. `invoice_date` is the business date driving stock snapshots;
/// `created_at` is the wall-clock creation timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: InvoiceId,
    pub invoice_type: InvoiceType,
    pub customer_id: Option<CustomerId>,
    pub supplier_id: Option<SupplierId>,
    pub invoice_date: NaiveDate,
    pub total_amount: Decimal,
    pub amount_paid: Decimal,
    pub payment_status: PaymentStatus,
    pub created_at: String,
}

impl Invoice {
    pub const TYPE_INDEX: &'static str = "invoice_type";
    pub const CUSTOMER_INDEX: &'static str = "customer_id";
    pub const SUPPLIER_INDEX: &'static str = "supplier_id";
    pub const DATE_INDEX: &'static str = "invoice_date";
    pub const CREATED_AT_INDEX: &'static str = "created_at";
}

impl Record for Invoice {
    const STORE: &'static str = "invoices";

    fn id(&self) -> RecordId {
        self.id.record_id()
    }
}

/// One line of a committed invoice. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceItem {
    pub id: InvoiceItemId,
    pub invoice_id: InvoiceId,
    pub product_id: ProductId,
    pub quantity: i64,
    pub price_type: PriceType,
    pub is_private_price: bool,
    pub private_price_amount: Option<Decimal>,
    pub private_price_note: Option<String>,
    pub unit_price: Decimal,
    pub total_price: Decimal,
}

impl InvoiceItem {
    pub const INVOICE_INDEX: &'static str = "invoice_id";
    pub const PRODUCT_INDEX: &'static str = "product_id";
}

impl Record for InvoiceItem {
    const STORE: &'static str = "invoice_items";

    fn id(&self) -> RecordId {
        self.id.record_id()
    }
}
