//! Product records.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockbook_core::{RecordId, impl_record_id};
use stockbook_store::Record;

/// Typed product identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(RecordId);

impl_record_id!(ProductId, "product id");

/// A catalog entry: something the business buys or sells.
///
/// Descriptive fields may change after creation; the identifier and
/// `created_at` never do. `retail_price` and `wholesale_price` are the
/// standard prices an invoice line's price type selects between; either may
/// be unset for goods that are only ever priced per line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub barcode: Option<String>,
    pub category: Option<String>,
    pub retail_price: Option<Decimal>,
    pub wholesale_price: Option<Decimal>,
    pub created_at: String,
}

impl Product {
    pub const NAME_INDEX: &'static str = "name";
    pub const BARCODE_INDEX: &'static str = "barcode";
    pub const CREATED_AT_INDEX: &'static str = "created_at";
}

impl Record for Product {
    const STORE: &'static str = "products";

    fn id(&self) -> RecordId {
        self.id.record_id()
    }
}

/// Descriptive fields for creating or updating a product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub barcode: Option<String>,
    pub category: Option<String>,
    pub retail_price: Option<Decimal>,
    pub wholesale_price: Option<Decimal>,
}
