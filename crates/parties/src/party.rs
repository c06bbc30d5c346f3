//! Customer and supplier records.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockbook_core::{RecordId, impl_record_id};
use stockbook_store::Record;

/// Typed customer identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CustomerId(RecordId);

impl_record_id!(CustomerId, "customer id");

/// Typed supplier identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SupplierId(RecordId);

impl_record_id!(SupplierId, "supplier id");

/// Contact information for a counterparty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInfo {
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

/// A customer the business sells to.
///
/// `credit_limit` is informational: it is stored for reporting and never
/// enforced by the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub name: String,
    pub contact: ContactInfo,
    pub credit_limit: Decimal,
    pub created_at: String,
}

impl Customer {
    pub const NAME_INDEX: &'static str = "name";
    pub const CREATED_AT_INDEX: &'static str = "created_at";
}

impl Record for Customer {
    const STORE: &'static str = "customers";

    fn id(&self) -> RecordId {
        self.id.record_id()
    }
}

/// A supplier the business buys from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Supplier {
    pub id: SupplierId,
    pub name: String,
    pub contact: ContactInfo,
    pub created_at: String,
}

impl Supplier {
    pub const NAME_INDEX: &'static str = "name";
    pub const CREATED_AT_INDEX: &'static str = "created_at";
}

impl Record for Supplier {
    const STORE: &'static str = "suppliers";

    fn id(&self) -> RecordId {
        self.id.record_id()
    }
}

/// Input for registering a customer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCustomer {
    pub name: String,
    pub contact: ContactInfo,
    pub credit_limit: Decimal,
}

/// Input for registering a supplier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSupplier {
    pub name: String,
    pub contact: ContactInfo,
}
