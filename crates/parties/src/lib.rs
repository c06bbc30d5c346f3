//! `stockbook-parties`: customers and suppliers.
//!
//! Counterparty records live in the `customers` and `suppliers` stores;
//! [`PartyDirectory`] is the only writer. Removal is refused while invoices
//! reference the party.

pub mod directory;
pub mod party;

pub use directory::{DirectoryError, PartyDirectory};
pub use party::{ContactInfo, Customer, CustomerId, NewCustomer, NewSupplier, Supplier, SupplierId};
