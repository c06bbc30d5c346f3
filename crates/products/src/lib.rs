//! `stockbook-products`: the product catalog.
//!
//! Product records live in the `products` store; [`ProductCatalog`] is the
//! only writer and enforces the descriptive-update and guarded-removal rules.

pub mod catalog;
pub mod product;

pub use catalog::{CatalogError, ProductCatalog};
pub use product::{NewProduct, Product, ProductId};
