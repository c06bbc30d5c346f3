//! Product registry over the `products` store.

use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use stockbook_core::{DomainError, IdGenerator, clock};
use stockbook_store::{IndexKey, Record, Store, StoreError};

use crate::product::{NewProduct, Product, ProductId};

/// Stores holding product references; a product with rows in any of them
/// cannot be removed.
const REFERENCING: &[(&str, &str)] = &[
    ("invoice_items", "product_id"),
    ("stock_movements", "product_id"),
];

/// Errors from catalog operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Registry of products.
#[derive(Debug, Clone)]
pub struct ProductCatalog {
    store: Arc<Store>,
    ids: Arc<IdGenerator>,
}

impl ProductCatalog {
    pub fn new(store: Arc<Store>, ids: Arc<IdGenerator>) -> Self {
        Self { store, ids }
    }

    /// Register a product.
    pub fn create(&self, new: NewProduct) -> Result<Product, CatalogError> {
        validate(&new)?;

        let product = Product {
            id: ProductId::new(self.ids.next_id()),
            name: new.name,
            barcode: new.barcode,
            category: new.category,
            retail_price: new.retail_price,
            wholesale_price: new.wholesale_price,
            created_at: clock::now(),
        };

        let mut txn = self.store.write(&[Product::STORE])?;
        txn.insert(&product)?;
        txn.commit()?;
        debug!(product_id = %product.id, name = %product.name, "product created");
        Ok(product)
    }

    pub fn get(&self, id: ProductId) -> Result<Option<Product>, CatalogError> {
        Ok(self.store.get(id.record_id())?)
    }

    /// Exact barcode lookup; barcodes are unique across the catalog.
    pub fn find_by_barcode(&self, barcode: &str) -> Result<Option<Product>, CatalogError> {
        Ok(self
            .store
            .find_unique(Product::BARCODE_INDEX, &[IndexKey::text(barcode)])?)
    }

    /// Exact name lookup; names are not unique.
    pub fn find_by_name(&self, name: &str) -> Result<Vec<Product>, CatalogError> {
        Ok(self.store.find(Product::NAME_INDEX, &[IndexKey::text(name)])?)
    }

    pub fn list(&self) -> Result<Vec<Product>, CatalogError> {
        Ok(self.store.list()?)
    }

    /// Replace the descriptive fields of an existing product. The identifier
    /// and `created_at` are kept as they are.
    pub fn update_descriptive(
        &self,
        id: ProductId,
        update: NewProduct,
    ) -> Result<Product, CatalogError> {
        validate(&update)?;

        let mut txn = self.store.write(&[Product::STORE])?;
        let current = txn
            .get::<Product>(id.record_id())?
            .ok_or(DomainError::NotFound)?;
        let product = Product {
            id: current.id,
            name: update.name,
            barcode: update.barcode,
            category: update.category,
            retail_price: update.retail_price,
            wholesale_price: update.wholesale_price,
            created_at: current.created_at,
        };
        txn.put(&product)?;
        txn.commit()?;
        Ok(product)
    }

    /// Remove a product that nothing references. Invoice items and stock
    /// movements pin the products they mention for good.
    pub fn remove(&self, id: ProductId) -> Result<(), CatalogError> {
        let mut scope: Vec<&str> = vec![Product::STORE];
        scope.extend(REFERENCING.iter().map(|(store, _)| *store));

        let mut txn = self.store.write(&scope)?;
        let key = [IndexKey::text(id.to_string())];
        for (store, index) in REFERENCING {
            if txn.count_matching(store, index, &key)? > 0 {
                return Err(DomainError::validation(format!(
                    "product {id} is referenced by {store} and cannot be removed"
                ))
                .into());
            }
        }
        if !txn.delete::<Product>(id.record_id())? {
            return Err(DomainError::NotFound.into());
        }
        txn.commit()?;
        debug!(product_id = %id, "product removed");
        Ok(())
    }
}

fn validate(new: &NewProduct) -> Result<(), DomainError> {
    if new.name.trim().is_empty() {
        return Err(DomainError::validation("product name cannot be empty"));
    }
    if let Some(barcode) = &new.barcode {
        if barcode.trim().is_empty() {
            return Err(DomainError::validation("barcode cannot be blank"));
        }
    }
    for (field, price) in [
        ("retail price", new.retail_price),
        ("wholesale price", new.wholesale_price),
    ] {
        if let Some(price) = price {
            if price.is_sign_negative() {
                return Err(DomainError::validation(format!("{field} cannot be negative")));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;
    use serde::{Deserialize, Serialize};

    use stockbook_core::RecordId;
    use stockbook_store::{IndexSpec, MemoryBackend, SchemaManager, SchemaVersion, StoreSpec};

    use super::*;

    /// Minimal stand-in for an invoice item row referencing a product.
    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct ItemRef {
        id: RecordId,
        product_id: ProductId,
    }

    impl Record for ItemRef {
        const STORE: &'static str = "invoice_items";

        fn id(&self) -> RecordId {
            self.id
        }
    }

    fn catalog() -> ProductCatalog {
        let products = StoreSpec::new(Product::STORE)
            .with_index(IndexSpec::new(Product::NAME_INDEX, &["name"]))
            .with_index(IndexSpec::unique(Product::BARCODE_INDEX, &["barcode"]));
        let invoice_items = StoreSpec::new("invoice_items")
            .with_index(IndexSpec::new("product_id", &["product_id"]));
        let stock_movements = StoreSpec::new("stock_movements")
            .with_index(IndexSpec::new("product_id", &["product_id"]));

        let store = Store::open(
            Box::new(MemoryBackend::new()),
            SchemaManager::new(vec![SchemaVersion::new(
                1,
                vec![products, invoice_items, stock_movements],
            )])
            .unwrap(),
        )
        .unwrap();
        ProductCatalog::new(Arc::new(store), Arc::new(IdGenerator::new()))
    }

    fn soap() -> NewProduct {
        NewProduct {
            name: "Olive soap".to_string(),
            barcode: Some("6291041500213".to_string()),
            category: Some("Care".to_string()),
            retail_price: Some(dec!(4.50)),
            wholesale_price: Some(dec!(3.10)),
        }
    }

    #[test]
    fn created_products_are_findable_by_barcode_and_name() {
        let catalog = catalog();
        let product = catalog.create(soap()).unwrap();

        let by_barcode = catalog.find_by_barcode("6291041500213").unwrap().unwrap();
        assert_eq!(by_barcode.id, product.id);

        let by_name = catalog.find_by_name("Olive soap").unwrap();
        assert_eq!(by_name.len(), 1);
        assert_eq!(by_name[0].retail_price, Some(dec!(4.50)));
    }

    #[test]
    fn empty_name_is_rejected() {
        let catalog = catalog();
        let err = catalog
            .create(NewProduct {
                name: "   ".to_string(),
                ..soap()
            })
            .unwrap_err();
        match err {
            CatalogError::Domain(DomainError::Validation(msg)) if msg.contains("name") => {}
            other => panic!("expected name validation error, got {other:?}"),
        }
    }

    #[test]
    fn negative_price_is_rejected() {
        let catalog = catalog();
        let err = catalog
            .create(NewProduct {
                wholesale_price: Some(dec!(-0.01)),
                ..soap()
            })
            .unwrap_err();
        match err {
            CatalogError::Domain(DomainError::Validation(msg)) if msg.contains("wholesale") => {}
            other => panic!("expected price validation error, got {other:?}"),
        }
    }

    #[test]
    fn duplicate_barcode_is_rejected() {
        let catalog = catalog();
        catalog.create(soap()).unwrap();

        let err = catalog
            .create(NewProduct {
                name: "Other soap".to_string(),
                ..soap()
            })
            .unwrap_err();
        match err {
            CatalogError::Store(StoreError::UniquenessViolation { ref index, .. }) => {
                assert_eq!(index, Product::BARCODE_INDEX);
            }
            other => panic!("expected uniqueness violation, got {other:?}"),
        }
    }

    #[test]
    fn products_without_barcode_do_not_collide() {
        let catalog = catalog();
        for name in ["Loose tea", "Loose rice"] {
            catalog
                .create(NewProduct {
                    name: name.to_string(),
                    barcode: None,
                    category: None,
                    retail_price: Some(dec!(1.00)),
                    wholesale_price: None,
                })
                .unwrap();
        }
        assert_eq!(catalog.list().unwrap().len(), 2);
    }

    #[test]
    fn update_keeps_id_and_created_at() {
        let catalog = catalog();
        let product = catalog.create(soap()).unwrap();

        let updated = catalog
            .update_descriptive(
                product.id,
                NewProduct {
                    name: "Olive soap 120g".to_string(),
                    retail_price: Some(dec!(4.90)),
                    ..soap()
                },
            )
            .unwrap();

        assert_eq!(updated.id, product.id);
        assert_eq!(updated.created_at, product.created_at);
        assert_eq!(updated.name, "Olive soap 120g");
        assert!(catalog.find_by_name("Olive soap").unwrap().is_empty());
    }

    #[test]
    fn referenced_products_cannot_be_removed() {
        let catalog = catalog();
        let product = catalog.create(soap()).unwrap();

        let mut txn = catalog.store.write(&["invoice_items"]).unwrap();
        txn.insert(&ItemRef {
            id: IdGenerator::new().next_id(),
            product_id: product.id,
        })
        .unwrap();
        txn.commit().unwrap();

        let err = catalog.remove(product.id).unwrap_err();
        match err {
            CatalogError::Domain(DomainError::Validation(msg)) => {
                assert!(msg.contains("invoice_items"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
        assert!(catalog.get(product.id).unwrap().is_some());
    }

    #[test]
    fn unreferenced_products_can_be_removed() {
        let catalog = catalog();
        let product = catalog.create(soap()).unwrap();

        catalog.remove(product.id).unwrap();
        assert!(catalog.get(product.id).unwrap().is_none());
        assert!(catalog.find_by_barcode("6291041500213").unwrap().is_none());
    }

    #[test]
    fn removing_a_missing_product_is_not_found() {
        let catalog = catalog();
        let ghost = ProductId::new(IdGenerator::new().next_id());

        let err = catalog.remove(ghost).unwrap_err();
        match err {
            CatalogError::Domain(DomainError::NotFound) => {}
            other => panic!("expected NotFound, got {other:?}"),
        }
    }
}
