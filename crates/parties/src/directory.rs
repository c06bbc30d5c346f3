//! Counterparty registry over the `customers` and `suppliers` stores.

use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use stockbook_core::{DomainError, IdGenerator, clock};
use stockbook_store::{IndexKey, Record, Store, StoreError};

use crate::party::{Customer, CustomerId, NewCustomer, NewSupplier, Supplier, SupplierId};

// Invoices reference their counterparty through these indexes; a referenced
// party cannot be removed.
const INVOICES_STORE: &str = "invoices";
const CUSTOMER_REF_INDEX: &str = "customer_id";
const SUPPLIER_REF_INDEX: &str = "supplier_id";

/// Errors from directory operations.
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Registry of customers and suppliers.
#[derive(Debug, Clone)]
pub struct PartyDirectory {
    store: Arc<Store>,
    ids: Arc<IdGenerator>,
}

impl PartyDirectory {
    pub fn new(store: Arc<Store>, ids: Arc<IdGenerator>) -> Self {
        Self { store, ids }
    }

    /// Register a customer.
    pub fn create_customer(&self, new: NewCustomer) -> Result<Customer, DirectoryError> {
        if new.name.trim().is_empty() {
            return Err(DomainError::validation("customer name cannot be empty").into());
        }
        if new.credit_limit.is_sign_negative() {
            return Err(DomainError::validation("credit limit cannot be negative").into());
        }

        let customer = Customer {
            id: CustomerId::new(self.ids.next_id()),
            name: new.name,
            contact: new.contact,
            credit_limit: new.credit_limit,
            created_at: clock::now(),
        };

        let mut txn = self.store.write(&[Customer::STORE])?;
        txn.insert(&customer)?;
        txn.commit()?;
        debug!(customer_id = %customer.id, "customer created");
        Ok(customer)
    }

    /// Register a supplier.
    pub fn create_supplier(&self, new: NewSupplier) -> Result<Supplier, DirectoryError> {
        if new.name.trim().is_empty() {
            return Err(DomainError::validation("supplier name cannot be empty").into());
        }

        let supplier = Supplier {
            id: SupplierId::new(self.ids.next_id()),
            name: new.name,
            contact: new.contact,
            created_at: clock::now(),
        };

        let mut txn = self.store.write(&[Supplier::STORE])?;
        txn.insert(&supplier)?;
        txn.commit()?;
        debug!(supplier_id = %supplier.id, "supplier created");
        Ok(supplier)
    }

    pub fn customer(&self, id: CustomerId) -> Result<Option<Customer>, DirectoryError> {
        Ok(self.store.get(id.record_id())?)
    }

    pub fn supplier(&self, id: SupplierId) -> Result<Option<Supplier>, DirectoryError> {
        Ok(self.store.get(id.record_id())?)
    }

    pub fn customers(&self) -> Result<Vec<Customer>, DirectoryError> {
        Ok(self.store.list()?)
    }

    pub fn suppliers(&self) -> Result<Vec<Supplier>, DirectoryError> {
        Ok(self.store.list()?)
    }

    /// Remove a customer no invoice references.
    pub fn remove_customer(&self, id: CustomerId) -> Result<(), DirectoryError> {
        let mut txn = self.store.write(&[Customer::STORE, INVOICES_STORE])?;
        let key = [IndexKey::text(id.to_string())];
        if txn.count_matching(INVOICES_STORE, CUSTOMER_REF_INDEX, &key)? > 0 {
            return Err(DomainError::validation(format!(
                "customer {id} has invoices and cannot be removed"
            ))
            .into());
        }
        if !txn.delete::<Customer>(id.record_id())? {
            return Err(DomainError::NotFound.into());
        }
        txn.commit()?;
        debug!(customer_id = %id, "customer removed");
        Ok(())
    }

    /// Remove a supplier no invoice references.
    pub fn remove_supplier(&self, id: SupplierId) -> Result<(), DirectoryError> {
        let mut txn = self.store.write(&[Supplier::STORE, INVOICES_STORE])?;
        let key = [IndexKey::text(id.to_string())];
        if txn.count_matching(INVOICES_STORE, SUPPLIER_REF_INDEX, &key)? > 0 {
            return Err(DomainError::validation(format!(
                "supplier {id} has invoices and cannot be removed"
            ))
            .into());
        }
        if !txn.delete::<Supplier>(id.record_id())? {
            return Err(DomainError::NotFound.into());
        }
        txn.commit()?;
        debug!(supplier_id = %id, "supplier removed");
        Ok(())
    }
}
