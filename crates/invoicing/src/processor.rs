//! Invoice creation and queries.

use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::info;

use stockbook_core::{DomainError, IdGenerator, clock};
use stockbook_inventory::{ApplyMovement, DailyStock, InventoryLedger, LedgerError, StockMovement};
use stockbook_parties::{CustomerId, SupplierId};
use stockbook_products::{Product, ProductId};
use stockbook_store::{IndexKey, Record, Store, StoreError};

use crate::invoice::{
    Invoice, InvoiceId, InvoiceItem, InvoiceItemId, InvoiceType, PriceType, payment_status_for,
};

/// The party an invoice is raised against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counterparty {
    Customer(CustomerId),
    Supplier(SupplierId),
}

/// One proposed invoice line.
#[derive(Debug, Clone, PartialEq)]
pub struct InvoiceItemDraft {
    pub product_id: ProductId,
    pub quantity: i64,
    pub price_type: PriceType,
    /// Per-line price override; wins over the product's standard price.
    pub private_price: Option<Decimal>,
    pub private_price_note: Option<String>,
}

/// A proposed invoice.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateInvoice {
    pub invoice_type: InvoiceType,
    pub counterparty: Counterparty,
    pub invoice_date: NaiveDate,
    pub items: Vec<InvoiceItemDraft>,
    pub amount_paid: Decimal,
}

/// Errors from invoice operations.
#[derive(Debug, Error)]
pub enum InvoiceError {
    #[error("product {product_id} has no {price_type} price configured")]
    InvalidPriceConfiguration {
        product_id: ProductId,
        price_type: PriceType,
    },

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

struct PricedLine {
    draft: InvoiceItemDraft,
    unit_price: Decimal,
    total_price: Decimal,
}

/// Builds invoices and drives the stock ledger.
///
/// [`InvoiceProcessor::create_invoice`] is the single entry point: one call
/// persists the invoice row, its items, and every stock movement inside one
/// transaction spanning exactly those four stores. Any failure leaves the
/// store untouched.
#[derive(Debug, Clone)]
pub struct InvoiceProcessor {
    store: Arc<Store>,
    ids: Arc<IdGenerator>,
    ledger: InventoryLedger,
}

impl InvoiceProcessor {
    pub fn new(store: Arc<Store>, ids: Arc<IdGenerator>, ledger: InventoryLedger) -> Self {
        Self { store, ids, ledger }
    }

    /// Validate, price, and commit a proposed invoice.
    pub fn create_invoice(&self, cmd: &CreateInvoice) -> Result<Invoice, InvoiceError> {
        validate(cmd)?;

        // Prices are resolved against the catalog up front; the write
        // transaction below spans only the invoice and ledger stores.
        let priced = self.price_items(cmd)?;

        let mut total_amount = Decimal::ZERO;
        for line in &priced {
            total_amount = total_amount
                .checked_add(line.total_price)
                .ok_or_else(|| DomainError::invariant("invoice total overflow"))?;
        }

        let (customer_id, supplier_id) = match cmd.counterparty {
            Counterparty::Customer(id) => (Some(id), None),
            Counterparty::Supplier(id) => (None, Some(id)),
        };

        let invoice = Invoice {
            id: InvoiceId::new(self.ids.next_id()),
            invoice_type: cmd.invoice_type,
            customer_id,
            supplier_id,
            invoice_date: cmd.invoice_date,
            total_amount,
            amount_paid: cmd.amount_paid,
            payment_status: payment_status_for(total_amount, cmd.amount_paid),
            created_at: clock::now(),
        };

        let mut txn = self.store.write(&[
            Invoice::STORE,
            InvoiceItem::STORE,
            DailyStock::STORE,
            StockMovement::STORE,
        ])?;

        txn.insert(&invoice)?;

        let mut items = Vec::with_capacity(priced.len());
        for line in priced {
            let PricedLine {
                draft,
                unit_price,
                total_price,
            } = line;
            let item = InvoiceItem {
                id: InvoiceItemId::new(self.ids.next_id()),
                invoice_id: invoice.id,
                product_id: draft.product_id,
                quantity: draft.quantity,
                price_type: draft.price_type,
                is_private_price: draft.private_price.is_some(),
                private_price_amount: draft.private_price,
                private_price_note: draft.private_price_note,
                unit_price,
                total_price,
            };
            txn.insert(&item)?;
            items.push(item);
        }

        // Stock effect per line, in line order: sells take stock out, buys
        // bring it in at the line's effective price.
        for item in &items {
            let (quantity_change, unit_cost) = match cmd.invoice_type {
                InvoiceType::Sell => (-item.quantity, None),
                InvoiceType::Buy => (item.quantity, Some(item.unit_price)),
            };
            self.ledger.apply_movement_in(
                &mut txn,
                &ApplyMovement {
                    product_id: item.product_id,
                    invoice_id: invoice.id.record_id(),
                    business_date: cmd.invoice_date,
                    quantity_change,
                    unit_cost,
                },
            )?;
        }

        txn.commit()?;
        info!(
            invoice_id = %invoice.id,
            invoice_type = %invoice.invoice_type,
            total_amount = %invoice.total_amount,
            payment_status = %invoice.payment_status,
            items = items.len(),
            "invoice created"
        );
        Ok(invoice)
    }

    pub fn invoice(&self, id: InvoiceId) -> Result<Option<Invoice>, InvoiceError> {
        Ok(self.store.get(id.record_id())?)
    }

    /// Lines of one invoice.
    pub fn items(&self, invoice_id: InvoiceId) -> Result<Vec<InvoiceItem>, InvoiceError> {
        Ok(self.store.find(
            InvoiceItem::INVOICE_INDEX,
            &[IndexKey::text(invoice_id.to_string())],
        )?)
    }

    /// Invoices dated on one business date.
    pub fn invoices_on(&self, date: NaiveDate) -> Result<Vec<Invoice>, InvoiceError> {
        Ok(self
            .store
            .find(Invoice::DATE_INDEX, &[IndexKey::text(date.to_string())])?)
    }

    pub fn invoices_for_customer(&self, id: CustomerId) -> Result<Vec<Invoice>, InvoiceError> {
        Ok(self
            .store
            .find(Invoice::CUSTOMER_INDEX, &[IndexKey::text(id.to_string())])?)
    }

    pub fn invoices_for_supplier(&self, id: SupplierId) -> Result<Vec<Invoice>, InvoiceError> {
        Ok(self
            .store
            .find(Invoice::SUPPLIER_INDEX, &[IndexKey::text(id.to_string())])?)
    }

    fn price_items(&self, cmd: &CreateInvoice) -> Result<Vec<PricedLine>, InvoiceError> {
        let read = self.store.read()?;
        let mut priced = Vec::with_capacity(cmd.items.len());
        for draft in &cmd.items {
            let product: Option<Product> = read.get(draft.product_id.record_id())?;
            let unit_price = effective_unit_price(product.as_ref(), draft)?;
            let total_price = unit_price
                .checked_mul(Decimal::from(draft.quantity))
                .ok_or_else(|| DomainError::invariant("line total overflow"))?;
            priced.push(PricedLine {
                draft: draft.clone(),
                unit_price,
                total_price,
            });
        }
        Ok(priced)
    }
}

fn validate(cmd: &CreateInvoice) -> Result<(), DomainError> {
    if cmd.items.is_empty() {
        return Err(DomainError::validation("an invoice needs at least one item"));
    }
    for draft in &cmd.items {
        if draft.quantity <= 0 {
            return Err(DomainError::validation("item quantity must be positive"));
        }
    }
    if cmd.amount_paid.is_sign_negative() {
        return Err(DomainError::validation("amount paid cannot be negative"));
    }
    match (cmd.invoice_type, cmd.counterparty) {
        (InvoiceType::Sell, Counterparty::Customer(_)) => Ok(()),
        (InvoiceType::Buy, Counterparty::Supplier(_)) => Ok(()),
        (InvoiceType::Sell, Counterparty::Supplier(_)) => Err(DomainError::validation(
            "a sell invoice needs a customer counterparty",
        )),
        (InvoiceType::Buy, Counterparty::Customer(_)) => Err(DomainError::validation(
            "a buy invoice needs a supplier counterparty",
        )),
    }
}

/// Price precedence: the line's private override first, then the product's
/// standard price for the line's price type.
fn effective_unit_price(
    product: Option<&Product>,
    draft: &InvoiceItemDraft,
) -> Result<Decimal, InvoiceError> {
    if let Some(private) = draft.private_price {
        if private.is_sign_negative() {
            return Err(DomainError::validation("private price cannot be negative").into());
        }
        return Ok(private);
    }
    let standard = product.and_then(|p| match draft.price_type {
        PriceType::Retail => p.retail_price,
        PriceType::Wholesale => p.wholesale_price,
    });
    standard.ok_or(InvoiceError::InvalidPriceConfiguration {
        product_id: draft.product_id,
        price_type: draft.price_type,
    })
}
