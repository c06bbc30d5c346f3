//! The schema catalog: every store and index, version by version.

use stockbook_inventory::{DailyStock, StockMovement};
use stockbook_invoicing::{Invoice, InvoiceItem};
use stockbook_parties::{Customer, Supplier};
use stockbook_products::Product;
use stockbook_store::{IndexSpec, Record, SchemaVersion, StoreSpec};

/// Every schema version, oldest first.
///
/// The list is append-only: a released version is never edited, a change
/// means a new entry. Version 3 re-declares version 2 unchanged so that
/// upgrading to it rebuilds every index from the raw records.
pub fn schema_versions() -> Vec<SchemaVersion> {
    vec![
        SchemaVersion::new(1, initial_stores()),
        SchemaVersion::new(2, current_stores()),
        SchemaVersion::new(3, current_stores()),
    ]
}

fn initial_stores() -> Vec<StoreSpec> {
    vec![
        products(),
        customers(),
        suppliers(),
        invoices(),
        invoice_items(),
        daily_stock(),
        stock_movements(),
    ]
}

/// Version 2 added the `created_at` indexes and the snapshot quantity index.
fn current_stores() -> Vec<StoreSpec> {
    vec![
        products().with_index(IndexSpec::new(Product::CREATED_AT_INDEX, &["created_at"])),
        customers().with_index(IndexSpec::new(Customer::CREATED_AT_INDEX, &["created_at"])),
        suppliers().with_index(IndexSpec::new(Supplier::CREATED_AT_INDEX, &["created_at"])),
        invoices().with_index(IndexSpec::new(Invoice::CREATED_AT_INDEX, &["created_at"])),
        invoice_items(),
        daily_stock().with_index(IndexSpec::new(
            DailyStock::AVAILABLE_QTY_INDEX,
            &["available_qty"],
        )),
        stock_movements(),
    ]
}

fn products() -> StoreSpec {
    StoreSpec::new(Product::STORE)
        .with_index(IndexSpec::new(Product::NAME_INDEX, &["name"]))
        .with_index(IndexSpec::unique(Product::BARCODE_INDEX, &["barcode"]))
}

fn customers() -> StoreSpec {
    StoreSpec::new(Customer::STORE).with_index(IndexSpec::new(Customer::NAME_INDEX, &["name"]))
}

fn suppliers() -> StoreSpec {
    StoreSpec::new(Supplier::STORE).with_index(IndexSpec::new(Supplier::NAME_INDEX, &["name"]))
}

fn invoices() -> StoreSpec {
    StoreSpec::new(Invoice::STORE)
        .with_index(IndexSpec::new(Invoice::TYPE_INDEX, &["invoice_type"]))
        .with_index(IndexSpec::new(Invoice::CUSTOMER_INDEX, &["customer_id"]))
        .with_index(IndexSpec::new(Invoice::SUPPLIER_INDEX, &["supplier_id"]))
        .with_index(IndexSpec::new(Invoice::DATE_INDEX, &["invoice_date"]))
}

fn invoice_items() -> StoreSpec {
    StoreSpec::new(InvoiceItem::STORE)
        .with_index(IndexSpec::new(InvoiceItem::INVOICE_INDEX, &["invoice_id"]))
        .with_index(IndexSpec::new(InvoiceItem::PRODUCT_INDEX, &["product_id"]))
}

fn daily_stock() -> StoreSpec {
    StoreSpec::new(DailyStock::STORE)
        .with_index(IndexSpec::new(DailyStock::PRODUCT_INDEX, &["product_id"]))
        .with_index(IndexSpec::new(DailyStock::DATE_INDEX, &["date"]))
        .with_index(IndexSpec::unique(
            DailyStock::PRODUCT_DATE_INDEX,
            &["product_id", "date"],
        ))
}

fn stock_movements() -> StoreSpec {
    StoreSpec::new(StockMovement::STORE)
        .with_index(IndexSpec::new(StockMovement::PRODUCT_INDEX, &["product_id"]))
        .with_index(IndexSpec::new(StockMovement::INVOICE_INDEX, &["invoice_id"]))
        .with_index(IndexSpec::new(
            StockMovement::INVOICE_DATE_INDEX,
            &["invoice_date"],
        ))
}
