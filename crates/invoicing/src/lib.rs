//! Invoice records and the invoice processor.
//!
//! An invoice is the only way stock moves: creating one writes the invoice,
//! its items, and the resulting stock movements in a single transaction.

pub mod invoice;
pub mod processor;

pub use invoice::{
    Invoice, InvoiceId, InvoiceItem, InvoiceItemId, InvoiceType, PaymentStatus, PriceType,
    payment_status_for,
};
pub use processor::{
    Counterparty, CreateInvoice, InvoiceError, InvoiceItemDraft, InvoiceProcessor,
};
