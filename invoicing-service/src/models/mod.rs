//! Domain models for invoicing-service.

mod invoice;
mod item;
mod transaction;

pub use invoice::{
    CreateInvoice, Invoice, InvoiceChanges, InvoiceDetail, InvoiceDraft, InvoiceStatistics,
    InvoiceStatus, InvoiceSummary, UpdateInvoice,
};
pub use item::{CreateInvoiceItem, InvoiceItem, PricedItem, ReplaceItems};
pub use transaction::{
    PayInvoice, PaymentDraft, PaymentReceipt, Transaction, TransactionType,
    DEFAULT_PAYMENT_DESCRIPTION,
};
