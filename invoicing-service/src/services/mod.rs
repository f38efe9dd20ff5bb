//! Services module for invoicing-service.

pub mod database;
pub mod invoices;
pub mod ledger;
pub mod memory;
pub mod metrics;
pub mod payment;
pub mod store;

pub use database::Database;
pub use invoices::InvoiceService;
pub use memory::InMemoryInvoiceStore;
pub use metrics::{get_metrics, init_metrics};
pub use store::InvoiceStore;
