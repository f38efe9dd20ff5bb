//! Storage seam for the invoice aggregate.

use async_trait::async_trait;
use service_core::error::AppError;
use uuid::Uuid;

use super::ledger::validation_error;
use crate::models::{
    InvoiceChanges, InvoiceDetail, InvoiceDraft, InvoiceStatistics, InvoiceSummary, PaymentDraft,
    Transaction,
};

/// Transactional storage for invoices, their items and their ledger.
///
/// Every method is one all-or-nothing unit over a single invoice aggregate,
/// and every lookup is scoped to `owner`: an invoice owned by someone else
/// is indistinguishable from a missing one.
#[async_trait]
pub trait InvoiceStore: Send + Sync {
    /// Persist the invoice and its items, derive `total_amount` from the
    /// stored items, and append the sale transaction for that total.
    async fn insert_invoice(&self, draft: &InvoiceDraft) -> Result<InvoiceDetail, AppError>;

    async fn find_invoice(
        &self,
        owner: &str,
        invoice_id: Uuid,
    ) -> Result<Option<InvoiceDetail>, AppError>;

    /// Summaries of the owner's invoices, newest first.
    async fn list_invoices(&self, owner: &str) -> Result<Vec<InvoiceSummary>, AppError>;

    /// Apply header changes and, when present, replace the item set and
    /// re-derive the total. Never appends a transaction.
    async fn update_invoice(
        &self,
        owner: &str,
        invoice_id: Uuid,
        changes: &InvoiceChanges,
    ) -> Result<Option<InvoiceDetail>, AppError>;

    /// Remove the invoice with its items and transactions. Returns whether
    /// anything was deleted.
    async fn delete_invoice(&self, owner: &str, invoice_id: Uuid) -> Result<bool, AppError>;

    /// Lock the invoice, check it with [`authorize_payment`], mark it paid
    /// and append the payment transaction.
    ///
    /// [`authorize_payment`]: crate::services::payment::authorize_payment
    async fn settle_invoice(
        &self,
        owner: &str,
        invoice_id: Uuid,
        payment: &PaymentDraft,
    ) -> Result<Transaction, AppError>;

    async fn statistics(&self, owner: &str) -> Result<InvoiceStatistics, AppError>;

    async fn health_check(&self) -> Result<(), AppError>;
}

pub(crate) fn invoice_not_found() -> AppError {
    AppError::NotFound(anyhow::anyhow!("Invoice not found"))
}

pub(crate) fn duplicate_invoice_number() -> AppError {
    validation_error(
        "invoice_number",
        "unique",
        "invoice with this invoice_number already exists",
    )
}
