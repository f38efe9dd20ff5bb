//! Invoice use cases on top of an [`InvoiceStore`].

use std::sync::Arc;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use service_core::error::AppError;
use tracing::{info, instrument};
use uuid::Uuid;

use super::ledger::{self, draft_invoice, invoice_changes, price_items};
use super::metrics::{ERRORS_TOTAL, INVOICES_TOTAL, PAYMENT_AMOUNT_TOTAL};
use super::payment::payment_draft;
use super::store::{invoice_not_found, InvoiceStore};
use crate::models::{
    CreateInvoice, CreateInvoiceItem, InvoiceChanges, InvoiceDetail, InvoiceStatistics,
    InvoiceStatus, InvoiceSummary, PayInvoice, PaymentReceipt, UpdateInvoice,
};

pub const PAYMENT_SUCCESS_MESSAGE: &str = "Invoice marked as paid successfully";

fn record_error<T>(result: Result<T, AppError>) -> Result<T, AppError> {
    if let Err(e) = &result {
        ERRORS_TOTAL.with_label_values(&[e.kind()]).inc();
    }
    result
}

/// Owner-scoped invoice operations shared by every transport.
#[derive(Clone)]
pub struct InvoiceService {
    store: Arc<dyn InvoiceStore>,
}

impl InvoiceService {
    pub fn new(store: Arc<dyn InvoiceStore>) -> Self {
        Self { store }
    }

    #[instrument(skip(self, input), fields(owner = %owner))]
    pub async fn create_invoice(
        &self,
        owner: &str,
        input: CreateInvoice,
    ) -> Result<InvoiceDetail, AppError> {
        let result = async {
            let draft = draft_invoice(owner, input)?;
            self.store.insert_invoice(&draft).await
        }
        .await;

        let detail = record_error(result)?;
        INVOICES_TOTAL.with_label_values(&["created"]).inc();
        Ok(detail)
    }

    #[instrument(skip(self), fields(owner = %owner))]
    pub async fn get_invoice(&self, owner: &str, invoice_id: Uuid) -> Result<InvoiceDetail, AppError> {
        let result = self
            .store
            .find_invoice(owner, invoice_id)
            .await
            .and_then(|found| found.ok_or_else(invoice_not_found));
        record_error(result)
    }

    #[instrument(skip(self), fields(owner = %owner))]
    pub async fn list_invoices(&self, owner: &str) -> Result<Vec<InvoiceSummary>, AppError> {
        record_error(self.store.list_invoices(owner).await)
    }

    #[instrument(skip(self, input), fields(owner = %owner))]
    pub async fn update_invoice(
        &self,
        owner: &str,
        invoice_id: Uuid,
        input: UpdateInvoice,
    ) -> Result<InvoiceDetail, AppError> {
        let result = async {
            let changes = invoice_changes(input)?;
            self.apply_changes(owner, invoice_id, &changes).await
        }
        .await;
        record_error(result)
    }

    /// Replace the whole item set and re-derive the total. The sale
    /// transaction recorded at creation is left as it was.
    #[instrument(skip(self, items), fields(owner = %owner, items = items.len()))]
    pub async fn replace_items(
        &self,
        owner: &str,
        invoice_id: Uuid,
        items: Vec<CreateInvoiceItem>,
    ) -> Result<InvoiceDetail, AppError> {
        let result = async {
            let priced = price_items(&items)?;
            self.apply_changes(owner, invoice_id, &InvoiceChanges::replace_items(priced))
                .await
        }
        .await;
        record_error(result)
    }

    async fn apply_changes(
        &self,
        owner: &str,
        invoice_id: Uuid,
        changes: &InvoiceChanges,
    ) -> Result<InvoiceDetail, AppError> {
        let detail = self
            .store
            .update_invoice(owner, invoice_id, changes)
            .await?
            .ok_or_else(invoice_not_found)?;
        INVOICES_TOTAL.with_label_values(&["updated"]).inc();
        Ok(detail)
    }

    #[instrument(skip(self), fields(owner = %owner))]
    pub async fn delete_invoice(&self, owner: &str, invoice_id: Uuid) -> Result<(), AppError> {
        let result = match self.store.delete_invoice(owner, invoice_id).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(invoice_not_found()),
            Err(e) => Err(e),
        };
        record_error(result)?;
        INVOICES_TOTAL.with_label_values(&["deleted"]).inc();
        Ok(())
    }

    /// Settle a pending invoice. On success the invoice is `paid` and exactly
    /// one payment transaction has been appended.
    #[instrument(skip(self, input), fields(owner = %owner, amount = %input.amount))]
    pub async fn pay_invoice(
        &self,
        owner: &str,
        invoice_id: Uuid,
        input: PayInvoice,
    ) -> Result<PaymentReceipt, AppError> {
        let result = async {
            let payment = payment_draft(owner, input)?;
            self.store.settle_invoice(owner, invoice_id, &payment).await
        }
        .await;

        let transaction = record_error(result)?;
        INVOICES_TOTAL.with_label_values(&["paid"]).inc();
        PAYMENT_AMOUNT_TOTAL.inc_by(transaction.amount.to_f64().unwrap_or_default());

        info!(
            invoice_id = %invoice_id,
            transaction_id = %transaction.id,
            "Payment recorded"
        );

        Ok(PaymentReceipt {
            message: PAYMENT_SUCCESS_MESSAGE.to_string(),
            invoice_id,
            status: InvoiceStatus::Paid,
            transaction,
        })
    }

    #[instrument(skip(self), fields(owner = %owner))]
    pub async fn statistics(&self, owner: &str) -> Result<InvoiceStatistics, AppError> {
        record_error(self.store.statistics(owner).await)
    }

    /// Derive the total from the invoice's stored items.
    pub async fn recompute_total(&self, owner: &str, invoice_id: Uuid) -> Result<Decimal, AppError> {
        let detail = self.get_invoice(owner, invoice_id).await?;
        Ok(ledger::recompute_total(
            detail.items.iter().map(|item| item.total_price),
        ))
    }

    pub async fn health_check(&self) -> Result<(), AppError> {
        self.store.health_check().await
    }
}
