//! In-process invoice store.
//!
//! A single write lock over the whole map is the atomic unit: every mutation
//! validates, then applies all of its changes before releasing the lock.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use service_core::error::AppError;
use tokio::sync::RwLock;
use tracing::{info, instrument};
use uuid::Uuid;

use super::ledger::{recompute_total, sale_description};
use super::payment::authorize_payment;
use super::store::{duplicate_invoice_number, invoice_not_found, InvoiceStore};
use crate::models::{
    Invoice, InvoiceChanges, InvoiceDetail, InvoiceDraft, InvoiceItem, InvoiceStatistics,
    InvoiceStatus, InvoiceSummary, PaymentDraft, PricedItem, Transaction, TransactionType,
};

/// Aggregate as held in memory. Transactions are kept oldest first and
/// reversed on read.
#[derive(Debug, Clone)]
struct StoredInvoice {
    invoice: Invoice,
    items: Vec<InvoiceItem>,
    transactions: Vec<Transaction>,
}

impl StoredInvoice {
    fn detail(&self) -> InvoiceDetail {
        let mut transactions = self.transactions.clone();
        transactions.reverse();
        InvoiceDetail {
            invoice: self.invoice.clone(),
            items: self.items.clone(),
            transactions,
        }
    }

    fn owned_by(&self, owner: &str) -> bool {
        self.invoice.created_by == owner
    }
}

fn materialize(invoice_id: Uuid, items: &[PricedItem]) -> Vec<InvoiceItem> {
    items
        .iter()
        .map(|item| InvoiceItem {
            id: Uuid::new_v4(),
            invoice_id,
            description: item.description.clone(),
            quantity: item.quantity,
            unit_price: item.unit_price,
            total_price: item.total_price,
        })
        .collect()
}

#[derive(Debug, Default)]
pub struct InMemoryInvoiceStore {
    invoices: RwLock<HashMap<Uuid, StoredInvoice>>,
}

impl InMemoryInvoiceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl InvoiceStore for InMemoryInvoiceStore {
    #[instrument(skip(self, draft), fields(invoice_number = %draft.invoice_number))]
    async fn insert_invoice(&self, draft: &InvoiceDraft) -> Result<InvoiceDetail, AppError> {
        let mut invoices = self.invoices.write().await;

        if invoices
            .values()
            .any(|stored| stored.invoice.invoice_number == draft.invoice_number)
        {
            return Err(duplicate_invoice_number());
        }

        let now = Utc::now();
        let invoice_id = Uuid::new_v4();
        let items = materialize(invoice_id, &draft.items);
        let total_amount = recompute_total(items.iter().map(|item| item.total_price));

        let invoice = Invoice {
            id: invoice_id,
            invoice_number: draft.invoice_number.clone(),
            customer_name: draft.customer_name.clone(),
            customer_email: draft.customer_email.clone(),
            customer_address: draft.customer_address.clone(),
            status: InvoiceStatus::Pending,
            total_amount,
            created_by: draft.created_by.clone(),
            created_at: now,
            updated_at: now,
        };
        let sale = Transaction {
            id: Uuid::new_v4(),
            invoice_id,
            transaction_type: TransactionType::Sale,
            amount: total_amount,
            description: sale_description(&draft.invoice_number),
            created_by: draft.created_by.clone(),
            created_at: now,
        };

        let stored = StoredInvoice {
            invoice,
            items,
            transactions: vec![sale],
        };
        let detail = stored.detail();
        invoices.insert(invoice_id, stored);

        info!(invoice_id = %invoice_id, total_amount = %total_amount, "Invoice created");

        Ok(detail)
    }

    async fn find_invoice(
        &self,
        owner: &str,
        invoice_id: Uuid,
    ) -> Result<Option<InvoiceDetail>, AppError> {
        let invoices = self.invoices.read().await;
        Ok(invoices
            .get(&invoice_id)
            .filter(|stored| stored.owned_by(owner))
            .map(StoredInvoice::detail))
    }

    async fn list_invoices(&self, owner: &str) -> Result<Vec<InvoiceSummary>, AppError> {
        let invoices = self.invoices.read().await;
        let mut summaries: Vec<InvoiceSummary> = invoices
            .values()
            .filter(|stored| stored.owned_by(owner))
            .map(|stored| InvoiceSummary::from(&stored.detail()))
            .collect();
        summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(summaries)
    }

    #[instrument(skip(self, changes), fields(invoice_id = %invoice_id))]
    async fn update_invoice(
        &self,
        owner: &str,
        invoice_id: Uuid,
        changes: &InvoiceChanges,
    ) -> Result<Option<InvoiceDetail>, AppError> {
        let mut invoices = self.invoices.write().await;

        if !invoices
            .get(&invoice_id)
            .is_some_and(|stored| stored.owned_by(owner))
        {
            return Ok(None);
        }

        if let Some(number) = &changes.invoice_number {
            if invoices
                .values()
                .any(|other| other.invoice.id != invoice_id && &other.invoice.invoice_number == number)
            {
                return Err(duplicate_invoice_number());
            }
        }

        let Some(stored) = invoices.get_mut(&invoice_id) else {
            return Ok(None);
        };
        let invoice = &mut stored.invoice;
        if let Some(number) = &changes.invoice_number {
            invoice.invoice_number = number.clone();
        }
        if let Some(name) = &changes.customer_name {
            invoice.customer_name = name.clone();
        }
        if let Some(email) = &changes.customer_email {
            invoice.customer_email = email.clone();
        }
        if let Some(address) = &changes.customer_address {
            invoice.customer_address = address.clone();
        }
        if let Some(items) = &changes.items {
            stored.items = materialize(invoice_id, items);
            stored.invoice.total_amount =
                recompute_total(stored.items.iter().map(|item| item.total_price));
        }
        stored.invoice.updated_at = Utc::now();

        info!(
            invoice_id = %invoice_id,
            items_replaced = changes.items.is_some(),
            total_amount = %stored.invoice.total_amount,
            "Invoice updated"
        );

        Ok(Some(stored.detail()))
    }

    async fn delete_invoice(&self, owner: &str, invoice_id: Uuid) -> Result<bool, AppError> {
        let mut invoices = self.invoices.write().await;
        if !invoices
            .get(&invoice_id)
            .is_some_and(|stored| stored.owned_by(owner))
        {
            return Ok(false);
        }
        invoices.remove(&invoice_id);
        info!(invoice_id = %invoice_id, "Invoice deleted");
        Ok(true)
    }

    #[instrument(skip(self, payment), fields(invoice_id = %invoice_id, amount = %payment.amount))]
    async fn settle_invoice(
        &self,
        owner: &str,
        invoice_id: Uuid,
        payment: &PaymentDraft,
    ) -> Result<Transaction, AppError> {
        let mut invoices = self.invoices.write().await;
        let stored = invoices
            .get_mut(&invoice_id)
            .filter(|stored| stored.owned_by(owner))
            .ok_or_else(invoice_not_found)?;

        authorize_payment(&stored.invoice, payment.amount)?;

        let now = Utc::now();
        let transaction = Transaction {
            id: Uuid::new_v4(),
            invoice_id,
            transaction_type: TransactionType::Payment,
            amount: payment.amount,
            description: payment.description.clone(),
            created_by: payment.created_by.clone(),
            created_at: now,
        };
        stored.invoice.status = InvoiceStatus::Paid;
        stored.invoice.updated_at = now;
        stored.transactions.push(transaction.clone());

        info!(invoice_id = %invoice_id, amount = %payment.amount, "Invoice marked as paid");

        Ok(transaction)
    }

    async fn statistics(&self, owner: &str) -> Result<InvoiceStatistics, AppError> {
        let invoices = self.invoices.read().await;
        let mut stats = InvoiceStatistics::default();

        for stored in invoices.values().filter(|stored| stored.owned_by(owner)) {
            stats.total_invoices += 1;
            match stored.invoice.status {
                InvoiceStatus::Pending => {
                    stats.pending_invoices += 1;
                    stats.pending_amount += stored.invoice.total_amount;
                }
                InvoiceStatus::Paid => {
                    stats.paid_invoices += 1;
                    stats.total_revenue += stored.invoice.total_amount;
                }
                InvoiceStatus::Cancelled => {}
            }
        }

        Ok(stats)
    }

    async fn health_check(&self) -> Result<(), AppError> {
        Ok(())
    }
}
