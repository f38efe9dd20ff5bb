//! Invoice model for invoicing-service.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::{CreateInvoiceItem, InvoiceItem, PricedItem, Transaction};

/// Invoice status.
///
/// The only transition the service performs is `Pending -> Paid`.
/// `Cancelled` exists for records set by administrative tooling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Pending,
    Paid,
    Cancelled,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Pending => "pending",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "paid" => InvoiceStatus::Paid,
            "cancelled" => InvoiceStatus::Cancelled,
            _ => InvoiceStatus::Pending,
        }
    }
}

/// Invoice header. `total_amount` is derived from the items and is never
/// accepted from callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    pub id: Uuid,
    pub invoice_number: String,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_address: String,
    pub status: InvoiceStatus,
    pub total_amount: Decimal,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The invoice aggregate: header, items and ledger (newest first).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceDetail {
    #[serde(flatten)]
    pub invoice: Invoice,
    pub items: Vec<InvoiceItem>,
    pub transactions: Vec<Transaction>,
}

/// Row of the invoice listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceSummary {
    pub id: Uuid,
    pub invoice_number: String,
    pub customer_name: String,
    pub customer_email: String,
    pub status: InvoiceStatus,
    pub total_amount: Decimal,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    pub items_count: i64,
}

/// Per-owner aggregates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceStatistics {
    pub total_invoices: i64,
    pub pending_invoices: i64,
    pub paid_invoices: i64,
    pub total_revenue: Decimal,
    pub pending_amount: Decimal,
}

/// Input for creating an invoice.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateInvoice {
    #[validate(length(min = 1, max = 50, message = "invoice_number must be 1-50 characters"))]
    pub invoice_number: String,
    #[validate(length(min = 1, max = 200, message = "customer_name must be 1-200 characters"))]
    pub customer_name: String,
    #[validate(email(message = "customer_email must be a valid email address"))]
    pub customer_email: String,
    #[validate(length(min = 1, message = "customer_address is required"))]
    pub customer_address: String,
    #[serde(default)]
    pub items: Vec<CreateInvoiceItem>,
}

/// Input for updating an invoice. Absent fields are left unchanged; a
/// present `items` list replaces the whole item set.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateInvoice {
    #[validate(length(min = 1, max = 50, message = "invoice_number must be 1-50 characters"))]
    pub invoice_number: Option<String>,
    #[validate(length(min = 1, max = 200, message = "customer_name must be 1-200 characters"))]
    pub customer_name: Option<String>,
    #[validate(email(message = "customer_email must be a valid email address"))]
    pub customer_email: Option<String>,
    #[validate(length(min = 1, message = "customer_address is required"))]
    pub customer_address: Option<String>,
    pub items: Option<Vec<CreateInvoiceItem>>,
}

/// Validated, priced input handed to a store for insertion.
#[derive(Debug, Clone)]
pub struct InvoiceDraft {
    pub invoice_number: String,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_address: String,
    pub created_by: String,
    pub items: Vec<PricedItem>,
}

/// Validated, priced changes handed to a store for an update.
#[derive(Debug, Clone, Default)]
pub struct InvoiceChanges {
    pub invoice_number: Option<String>,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub customer_address: Option<String>,
    pub items: Option<Vec<PricedItem>>,
}

impl InvoiceChanges {
    pub fn replace_items(items: Vec<PricedItem>) -> Self {
        Self {
            items: Some(items),
            ..Self::default()
        }
    }
}

impl From<&InvoiceDetail> for InvoiceSummary {
    fn from(detail: &InvoiceDetail) -> Self {
        let invoice = &detail.invoice;
        Self {
            id: invoice.id,
            invoice_number: invoice.invoice_number.clone(),
            customer_name: invoice.customer_name.clone(),
            customer_email: invoice.customer_email.clone(),
            status: invoice.status,
            total_amount: invoice.total_amount,
            created_at: invoice.created_at,
            created_by: invoice.created_by.clone(),
            items_count: detail.items.len() as i64,
        }
    }
}
