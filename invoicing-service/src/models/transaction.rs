//! Ledger transaction model for invoicing-service.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::InvoiceStatus;

/// Default description recorded on a payment when the caller omits one.
pub const DEFAULT_PAYMENT_DESCRIPTION: &str = "Payment received";

/// Transaction type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Sale,
    Payment,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Sale => "sale",
            TransactionType::Payment => "payment",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "payment" => TransactionType::Payment,
            _ => TransactionType::Sale,
        }
    }
}

/// Append-only ledger entry against an invoice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub transaction_type: TransactionType,
    pub amount: Decimal,
    pub description: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

/// Input for paying an invoice.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PayInvoice {
    pub amount: Decimal,
    #[validate(length(min = 1, max = 200, message = "description must be 1-200 characters"))]
    pub description: Option<String>,
}

/// Payment handed to a store for settlement.
#[derive(Debug, Clone)]
pub struct PaymentDraft {
    pub amount: Decimal,
    pub description: String,
    pub created_by: String,
}

/// Acknowledgement returned by a successful payment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentReceipt {
    pub message: String,
    pub invoice_id: Uuid,
    pub status: InvoiceStatus,
    pub transaction: Transaction,
}
