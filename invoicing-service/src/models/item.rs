//! Invoice item model for invoicing-service.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Line item on an invoice. `total_price` is always `quantity * unit_price`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceItem {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub description: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub total_price: Decimal,
}

/// Input for an item, on create or on item replacement.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateInvoiceItem {
    #[validate(length(min = 1, max = 200, message = "description must be 1-200 characters"))]
    pub description: String,
    #[validate(range(min = 1, message = "quantity must be at least 1"))]
    pub quantity: i32,
    pub unit_price: Decimal,
}

/// An item whose price has been validated and extended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedItem {
    pub description: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub total_price: Decimal,
}

/// Body of an item replacement request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplaceItems {
    pub items: Vec<CreateInvoiceItem>,
}
