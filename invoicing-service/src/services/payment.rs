//! Payment rules for the `pending -> paid` transition.

use rust_decimal::Decimal;
use service_core::error::AppError;
use validator::Validate;

use super::ledger::{cents, validation_error};
use crate::models::{
    Invoice, InvoiceStatus, PayInvoice, PaymentDraft, DEFAULT_PAYMENT_DESCRIPTION,
};

/// Decide whether `amount` may settle `invoice`.
///
/// Stores evaluate this against the locked invoice row, so the status read
/// and the status write belong to the same atomic unit. The status check
/// comes first: paying a settled invoice is a state error whatever the
/// amount.
pub fn authorize_payment(invoice: &Invoice, amount: Decimal) -> Result<(), AppError> {
    if invoice.status != InvoiceStatus::Pending {
        return Err(AppError::InvalidState(anyhow::anyhow!(
            "Only pending invoices can be marked as paid"
        )));
    }

    if amount <= Decimal::ZERO {
        return Err(validation_error(
            "amount",
            "range",
            "Payment amount must be greater than zero",
        ));
    }

    if amount.round_dp(2) != amount {
        return Err(validation_error(
            "amount",
            "precision",
            "Payment amount must have at most two decimal places",
        ));
    }

    // An amount below the total still settles the invoice in full.
    if amount > invoice.total_amount {
        return Err(validation_error(
            "amount",
            "max",
            "Payment amount cannot exceed invoice total",
        ));
    }

    Ok(())
}

/// Normalise a pay request into the payment a store will record.
pub fn payment_draft(created_by: &str, input: PayInvoice) -> Result<PaymentDraft, AppError> {
    let input = PayInvoice {
        amount: input.amount,
        description: input.description.map(|d| d.trim().to_string()),
    };
    input.validate()?;

    // Sub-cent amounts are left as sent so `authorize_payment` rejects them.
    let amount = if input.amount.round_dp(2) == input.amount {
        cents(input.amount)
    } else {
        input.amount
    };

    Ok(PaymentDraft {
        amount,
        description: input
            .description
            .unwrap_or_else(|| DEFAULT_PAYMENT_DESCRIPTION.to_string()),
        created_by: created_by.to_string(),
    })
}
