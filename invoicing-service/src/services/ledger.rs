//! Ledger rules: item pricing, derived totals and invoice input validation.
//!
//! Every function here is pure. Stores call [`recompute_total`] inside their
//! atomic unit so the persisted `total_amount` always matches the persisted
//! items.

use std::borrow::Cow;

use rust_decimal::Decimal;
use service_core::error::AppError;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::models::{
    CreateInvoice, CreateInvoiceItem, InvoiceChanges, InvoiceDraft, PricedItem, UpdateInvoice,
};

/// Exclusive upper bound for any stored amount (`NUMERIC(10,2)`).
pub const MONEY_LIMIT: Decimal = Decimal::from_parts(100_000_000, 0, 0, false, 0);

/// Build a single-field validation failure.
pub(crate) fn validation_error(
    field: &'static str,
    code: &'static str,
    message: impl Into<Cow<'static, str>>,
) -> AppError {
    let mut error = ValidationError::new(code);
    error.message = Some(message.into());
    let mut errors = ValidationErrors::new();
    errors.add(field, error);
    AppError::ValidationError(errors)
}

/// Reject negative values, sub-cent precision and values outside the
/// storable range.
pub(crate) fn check_money(field: &'static str, value: Decimal) -> Result<(), AppError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(validation_error(
            field,
            "range",
            format!("{field} must not be negative"),
        ));
    }
    if value.round_dp(2) != value {
        return Err(validation_error(
            field,
            "precision",
            format!("{field} must have at most two decimal places"),
        ));
    }
    if value >= MONEY_LIMIT {
        return Err(validation_error(
            field,
            "range",
            format!("{field} must be less than {MONEY_LIMIT}"),
        ));
    }
    Ok(())
}

/// Express an amount with exactly two decimal places, so `0.010` and `5`
/// serialize as `0.01` and `5.00`.
pub(crate) fn cents(value: Decimal) -> Decimal {
    let mut value = value;
    value.rescale(2);
    value
}

/// Validate one item and compute `total_price = quantity * unit_price`.
pub fn price_item(item: &CreateInvoiceItem) -> Result<PricedItem, AppError> {
    let item = CreateInvoiceItem {
        description: item.description.trim().to_string(),
        ..item.clone()
    };
    item.validate()?;
    check_money("unit_price", item.unit_price)?;

    let total_price = Decimal::from(item.quantity)
        .checked_mul(item.unit_price)
        .filter(|total| *total < MONEY_LIMIT)
        .ok_or_else(|| {
            validation_error(
                "total_price",
                "range",
                format!("quantity x unit_price must be less than {MONEY_LIMIT}"),
            )
        })?;

    Ok(PricedItem {
        description: item.description,
        quantity: item.quantity,
        unit_price: cents(item.unit_price),
        total_price: cents(total_price),
    })
}

/// Price a whole item set, failing on the first malformed item.
pub fn price_items(items: &[CreateInvoiceItem]) -> Result<Vec<PricedItem>, AppError> {
    let priced = items.iter().map(price_item).collect::<Result<Vec<_>, _>>()?;

    let total = recompute_total(priced.iter().map(|item| item.total_price));
    if total >= MONEY_LIMIT {
        return Err(validation_error(
            "items",
            "range",
            format!("invoice total must be less than {MONEY_LIMIT}"),
        ));
    }

    Ok(priced)
}

/// The derived invoice total: the sum of the items' `total_price`.
pub fn recompute_total(item_totals: impl IntoIterator<Item = Decimal>) -> Decimal {
    cents(item_totals.into_iter().sum::<Decimal>())
}

/// Description of the sale transaction recorded at creation.
pub fn sale_description(invoice_number: &str) -> String {
    format!("Sale for invoice {}", invoice_number)
}

fn trimmed(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string())
}

/// Validate and price a create request.
pub fn draft_invoice(created_by: &str, input: CreateInvoice) -> Result<InvoiceDraft, AppError> {
    let input = CreateInvoice {
        invoice_number: input.invoice_number.trim().to_string(),
        customer_name: input.customer_name.trim().to_string(),
        customer_email: input.customer_email.trim().to_string(),
        customer_address: input.customer_address.trim().to_string(),
        items: input.items,
    };
    input.validate()?;
    let items = price_items(&input.items)?;

    Ok(InvoiceDraft {
        invoice_number: input.invoice_number,
        customer_name: input.customer_name,
        customer_email: input.customer_email,
        customer_address: input.customer_address,
        created_by: created_by.to_string(),
        items,
    })
}

/// Validate and price an update request.
pub fn invoice_changes(input: UpdateInvoice) -> Result<InvoiceChanges, AppError> {
    let input = UpdateInvoice {
        invoice_number: trimmed(input.invoice_number),
        customer_name: trimmed(input.customer_name),
        customer_email: trimmed(input.customer_email),
        customer_address: trimmed(input.customer_address),
        items: input.items,
    };
    input.validate()?;
    let items = input.items.as_deref().map(price_items).transpose()?;

    Ok(InvoiceChanges {
        invoice_number: input.invoice_number,
        customer_name: input.customer_name,
        customer_email: input.customer_email,
        customer_address: input.customer_address,
        items,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(description: &str, quantity: i32, unit_price: &str) -> CreateInvoiceItem {
        CreateInvoiceItem {
            description: description.to_string(),
            quantity,
            unit_price: unit_price.parse().unwrap(),
        }
    }

    fn dec(value: &str) -> Decimal {
        value.parse().unwrap()
    }

    #[test]
    fn prices_items_and_sums_total() {
        let priced =
            price_items(&[item("Widget", 2, "10.00"), item("Gadget", 1, "5.00")]).unwrap();

        assert_eq!(priced[0].total_price, dec("20.00"));
        assert_eq!(priced[1].total_price, dec("5.00"));
        assert_eq!(
            recompute_total(priced.iter().map(|i| i.total_price)),
            dec("25.00")
        );
    }

    #[test]
    fn empty_item_set_totals_zero() {
        assert_eq!(recompute_total(Vec::new()), Decimal::ZERO);
    }

    #[test]
    fn recompute_is_idempotent() {
        let priced = price_items(&[item("A", 3, "4.00")]).unwrap();
        let first = recompute_total(priced.iter().map(|i| i.total_price));
        let second = recompute_total(priced.iter().map(|i| i.total_price));
        assert_eq!(first, second);
        assert_eq!(first, dec("12.00"));
    }

    #[test]
    fn zero_quantity_is_rejected() {
        let err = price_item(&item("Widget", 0, "10.00")).unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[test]
    fn negative_price_is_rejected() {
        let err = price_item(&item("Widget", 1, "-0.01")).unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[test]
    fn sub_cent_price_is_rejected() {
        assert!(price_item(&item("Widget", 1, "0.001")).is_err());
        assert!(price_item(&item("Widget", 1, "0.010")).is_ok());
    }

    #[test]
    fn amounts_are_normalized_to_two_places() {
        let priced = price_item(&item("Washer", 3, "0.010")).unwrap();
        assert_eq!(priced.unit_price.to_string(), "0.01");
        assert_eq!(priced.total_price.to_string(), "0.03");

        let priced = price_item(&item("Widget", 2, "5")).unwrap();
        assert_eq!(priced.total_price.to_string(), "10.00");
        assert_eq!(recompute_total(vec![priced.total_price]).to_string(), "10.00");
        assert_eq!(recompute_total(Vec::new()).to_string(), "0.00");
    }

    #[test]
    fn free_items_are_allowed() {
        let priced = price_item(&item("Sample", 5, "0")).unwrap();
        assert_eq!(priced.total_price, Decimal::ZERO);
    }

    #[test]
    fn oversized_totals_are_rejected() {
        assert!(price_item(&item("Yacht", 2, "60000000.00")).is_err());
        assert!(
            price_items(&[item("A", 1, "60000000.00"), item("B", 1, "60000000.00")]).is_err()
        );
    }

    #[test]
    fn blank_description_is_rejected_after_trimming() {
        assert!(price_item(&item("   ", 1, "1.00")).is_err());
        assert_eq!(price_item(&item("  Widget ", 1, "1.00")).unwrap().description, "Widget");
    }

    #[test]
    fn draft_requires_customer_fields() {
        let input = CreateInvoice {
            invoice_number: "INV-1".to_string(),
            customer_name: "  ".to_string(),
            customer_email: "billing@acme.test".to_string(),
            customer_address: "1 Road".to_string(),
            items: vec![],
        };
        assert!(matches!(
            draft_invoice("user-1", input),
            Err(AppError::ValidationError(_))
        ));
    }

    #[test]
    fn changes_only_price_items_when_present() {
        let changes = invoice_changes(UpdateInvoice {
            customer_name: Some(" New Name ".to_string()),
            ..UpdateInvoice::default()
        })
        .unwrap();
        assert_eq!(changes.customer_name.as_deref(), Some("New Name"));
        assert!(changes.items.is_none());

        let changes = invoice_changes(UpdateInvoice {
            items: Some(vec![item("A", 3, "4.00")]),
            ..UpdateInvoice::default()
        })
        .unwrap();
        assert_eq!(changes.items.unwrap()[0].total_price, dec("12.00"));
    }
}
