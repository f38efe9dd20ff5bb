//! Invoice handlers.
//!
//! All operations are scoped to the user from the request context.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;

use crate::{
    middleware::AuthenticatedUser,
    models::{
        CreateInvoice, InvoiceDetail, InvoiceStatistics, InvoiceSummary, PayInvoice,
        PaymentReceipt, ReplaceItems, UpdateInvoice,
    },
    startup::AppState,
};

/// List the caller's invoices, newest first.
pub async fn list_invoices(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<InvoiceSummary>>, AppError> {
    let invoices = state.invoices.list_invoices(&user.user_id).await?;
    Ok(Json(invoices))
}

/// Create an invoice with its items and opening sale transaction.
pub async fn create_invoice(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<CreateInvoice>,
) -> Result<(StatusCode, Json<InvoiceDetail>), AppError> {
    tracing::info!(
        invoice_number = %payload.invoice_number,
        user_id = %user.user_id,
        items = payload.items.len(),
        "Creating invoice"
    );

    let detail = state
        .invoices
        .create_invoice(&user.user_id, payload)
        .await?;

    Ok((StatusCode::CREATED, Json(detail)))
}

pub async fn get_invoice(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(invoice_id): Path<Uuid>,
) -> Result<Json<InvoiceDetail>, AppError> {
    let detail = state
        .invoices
        .get_invoice(&user.user_id, invoice_id)
        .await?;
    Ok(Json(detail))
}

/// Update header fields and, when `items` is present, replace the items.
pub async fn update_invoice(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(invoice_id): Path<Uuid>,
    Json(payload): Json<UpdateInvoice>,
) -> Result<Json<InvoiceDetail>, AppError> {
    tracing::info!(
        invoice_id = %invoice_id,
        user_id = %user.user_id,
        "Updating invoice"
    );

    let detail = state
        .invoices
        .update_invoice(&user.user_id, invoice_id, payload)
        .await?;
    Ok(Json(detail))
}

pub async fn replace_items(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(invoice_id): Path<Uuid>,
    Json(payload): Json<ReplaceItems>,
) -> Result<Json<InvoiceDetail>, AppError> {
    tracing::info!(
        invoice_id = %invoice_id,
        user_id = %user.user_id,
        items = payload.items.len(),
        "Replacing invoice items"
    );

    let detail = state
        .invoices
        .replace_items(&user.user_id, invoice_id, payload.items)
        .await?;
    Ok(Json(detail))
}

pub async fn delete_invoice(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(invoice_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    tracing::info!(
        invoice_id = %invoice_id,
        user_id = %user.user_id,
        "Deleting invoice"
    );

    state
        .invoices
        .delete_invoice(&user.user_id, invoice_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Mark a pending invoice as paid and record the payment.
pub async fn pay_invoice(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(invoice_id): Path<Uuid>,
    Json(payload): Json<PayInvoice>,
) -> Result<Json<PaymentReceipt>, AppError> {
    tracing::info!(
        invoice_id = %invoice_id,
        user_id = %user.user_id,
        amount = %payload.amount,
        "Paying invoice"
    );

    let receipt = state
        .invoices
        .pay_invoice(&user.user_id, invoice_id, payload)
        .await?;
    Ok(Json(receipt))
}

pub async fn statistics(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<InvoiceStatistics>, AppError> {
    let stats = state.invoices.statistics(&user.user_id).await?;
    Ok(Json(stats))
}
