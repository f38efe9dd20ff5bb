//! PostgreSQL invoice store for invoicing-service.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use service_core::error::AppError;
use sqlx::postgres::{PgConnection, PgPool, PgPoolOptions};
use sqlx::FromRow;
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

use super::ledger::sale_description;
use super::payment::authorize_payment;
use super::store::{duplicate_invoice_number, invoice_not_found, InvoiceStore};
use crate::models::{
    Invoice, InvoiceChanges, InvoiceDetail, InvoiceDraft, InvoiceItem, InvoiceStatistics,
    InvoiceStatus, InvoiceSummary, PaymentDraft, PricedItem, Transaction, TransactionType,
};
use crate::services::metrics::DB_QUERY_DURATION;

#[derive(Debug, FromRow)]
struct InvoiceRow {
    invoice_id: Uuid,
    invoice_number: String,
    customer_name: String,
    customer_email: String,
    customer_address: String,
    status: String,
    total_amount: Decimal,
    created_by: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<InvoiceRow> for Invoice {
    fn from(row: InvoiceRow) -> Self {
        Self {
            id: row.invoice_id,
            invoice_number: row.invoice_number,
            customer_name: row.customer_name,
            customer_email: row.customer_email,
            customer_address: row.customer_address,
            status: InvoiceStatus::from_string(&row.status),
            total_amount: row.total_amount,
            created_by: row.created_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct SummaryRow {
    invoice_id: Uuid,
    invoice_number: String,
    customer_name: String,
    customer_email: String,
    status: String,
    total_amount: Decimal,
    created_at: DateTime<Utc>,
    created_by: String,
    items_count: i64,
}

impl From<SummaryRow> for InvoiceSummary {
    fn from(row: SummaryRow) -> Self {
        Self {
            id: row.invoice_id,
            invoice_number: row.invoice_number,
            customer_name: row.customer_name,
            customer_email: row.customer_email,
            status: InvoiceStatus::from_string(&row.status),
            total_amount: row.total_amount,
            created_at: row.created_at,
            created_by: row.created_by,
            items_count: row.items_count,
        }
    }
}

#[derive(Debug, FromRow)]
struct ItemRow {
    item_id: Uuid,
    invoice_id: Uuid,
    description: String,
    quantity: i32,
    unit_price: Decimal,
    total_price: Decimal,
}

impl From<ItemRow> for InvoiceItem {
    fn from(row: ItemRow) -> Self {
        Self {
            id: row.item_id,
            invoice_id: row.invoice_id,
            description: row.description,
            quantity: row.quantity,
            unit_price: row.unit_price,
            total_price: row.total_price,
        }
    }
}

#[derive(Debug, FromRow)]
struct TransactionRow {
    transaction_id: Uuid,
    invoice_id: Uuid,
    transaction_type: String,
    amount: Decimal,
    description: String,
    created_by: String,
    created_at: DateTime<Utc>,
}

impl From<TransactionRow> for Transaction {
    fn from(row: TransactionRow) -> Self {
        Self {
            id: row.transaction_id,
            invoice_id: row.invoice_id,
            transaction_type: TransactionType::from_string(&row.transaction_type),
            amount: row.amount,
            description: row.description,
            created_by: row.created_by,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct StatisticsRow {
    total_invoices: i64,
    pending_invoices: i64,
    paid_invoices: i64,
    total_revenue: Decimal,
    pending_amount: Decimal,
}

fn db_error(context: &'static str) -> impl FnOnce(sqlx::Error) -> AppError {
    move |e| AppError::DatabaseError(anyhow::anyhow!("{}: {}", context, e))
}

fn unique_or_db_error(context: &'static str) -> impl FnOnce(sqlx::Error) -> AppError {
    move |e| match e {
        sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
            duplicate_invoice_number()
        }
        _ => AppError::DatabaseError(anyhow::anyhow!("{}: {}", context, e)),
    }
}

async fn insert_items(
    conn: &mut PgConnection,
    invoice_id: Uuid,
    items: &[PricedItem],
) -> Result<(), AppError> {
    for item in items {
        sqlx::query(
            r#"
            INSERT INTO invoice_items (item_id, invoice_id, description, quantity, unit_price, total_price)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(invoice_id)
        .bind(&item.description)
        .bind(item.quantity)
        .bind(item.unit_price)
        .bind(item.total_price)
        .execute(&mut *conn)
        .await
        .map_err(db_error("Failed to insert invoice item"))?;
    }
    Ok(())
}

/// Load items and transactions (newest first) for an invoice row.
async fn load_detail(conn: &mut PgConnection, row: InvoiceRow) -> Result<InvoiceDetail, AppError> {
    let items = sqlx::query_as::<_, ItemRow>(
        r#"
        SELECT item_id, invoice_id, description, quantity, unit_price, total_price
        FROM invoice_items
        WHERE invoice_id = $1
        ORDER BY position
        "#,
    )
    .bind(row.invoice_id)
    .fetch_all(&mut *conn)
    .await
    .map_err(db_error("Failed to get invoice items"))?;

    let transactions = sqlx::query_as::<_, TransactionRow>(
        r#"
        SELECT transaction_id, invoice_id, transaction_type, amount, description, created_by, created_at
        FROM invoice_transactions
        WHERE invoice_id = $1
        ORDER BY created_at DESC, position DESC
        "#,
    )
    .bind(row.invoice_id)
    .fetch_all(&mut *conn)
    .await
    .map_err(db_error("Failed to get invoice transactions"))?;

    Ok(InvoiceDetail {
        invoice: row.into(),
        items: items.into_iter().map(Into::into).collect(),
        transactions: transactions.into_iter().map(Into::into).collect(),
    })
}

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "invoicing-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }
}

#[async_trait]
impl InvoiceStore for Database {
    #[instrument(skip(self, draft), fields(invoice_number = %draft.invoice_number))]
    async fn insert_invoice(&self, draft: &InvoiceDraft) -> Result<InvoiceDetail, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_invoice"])
            .start_timer();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_error("Failed to begin transaction"))?;

        let invoice_id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO invoices (
                invoice_id, invoice_number, customer_name, customer_email, customer_address,
                status, total_amount, created_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, 0, $7)
            "#,
        )
        .bind(invoice_id)
        .bind(&draft.invoice_number)
        .bind(&draft.customer_name)
        .bind(&draft.customer_email)
        .bind(&draft.customer_address)
        .bind(InvoiceStatus::Pending.as_str())
        .bind(&draft.created_by)
        .execute(&mut *tx)
        .await
        .map_err(unique_or_db_error("Failed to create invoice"))?;

        insert_items(&mut tx, invoice_id, &draft.items).await?;

        let row = sqlx::query_as::<_, InvoiceRow>(
            r#"
            UPDATE invoices
            SET total_amount = (
                    SELECT COALESCE(SUM(total_price), 0) FROM invoice_items WHERE invoice_id = $1
                ),
                updated_at = NOW()
            WHERE invoice_id = $1
            RETURNING invoice_id, invoice_number, customer_name, customer_email, customer_address,
                status, total_amount, created_by, created_at, updated_at
            "#,
        )
        .bind(invoice_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_error("Failed to compute invoice total"))?;

        sqlx::query(
            r#"
            INSERT INTO invoice_transactions (
                transaction_id, invoice_id, transaction_type, amount, description, created_by
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(invoice_id)
        .bind(TransactionType::Sale.as_str())
        .bind(row.total_amount)
        .bind(sale_description(&draft.invoice_number))
        .bind(&draft.created_by)
        .execute(&mut *tx)
        .await
        .map_err(db_error("Failed to record sale transaction"))?;

        let detail = load_detail(&mut tx, row).await?;

        tx.commit()
            .await
            .map_err(db_error("Failed to commit transaction"))?;

        timer.observe_duration();

        info!(
            invoice_id = %invoice_id,
            total_amount = %detail.invoice.total_amount,
            "Invoice created"
        );

        Ok(detail)
    }

    #[instrument(skip(self), fields(invoice_id = %invoice_id))]
    async fn find_invoice(
        &self,
        owner: &str,
        invoice_id: Uuid,
    ) -> Result<Option<InvoiceDetail>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["find_invoice"])
            .start_timer();

        // Header, items and transactions are read from one snapshot so a
        // concurrent item replacement cannot mix old and new rows.
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_error("Failed to begin transaction"))?;

        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await
            .map_err(db_error("Failed to set snapshot isolation"))?;

        let row = sqlx::query_as::<_, InvoiceRow>(
            r#"
            SELECT invoice_id, invoice_number, customer_name, customer_email, customer_address,
                status, total_amount, created_by, created_at, updated_at
            FROM invoices
            WHERE invoice_id = $1 AND created_by = $2
            "#,
        )
        .bind(invoice_id)
        .bind(owner)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_error("Failed to get invoice"))?;

        let detail = match row {
            Some(row) => Some(load_detail(&mut tx, row).await?),
            None => None,
        };

        tx.commit()
            .await
            .map_err(db_error("Failed to commit transaction"))?;

        timer.observe_duration();

        Ok(detail)
    }

    #[instrument(skip(self))]
    async fn list_invoices(&self, owner: &str) -> Result<Vec<InvoiceSummary>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_invoices"])
            .start_timer();

        let rows = sqlx::query_as::<_, SummaryRow>(
            r#"
            SELECT i.invoice_id, i.invoice_number, i.customer_name, i.customer_email, i.status,
                i.total_amount, i.created_at, i.created_by,
                (SELECT COUNT(*) FROM invoice_items it WHERE it.invoice_id = i.invoice_id) AS items_count
            FROM invoices i
            WHERE i.created_by = $1
            ORDER BY i.created_at DESC, i.invoice_id
            "#,
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to list invoices"))?;

        timer.observe_duration();

        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self, changes), fields(invoice_id = %invoice_id))]
    async fn update_invoice(
        &self,
        owner: &str,
        invoice_id: Uuid,
        changes: &InvoiceChanges,
    ) -> Result<Option<InvoiceDetail>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_invoice"])
            .start_timer();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_error("Failed to begin transaction"))?;

        let locked = sqlx::query_scalar::<_, Uuid>(
            "SELECT invoice_id FROM invoices WHERE invoice_id = $1 AND created_by = $2 FOR UPDATE",
        )
        .bind(invoice_id)
        .bind(owner)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_error("Failed to lock invoice"))?;

        if locked.is_none() {
            tx.rollback().await.ok();
            return Ok(None);
        }

        if let Some(items) = &changes.items {
            sqlx::query("DELETE FROM invoice_items WHERE invoice_id = $1")
                .bind(invoice_id)
                .execute(&mut *tx)
                .await
                .map_err(db_error("Failed to remove invoice items"))?;

            insert_items(&mut tx, invoice_id, items).await?;
        }

        let row = sqlx::query_as::<_, InvoiceRow>(
            r#"
            UPDATE invoices
            SET invoice_number = COALESCE($2, invoice_number),
                customer_name = COALESCE($3, customer_name),
                customer_email = COALESCE($4, customer_email),
                customer_address = COALESCE($5, customer_address),
                total_amount = (
                    SELECT COALESCE(SUM(total_price), 0) FROM invoice_items WHERE invoice_id = $1
                ),
                updated_at = NOW()
            WHERE invoice_id = $1
            RETURNING invoice_id, invoice_number, customer_name, customer_email, customer_address,
                status, total_amount, created_by, created_at, updated_at
            "#,
        )
        .bind(invoice_id)
        .bind(&changes.invoice_number)
        .bind(&changes.customer_name)
        .bind(&changes.customer_email)
        .bind(&changes.customer_address)
        .fetch_one(&mut *tx)
        .await
        .map_err(unique_or_db_error("Failed to update invoice"))?;

        let detail = load_detail(&mut tx, row).await?;

        tx.commit()
            .await
            .map_err(db_error("Failed to commit transaction"))?;

        timer.observe_duration();

        info!(
            invoice_id = %invoice_id,
            items_replaced = changes.items.is_some(),
            total_amount = %detail.invoice.total_amount,
            "Invoice updated"
        );

        Ok(Some(detail))
    }

    #[instrument(skip(self), fields(invoice_id = %invoice_id))]
    async fn delete_invoice(&self, owner: &str, invoice_id: Uuid) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_invoice"])
            .start_timer();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_error("Failed to begin transaction"))?;

        let locked = sqlx::query_scalar::<_, Uuid>(
            "SELECT invoice_id FROM invoices WHERE invoice_id = $1 AND created_by = $2 FOR UPDATE",
        )
        .bind(invoice_id)
        .bind(owner)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_error("Failed to lock invoice"))?;

        if locked.is_none() {
            tx.rollback().await.ok();
            return Ok(false);
        }

        for statement in [
            "DELETE FROM invoice_transactions WHERE invoice_id = $1",
            "DELETE FROM invoice_items WHERE invoice_id = $1",
            "DELETE FROM invoices WHERE invoice_id = $1",
        ] {
            sqlx::query(statement)
                .bind(invoice_id)
                .execute(&mut *tx)
                .await
                .map_err(db_error("Failed to delete invoice"))?;
        }

        tx.commit()
            .await
            .map_err(db_error("Failed to commit transaction"))?;

        timer.observe_duration();

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
        let timer = DB_QUERY_DURATION
            .with_label_values(&["settle_invoice"])
            .start_timer();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_error("Failed to begin transaction"))?;

        // Row lock: a concurrent payment waits here and then sees `paid`.
        let invoice: Invoice = sqlx::query_as::<_, InvoiceRow>(
            r#"
            SELECT invoice_id, invoice_number, customer_name, customer_email, customer_address,
                status, total_amount, created_by, created_at, updated_at
            FROM invoices
            WHERE invoice_id = $1 AND created_by = $2
            FOR UPDATE
            "#,
        )
        .bind(invoice_id)
        .bind(owner)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_error("Failed to lock invoice"))?
        .ok_or_else(invoice_not_found)?
        .into();

        if let Err(e) = authorize_payment(&invoice, payment.amount) {
            tx.rollback().await.ok();
            return Err(e);
        }

        sqlx::query("UPDATE invoices SET status = $2, updated_at = NOW() WHERE invoice_id = $1")
            .bind(invoice_id)
            .bind(InvoiceStatus::Paid.as_str())
            .execute(&mut *tx)
            .await
            .map_err(db_error("Failed to mark invoice as paid"))?;

        let transaction = sqlx::query_as::<_, TransactionRow>(
            r#"
            INSERT INTO invoice_transactions (
                transaction_id, invoice_id, transaction_type, amount, description, created_by
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING transaction_id, invoice_id, transaction_type, amount, description, created_by, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(invoice_id)
        .bind(TransactionType::Payment.as_str())
        .bind(payment.amount)
        .bind(&payment.description)
        .bind(&payment.created_by)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_error("Failed to record payment transaction"))?;

        tx.commit()
            .await
            .map_err(db_error("Failed to commit transaction"))?;

        timer.observe_duration();

        info!(
            invoice_id = %invoice_id,
            transaction_id = %transaction.transaction_id,
            amount = %payment.amount,
            "Invoice marked as paid"
        );

        Ok(transaction.into())
    }

    #[instrument(skip(self))]
    async fn statistics(&self, owner: &str) -> Result<InvoiceStatistics, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["statistics"])
            .start_timer();

        let row = sqlx::query_as::<_, StatisticsRow>(
            r#"
            SELECT COUNT(*) AS total_invoices,
                COUNT(*) FILTER (WHERE status = 'pending') AS pending_invoices,
                COUNT(*) FILTER (WHERE status = 'paid') AS paid_invoices,
                COALESCE(SUM(total_amount) FILTER (WHERE status = 'paid'), 0) AS total_revenue,
                COALESCE(SUM(total_amount) FILTER (WHERE status = 'pending'), 0) AS pending_amount
            FROM invoices
            WHERE created_by = $1
            "#,
        )
        .bind(owner)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("Failed to compute statistics"))?;

        timer.observe_duration();

        Ok(InvoiceStatistics {
            total_invoices: row.total_invoices,
            pending_invoices: row.pending_invoices,
            paid_invoices: row.paid_invoices,
            total_revenue: row.total_revenue,
            pending_amount: row.pending_amount,
        })
    }

    /// Check database health.
    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;
        Ok(())
    }
}
