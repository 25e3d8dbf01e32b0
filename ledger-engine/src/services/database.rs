//! PostgreSQL store for the document ledger engine.
//!
//! The schema is dumb persistence: no triggers, no SQL-side numbering.
//! Every derived field arrives from the engine; this layer only makes the
//! writes atomic and enforces the optimistic `row_version` check.

use crate::models::{
    Document, DocumentType, Expense, LineItem, ListDocumentsFilter, NumberSequence, Payment,
};
use crate::services::metrics::DB_QUERY_DURATION;
use crate::services::store::DocumentStore;
use async_trait::async_trait;
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

const DOCUMENT_COLUMNS: &str = "document_id, tenant_id, document_type, number, status, client_id, project_id, po_number, \
     issue_date, due_date, expiry_date, notes, subtotal_cents, tax_total_cents, total_cents, \
     amount_paid_cents, balance_due_cents, row_version, created_utc, finalized_utc, sent_utc, \
     accepted_utc, voided_utc, archived_utc";

// "position" needs quoting: POSITION is reserved in PostgreSQL.
const LINE_ITEM_COLUMNS: &str = r#"line_item_id, document_id, tenant_id, "position", description, quantity, unit_price_cents, tax_rate_percent, subtotal_cents, tax_cents, total_cents, created_utc"#;

const PAYMENT_COLUMNS: &str = "payment_id, tenant_id, invoice_id, payment_date, amount_cents, method, reference, created_utc";

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "ledger-engine"))]
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

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
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

    /// Versioned document update inside an open transaction.
    async fn update_document_in_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        document: &Document,
    ) -> Result<Document, AppError> {
        let updated = sqlx::query_as::<_, Document>(&format!(
            r#"
            UPDATE documents
            SET document_type = $4, number = $5, status = $6, client_id = $7, project_id = $8,
                po_number = $9, issue_date = $10, due_date = $11, expiry_date = $12, notes = $13,
                subtotal_cents = $14, tax_total_cents = $15, total_cents = $16,
                amount_paid_cents = $17, balance_due_cents = $18, finalized_utc = $19,
                sent_utc = $20, accepted_utc = $21, voided_utc = $22, archived_utc = $23,
                row_version = row_version + 1
            WHERE tenant_id = $1 AND document_id = $2 AND row_version = $3
            RETURNING {DOCUMENT_COLUMNS}
            "#
        ))
        .bind(document.tenant_id)
        .bind(document.document_id)
        .bind(document.row_version)
        .bind(document.document_type)
        .bind(&document.number)
        .bind(document.status)
        .bind(document.client_id)
        .bind(document.project_id)
        .bind(&document.po_number)
        .bind(document.issue_date)
        .bind(document.due_date)
        .bind(document.expiry_date)
        .bind(&document.notes)
        .bind(document.subtotal_cents)
        .bind(document.tax_total_cents)
        .bind(document.total_cents)
        .bind(document.amount_paid_cents)
        .bind(document.balance_due_cents)
        .bind(document.finalized_utc)
        .bind(document.sent_utc)
        .bind(document.accepted_utc)
        .bind(document.voided_utc)
        .bind(document.archived_utc)
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to update document: {}", e)))?;

        updated.ok_or_else(|| {
            AppError::ConcurrencyConflict(anyhow::anyhow!(
                "stale version {} for document {}",
                document.row_version,
                document.document_id
            ))
        })
    }

    async fn insert_line_item_in_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        line: &LineItem,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO line_items (
                line_item_id, document_id, tenant_id, "position", description, quantity,
                unit_price_cents, tax_rate_percent, subtotal_cents, tax_cents, total_cents, created_utc
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (line_item_id) DO UPDATE
            SET "position" = EXCLUDED."position",
                description = EXCLUDED.description,
                quantity = EXCLUDED.quantity,
                unit_price_cents = EXCLUDED.unit_price_cents,
                tax_rate_percent = EXCLUDED.tax_rate_percent,
                subtotal_cents = EXCLUDED.subtotal_cents,
                tax_cents = EXCLUDED.tax_cents,
                total_cents = EXCLUDED.total_cents
            "#,
        )
        .bind(line.line_item_id)
        .bind(line.document_id)
        .bind(line.tenant_id)
        .bind(line.position)
        .bind(&line.description)
        .bind(line.quantity)
        .bind(line.unit_price_cents)
        .bind(line.tax_rate_percent)
        .bind(line.subtotal_cents)
        .bind(line.tax_cents)
        .bind(line.total_cents)
        .bind(line.created_utc)
        .execute(&mut **tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to write line item: {}", e)))?;
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for Database {
    #[instrument(skip(self, document), fields(tenant_id = %document.tenant_id))]
    async fn insert_document(&self, document: &Document) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_document"])
            .start_timer();

        sqlx::query(
            r#"
            INSERT INTO documents (
                document_id, tenant_id, document_type, number, status, client_id, project_id,
                po_number, issue_date, due_date, expiry_date, notes, subtotal_cents,
                tax_total_cents, total_cents, amount_paid_cents, balance_due_cents, row_version,
                created_utc, finalized_utc, sent_utc, accepted_utc, voided_utc, archived_utc
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17,
                $18, $19, $20, $21, $22, $23, $24)
            "#,
        )
        .bind(document.document_id)
        .bind(document.tenant_id)
        .bind(document.document_type)
        .bind(&document.number)
        .bind(document.status)
        .bind(document.client_id)
        .bind(document.project_id)
        .bind(&document.po_number)
        .bind(document.issue_date)
        .bind(document.due_date)
        .bind(document.expiry_date)
        .bind(&document.notes)
        .bind(document.subtotal_cents)
        .bind(document.tax_total_cents)
        .bind(document.total_cents)
        .bind(document.amount_paid_cents)
        .bind(document.balance_due_cents)
        .bind(document.row_version)
        .bind(document.created_utc)
        .bind(document.finalized_utc)
        .bind(document.sent_utc)
        .bind(document.accepted_utc)
        .bind(document.voided_utc)
        .bind(document.archived_utc)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to insert document: {}", e)))?;

        timer.observe_duration();
        info!(document_id = %document.document_id, "Document inserted");
        Ok(())
    }

    #[instrument(skip(self, document, line_items), fields(tenant_id = %document.tenant_id))]
    async fn insert_document_with_line_items(
        &self,
        document: &Document,
        line_items: &[LineItem],
    ) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_document_with_line_items"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        sqlx::query(
            r#"
            INSERT INTO documents (
                document_id, tenant_id, document_type, number, status, client_id, project_id,
                po_number, issue_date, due_date, expiry_date, notes, subtotal_cents,
                tax_total_cents, total_cents, amount_paid_cents, balance_due_cents, row_version,
                created_utc, finalized_utc, sent_utc, accepted_utc, voided_utc, archived_utc
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17,
                $18, $19, $20, $21, $22, $23, $24)
            "#,
        )
        .bind(document.document_id)
        .bind(document.tenant_id)
        .bind(document.document_type)
        .bind(&document.number)
        .bind(document.status)
        .bind(document.client_id)
        .bind(document.project_id)
        .bind(&document.po_number)
        .bind(document.issue_date)
        .bind(document.due_date)
        .bind(document.expiry_date)
        .bind(&document.notes)
        .bind(document.subtotal_cents)
        .bind(document.tax_total_cents)
        .bind(document.total_cents)
        .bind(document.amount_paid_cents)
        .bind(document.balance_due_cents)
        .bind(document.row_version)
        .bind(document.created_utc)
        .bind(document.finalized_utc)
        .bind(document.sent_utc)
        .bind(document.accepted_utc)
        .bind(document.voided_utc)
        .bind(document.archived_utc)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to insert document: {}", e)))?;

        for line in line_items {
            Self::insert_line_item_in_tx(&mut tx, line).await?;
        }

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();
        info!(
            document_id = %document.document_id,
            line_count = line_items.len(),
            "Document inserted with line items"
        );
        Ok(())
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, document_id = %document_id))]
    async fn fetch_document(
        &self,
        tenant_id: Uuid,
        document_id: Uuid,
    ) -> Result<Option<Document>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["fetch_document"])
            .start_timer();

        let document = sqlx::query_as::<_, Document>(&format!(
            r#"
            SELECT {DOCUMENT_COLUMNS}
            FROM documents
            WHERE tenant_id = $1 AND document_id = $2
            "#
        ))
        .bind(tenant_id)
        .bind(document_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to fetch document: {}", e)))?;

        timer.observe_duration();
        Ok(document)
    }

    #[instrument(skip(self, filter), fields(tenant_id = %tenant_id))]
    async fn list_documents(
        &self,
        tenant_id: Uuid,
        filter: &ListDocumentsFilter,
    ) -> Result<Vec<Document>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_documents"])
            .start_timer();

        let limit = filter.page_size.clamp(1, 100) as i64;
        let type_str = filter.document_type.map(|t| t.as_str().to_string());
        let status_str = filter.status.map(|s| s.as_str().to_string());

        let documents = if let Some(cursor) = filter.page_token {
            sqlx::query_as::<_, Document>(&format!(
                r#"
                SELECT {DOCUMENT_COLUMNS}
                FROM documents
                WHERE tenant_id = $1
                  AND ($2::varchar IS NULL OR document_type = $2)
                  AND ($3::varchar IS NULL OR status = $3)
                  AND ($4::uuid IS NULL OR client_id = $4)
                  AND document_id > $5
                ORDER BY document_id
                LIMIT $6
                "#
            ))
            .bind(tenant_id)
            .bind(&type_str)
            .bind(&status_str)
            .bind(filter.client_id)
            .bind(cursor)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
        } else {
            sqlx::query_as::<_, Document>(&format!(
                r#"
                SELECT {DOCUMENT_COLUMNS}
                FROM documents
                WHERE tenant_id = $1
                  AND ($2::varchar IS NULL OR document_type = $2)
                  AND ($3::varchar IS NULL OR status = $3)
                  AND ($4::uuid IS NULL OR client_id = $4)
                ORDER BY document_id
                LIMIT $5
                "#
            ))
            .bind(tenant_id)
            .bind(&type_str)
            .bind(&status_str)
            .bind(filter.client_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
        }
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list documents: {}", e)))?;

        timer.observe_duration();
        Ok(documents)
    }

    #[instrument(skip(self, document), fields(tenant_id = %document.tenant_id, document_id = %document.document_id))]
    async fn update_document(&self, document: &Document) -> Result<Document, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_document"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;
        let updated = Self::update_document_in_tx(&mut tx, document).await?;
        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();
        Ok(updated)
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, document_id = %document_id))]
    async fn delete_document(
        &self,
        tenant_id: Uuid,
        document_id: Uuid,
    ) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_document"])
            .start_timer();

        // Line items go with the document via ON DELETE CASCADE.
        let result = sqlx::query(
            r#"
            DELETE FROM documents
            WHERE tenant_id = $1 AND document_id = $2
            "#,
        )
        .bind(tenant_id)
        .bind(document_id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to delete document: {}", e)))?;

        timer.observe_duration();

        let deleted = result.rows_affected() > 0;
        if deleted {
            info!(document_id = %document_id, "Document deleted");
        }
        Ok(deleted)
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, document_id = %document_id))]
    async fn fetch_line_items(
        &self,
        tenant_id: Uuid,
        document_id: Uuid,
    ) -> Result<Vec<LineItem>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["fetch_line_items"])
            .start_timer();

        let line_items = sqlx::query_as::<_, LineItem>(&format!(
            r#"
            SELECT {LINE_ITEM_COLUMNS}
            FROM line_items
            WHERE tenant_id = $1 AND document_id = $2
            ORDER BY "position", created_utc
            "#
        ))
        .bind(tenant_id)
        .bind(document_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to fetch line items: {}", e))
        })?;

        timer.observe_duration();
        Ok(line_items)
    }

    #[instrument(skip(self, document, upserts, removals), fields(document_id = %document.document_id))]
    async fn write_line_items(
        &self,
        document: &Document,
        upserts: &[LineItem],
        removals: &[Uuid],
    ) -> Result<Document, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["write_line_items"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let updated = Self::update_document_in_tx(&mut tx, document).await?;

        for line in upserts {
            Self::insert_line_item_in_tx(&mut tx, line).await?;
        }

        if !removals.is_empty() {
            let removal_ids: Vec<Uuid> = removals.to_vec();
            sqlx::query(
                r#"
                DELETE FROM line_items
                WHERE tenant_id = $1 AND document_id = $2 AND line_item_id = ANY($3)
                "#,
            )
            .bind(document.tenant_id)
            .bind(document.document_id)
            .bind(&removal_ids)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to remove line items: {}", e))
            })?;
        }

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();
        Ok(updated)
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, invoice_id = %invoice_id))]
    async fn fetch_payments(
        &self,
        tenant_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Vec<Payment>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["fetch_payments"])
            .start_timer();

        let payments = sqlx::query_as::<_, Payment>(&format!(
            r#"
            SELECT {PAYMENT_COLUMNS}
            FROM payments
            WHERE tenant_id = $1 AND invoice_id = $2
            ORDER BY payment_date, created_utc
            "#
        ))
        .bind(tenant_id)
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to fetch payments: {}", e)))?;

        timer.observe_duration();
        Ok(payments)
    }

    #[instrument(skip(self, document, payment), fields(invoice_id = %payment.invoice_id))]
    async fn insert_payment_with_totals(
        &self,
        document: &Document,
        payment: &Payment,
    ) -> Result<Document, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_payment_with_totals"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let updated = Self::update_document_in_tx(&mut tx, document).await?;

        sqlx::query(
            r#"
            INSERT INTO payments (
                payment_id, tenant_id, invoice_id, payment_date, amount_cents, method,
                reference, created_utc
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(payment.payment_id)
        .bind(payment.tenant_id)
        .bind(payment.invoice_id)
        .bind(payment.payment_date)
        .bind(payment.amount_cents)
        .bind(&payment.method)
        .bind(&payment.reference)
        .bind(payment.created_utc)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to insert payment: {}", e)))?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();
        info!(payment_id = %payment.payment_id, "Payment inserted");
        Ok(updated)
    }

    #[instrument(skip(self, document), fields(payment_id = %payment_id))]
    async fn delete_payment_with_totals(
        &self,
        document: &Document,
        payment_id: Uuid,
    ) -> Result<Document, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_payment_with_totals"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let updated = Self::update_document_in_tx(&mut tx, document).await?;

        let result = sqlx::query(
            r#"
            DELETE FROM payments
            WHERE tenant_id = $1 AND invoice_id = $2 AND payment_id = $3
            "#,
        )
        .bind(document.tenant_id)
        .bind(document.document_id)
        .bind(payment_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to delete payment: {}", e)))?;

        if result.rows_affected() == 0 {
            tx.rollback().await.ok();
            return Err(AppError::NotFound(anyhow::anyhow!(
                "payment {payment_id} not found"
            )));
        }

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();
        info!(payment_id = %payment_id, "Payment deleted");
        Ok(updated)
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, expense_id = %expense_id))]
    async fn fetch_expense(
        &self,
        tenant_id: Uuid,
        expense_id: Uuid,
    ) -> Result<Option<Expense>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["fetch_expense"])
            .start_timer();

        let expense = sqlx::query_as::<_, Expense>(
            r#"
            SELECT expense_id, tenant_id, description, expense_date, total_amount_cents,
                billable, billing_status, linked_invoice_id, created_utc
            FROM expenses
            WHERE tenant_id = $1 AND expense_id = $2
            "#,
        )
        .bind(tenant_id)
        .bind(expense_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to fetch expense: {}", e)))?;

        timer.observe_duration();
        Ok(expense)
    }

    #[instrument(skip(self, document, line_items, expense_ids), fields(document_id = %document.document_id))]
    async fn link_expenses(
        &self,
        document: &Document,
        line_items: &[LineItem],
        expense_ids: &[Uuid],
    ) -> Result<Document, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["link_expenses"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let updated = Self::update_document_in_tx(&mut tx, document).await?;

        for line in line_items {
            Self::insert_line_item_in_tx(&mut tx, line).await?;
        }

        for &expense_id in expense_ids {
            let result = sqlx::query(
                r#"
                UPDATE expenses
                SET billing_status = 'billed', linked_invoice_id = $3
                WHERE tenant_id = $1 AND expense_id = $2
                  AND billable = TRUE AND billing_status = 'unbilled'
                "#,
            )
            .bind(document.tenant_id)
            .bind(expense_id)
            .bind(document.document_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to link expense: {}", e))
            })?;

            if result.rows_affected() == 0 {
                tx.rollback().await.ok();
                return Err(AppError::ConcurrencyConflict(anyhow::anyhow!(
                    "expense {expense_id} was billed concurrently"
                )));
            }
        }

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();
        info!(
            document_id = %document.document_id,
            expense_count = expense_ids.len(),
            "Expenses linked"
        );
        Ok(updated)
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, document_type = %document_type))]
    async fn increment_sequence(
        &self,
        tenant_id: Uuid,
        document_type: DocumentType,
        default_prefix: &str,
        default_padding: i32,
    ) -> Result<NumberSequence, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["increment_sequence"])
            .start_timer();

        // Single-statement upsert: the row lock taken by the conflicting
        // insert serializes concurrent finalize calls for one
        // (tenant, type), so no two callers receive the same value.
        let sequence = sqlx::query_as::<_, NumberSequence>(
            r#"
            INSERT INTO number_sequences (tenant_id, document_type, prefix, current_value, padding)
            VALUES ($1, $2, $3, 1, $4)
            ON CONFLICT (tenant_id, document_type)
            DO UPDATE SET current_value = number_sequences.current_value + 1
            RETURNING tenant_id, document_type, prefix, current_value, padding, created_utc
            "#,
        )
        .bind(tenant_id)
        .bind(document_type)
        .bind(default_prefix)
        .bind(default_padding)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to increment sequence: {}", e))
        })?;

        timer.observe_duration();
        Ok(sequence)
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, project_id = %project_id))]
    async fn project_default_po_number(
        &self,
        tenant_id: Uuid,
        project_id: Uuid,
    ) -> Result<Option<String>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["project_default_po_number"])
            .start_timer();

        let po_number: Option<Option<String>> = sqlx::query_scalar(
            r#"
            SELECT default_po_number
            FROM projects
            WHERE tenant_id = $1 AND project_id = $2
            "#,
        )
        .bind(tenant_id)
        .bind(project_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to fetch project PO number: {}", e))
        })?;

        timer.observe_duration();
        Ok(po_number.flatten())
    }

    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;
        Ok(())
    }
}
