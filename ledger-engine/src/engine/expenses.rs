//! Expense billing linkage.
//!
//! Billable, unbilled expenses become invoice line items (quantity 1, the
//! expense total as the unit price, no tax) and are marked billed in the
//! same atomic write. Conflicts are collected upfront and reported
//! per-item; nothing is written unless every expense qualifies.

use crate::engine::{totals, LedgerEngine};
use crate::models::{BillingStatus, Document, DocumentStatus, DocumentType, LineItem};
use crate::services::metrics::ENGINE_OP_DURATION;
use chrono::Utc;
use service_core::error::AppError;
use std::collections::HashSet;
use tracing::{info, instrument, warn};
use uuid::Uuid;

impl LedgerEngine {
    /// Bill expenses onto a draft invoice.
    #[instrument(skip(self, expense_ids), fields(tenant_id = %tenant_id, invoice_id = %invoice_id, count = expense_ids.len()))]
    pub async fn add_expenses_to_invoice(
        &self,
        tenant_id: Uuid,
        invoice_id: Uuid,
        expense_ids: &[Uuid],
    ) -> Result<(Document, Vec<LineItem>), AppError> {
        let timer = ENGINE_OP_DURATION
            .with_label_values(&["add_expenses_to_invoice"])
            .start_timer();
        let mut attempts = 0;
        let result = loop {
            match self
                .add_expenses_inner(tenant_id, invoice_id, expense_ids)
                .await
            {
                Err(AppError::ConcurrencyConflict(err))
                    if attempts + 1 < self.config.max_write_attempts =>
                {
                    attempts += 1;
                    warn!(error = %err, attempt = attempts, "Retrying expense billing");
                }
                other => break other,
            }
        };
        Self::observe(timer, result)
    }

    async fn add_expenses_inner(
        &self,
        tenant_id: Uuid,
        invoice_id: Uuid,
        expense_ids: &[Uuid],
    ) -> Result<(Document, Vec<LineItem>), AppError> {
        if expense_ids.is_empty() {
            return Err(AppError::InvalidInput(anyhow::anyhow!(
                "no expenses provided"
            )));
        }
        let unique: HashSet<Uuid> = expense_ids.iter().copied().collect();
        if unique.len() != expense_ids.len() {
            return Err(AppError::InvalidInput(anyhow::anyhow!(
                "duplicate expense ids"
            )));
        }

        let mut document = self.require_document(tenant_id, invoice_id).await?;
        if document.document_type != DocumentType::Invoice {
            return Err(AppError::InvalidInput(anyhow::anyhow!(
                "expenses can only be billed to invoices"
            )));
        }
        if document.status != DocumentStatus::Draft {
            return Err(AppError::BusinessRule(anyhow::anyhow!(
                "expenses can only be added to a draft invoice"
            )));
        }

        let mut expenses = Vec::with_capacity(expense_ids.len());
        let mut conflicts: Vec<String> = Vec::new();
        for &expense_id in expense_ids {
            let expense = self
                .store
                .fetch_expense(tenant_id, expense_id)
                .await?
                .ok_or_else(|| {
                    AppError::NotFound(anyhow::anyhow!("expense {expense_id} not found"))
                })?;
            if !expense.billable {
                conflicts.push(format!("expense {expense_id} is not billable"));
            } else if expense.billing_status != BillingStatus::Unbilled {
                conflicts.push(format!(
                    "expense {expense_id} is already {}",
                    expense.billing_status
                ));
            }
            expenses.push(expense);
        }
        if !conflicts.is_empty() {
            return Err(AppError::BusinessRule(anyhow::anyhow!(
                "{}",
                conflicts.join("; ")
            )));
        }

        let existing = self.store.fetch_line_items(tenant_id, invoice_id).await?;
        let mut next_position = existing.iter().map(|l| l.position).max().unwrap_or(0) + 1;

        let now = Utc::now();
        let mut new_lines = Vec::with_capacity(expenses.len());
        for expense in &expenses {
            let amounts =
                totals::line_amounts(rust_decimal::Decimal::ONE, expense.total_amount_cents, None)?;
            new_lines.push(LineItem {
                line_item_id: Uuid::new_v4(),
                document_id: invoice_id,
                tenant_id,
                position: next_position,
                description: expense.description.clone(),
                quantity: rust_decimal::Decimal::ONE,
                unit_price_cents: expense.total_amount_cents,
                tax_rate_percent: None,
                subtotal_cents: amounts.subtotal_cents,
                tax_cents: amounts.tax_cents,
                total_cents: amounts.total_cents,
                created_utc: now,
            });
            next_position += 1;
        }

        let mut all = existing;
        all.extend(new_lines.iter().cloned());
        let totals = totals::document_totals(&all);
        document.subtotal_cents = totals.subtotal_cents;
        document.tax_total_cents = totals.tax_total_cents;
        document.total_cents = totals.total_cents;
        document.balance_due_cents = totals.total_cents - document.amount_paid_cents;

        let stored = self
            .store
            .link_expenses(&document, &new_lines, expense_ids)
            .await?;

        info!(
            invoice_id = %invoice_id,
            expense_count = expenses.len(),
            total_cents = stored.total_cents,
            "Expenses billed to invoice"
        );
        Ok((stored, new_lines))
    }
}
