//! Line item mutations on draft documents.
//!
//! Every mutation recomputes the owning document's materialized totals
//! from the full line set and commits both in one atomic store write.

use crate::engine::{totals, LedgerEngine};
use crate::models::{CreateLineItem, Document, DocumentStatus, LineItem, UpdateLineItem};
use crate::services::metrics::ENGINE_OP_DURATION;
use chrono::Utc;
use service_core::error::AppError;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

fn apply_totals(document: &mut Document, line_items: &[LineItem]) {
    let totals = totals::document_totals(line_items);
    document.subtotal_cents = totals.subtotal_cents;
    document.tax_total_cents = totals.tax_total_cents;
    document.total_cents = totals.total_cents;
    document.balance_due_cents = totals.total_cents - document.amount_paid_cents;
}

impl LedgerEngine {
    async fn require_draft(
        &self,
        tenant_id: Uuid,
        document_id: Uuid,
    ) -> Result<Document, AppError> {
        let document = self.require_document(tenant_id, document_id).await?;
        let document = self.maybe_expire(document).await?;
        if document.status != DocumentStatus::Draft {
            return Err(AppError::BusinessRule(anyhow::anyhow!(
                "line items can only be edited on draft documents"
            )));
        }
        Ok(document)
    }

    /// Add a line item to a draft document.
    #[instrument(skip(self, input), fields(tenant_id = %tenant_id, document_id = %document_id))]
    pub async fn add_line_item(
        &self,
        tenant_id: Uuid,
        document_id: Uuid,
        input: &CreateLineItem,
    ) -> Result<(Document, LineItem), AppError> {
        let timer = ENGINE_OP_DURATION
            .with_label_values(&["add_line_item"])
            .start_timer();
        let mut attempts = 0;
        let result = loop {
            match self.add_line_item_inner(tenant_id, document_id, input).await {
                Err(AppError::ConcurrencyConflict(err))
                    if attempts + 1 < self.config.max_write_attempts =>
                {
                    attempts += 1;
                    warn!(error = %err, attempt = attempts, "Retrying line item add");
                }
                other => break other,
            }
        };
        Self::observe(timer, result)
    }

    async fn add_line_item_inner(
        &self,
        tenant_id: Uuid,
        document_id: Uuid,
        input: &CreateLineItem,
    ) -> Result<(Document, LineItem), AppError> {
        input.validate()?;
        let mut document = self.require_draft(tenant_id, document_id).await?;

        let amounts =
            totals::line_amounts(input.quantity, input.unit_price_cents, input.tax_rate_percent)?;

        let existing = self.store.fetch_line_items(tenant_id, document_id).await?;
        let position = match input.position {
            Some(position) if position < 1 => {
                return Err(AppError::InvalidInput(anyhow::anyhow!(
                    "position must be at least 1"
                )));
            }
            Some(position) => position,
            None => existing.iter().map(|l| l.position).max().unwrap_or(0) + 1,
        };

        let line_item = LineItem {
            line_item_id: Uuid::new_v4(),
            document_id,
            tenant_id,
            position,
            description: input.description.clone(),
            quantity: input.quantity,
            unit_price_cents: input.unit_price_cents,
            tax_rate_percent: input.tax_rate_percent,
            subtotal_cents: amounts.subtotal_cents,
            tax_cents: amounts.tax_cents,
            total_cents: amounts.total_cents,
            created_utc: Utc::now(),
        };

        let mut all = existing;
        all.push(line_item.clone());
        apply_totals(&mut document, &all);

        let stored = self
            .store
            .write_line_items(&document, std::slice::from_ref(&line_item), &[])
            .await?;

        info!(line_item_id = %line_item.line_item_id, document_id = %document_id, "Line item added");
        Ok((stored, line_item))
    }

    /// Update a line item on a draft document.
    #[instrument(skip(self, input), fields(tenant_id = %tenant_id, line_item_id = %line_item_id))]
    pub async fn update_line_item(
        &self,
        tenant_id: Uuid,
        document_id: Uuid,
        line_item_id: Uuid,
        input: &UpdateLineItem,
    ) -> Result<(Document, LineItem), AppError> {
        let timer = ENGINE_OP_DURATION
            .with_label_values(&["update_line_item"])
            .start_timer();
        let mut attempts = 0;
        let result = loop {
            match self
                .update_line_item_inner(tenant_id, document_id, line_item_id, input)
                .await
            {
                Err(AppError::ConcurrencyConflict(err))
                    if attempts + 1 < self.config.max_write_attempts =>
                {
                    attempts += 1;
                    warn!(error = %err, attempt = attempts, "Retrying line item update");
                }
                other => break other,
            }
        };
        Self::observe(timer, result)
    }

    async fn update_line_item_inner(
        &self,
        tenant_id: Uuid,
        document_id: Uuid,
        line_item_id: Uuid,
        input: &UpdateLineItem,
    ) -> Result<(Document, LineItem), AppError> {
        input.validate()?;
        let mut document = self.require_draft(tenant_id, document_id).await?;

        let mut line_items = self.store.fetch_line_items(tenant_id, document_id).await?;
        let index = line_items
            .iter()
            .position(|l| l.line_item_id == line_item_id)
            .ok_or_else(|| {
                AppError::NotFound(anyhow::anyhow!("line item {line_item_id} not found"))
            })?;

        let mut line_item = line_items[index].clone();
        if let Some(ref description) = input.description {
            line_item.description = description.clone();
        }
        if let Some(quantity) = input.quantity {
            line_item.quantity = quantity;
        }
        if let Some(unit_price_cents) = input.unit_price_cents {
            line_item.unit_price_cents = unit_price_cents;
        }
        // The snapshot is applied as given; None clears it.
        line_item.tax_rate_percent = input.tax_rate_percent;
        if let Some(position) = input.position {
            if position < 1 {
                return Err(AppError::InvalidInput(anyhow::anyhow!(
                    "position must be at least 1"
                )));
            }
            line_item.position = position;
        }

        let amounts = totals::line_amounts(
            line_item.quantity,
            line_item.unit_price_cents,
            line_item.tax_rate_percent,
        )?;
        line_item.subtotal_cents = amounts.subtotal_cents;
        line_item.tax_cents = amounts.tax_cents;
        line_item.total_cents = amounts.total_cents;

        line_items[index] = line_item.clone();
        apply_totals(&mut document, &line_items);

        let stored = self
            .store
            .write_line_items(&document, std::slice::from_ref(&line_item), &[])
            .await?;

        info!(line_item_id = %line_item_id, "Line item updated");
        Ok((stored, line_item))
    }

    /// Remove a line item from a draft document.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, line_item_id = %line_item_id))]
    pub async fn remove_line_item(
        &self,
        tenant_id: Uuid,
        document_id: Uuid,
        line_item_id: Uuid,
    ) -> Result<Document, AppError> {
        let timer = ENGINE_OP_DURATION
            .with_label_values(&["remove_line_item"])
            .start_timer();
        let mut attempts = 0;
        let result = loop {
            match self
                .remove_line_item_inner(tenant_id, document_id, line_item_id)
                .await
            {
                Err(AppError::ConcurrencyConflict(err))
                    if attempts + 1 < self.config.max_write_attempts =>
                {
                    attempts += 1;
                    warn!(error = %err, attempt = attempts, "Retrying line item removal");
                }
                other => break other,
            }
        };
        Self::observe(timer, result)
    }

    async fn remove_line_item_inner(
        &self,
        tenant_id: Uuid,
        document_id: Uuid,
        line_item_id: Uuid,
    ) -> Result<Document, AppError> {
        let mut document = self.require_draft(tenant_id, document_id).await?;

        let mut line_items = self.store.fetch_line_items(tenant_id, document_id).await?;
        let before = line_items.len();
        line_items.retain(|l| l.line_item_id != line_item_id);
        if line_items.len() == before {
            return Err(AppError::NotFound(anyhow::anyhow!(
                "line item {line_item_id} not found"
            )));
        }

        apply_totals(&mut document, &line_items);

        let stored = self
            .store
            .write_line_items(&document, &[], &[line_item_id])
            .await?;

        info!(line_item_id = %line_item_id, "Line item removed");
        Ok(stored)
    }
}
