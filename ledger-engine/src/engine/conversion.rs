//! Quote to invoice conversion.

use crate::engine::LedgerEngine;
use crate::models::{Document, DocumentStatus, DocumentType, LineItem};
use crate::services::metrics::{DOCUMENTS_TOTAL, ENGINE_OP_DURATION};
use chrono::Utc;
use service_core::error::AppError;
use tracing::{info, instrument};
use uuid::Uuid;

impl LedgerEngine {
    /// Create a draft invoice from an accepted quote.
    ///
    /// Line items are deep-copied: fresh ids, identical
    /// position/description/quantity/price and tax snapshot. The source
    /// quote is left untouched.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, quote_id = %quote_id))]
    pub async fn convert_quote_to_invoice(
        &self,
        tenant_id: Uuid,
        quote_id: Uuid,
    ) -> Result<(Document, Vec<LineItem>), AppError> {
        let timer = ENGINE_OP_DURATION
            .with_label_values(&["convert_quote_to_invoice"])
            .start_timer();
        let result = self.convert_inner(tenant_id, quote_id).await;
        Self::observe(timer, result)
    }

    async fn convert_inner(
        &self,
        tenant_id: Uuid,
        quote_id: Uuid,
    ) -> Result<(Document, Vec<LineItem>), AppError> {
        let quote = self.require_document(tenant_id, quote_id).await?;
        let quote = self.maybe_expire(quote).await?;

        if quote.document_type == DocumentType::Invoice {
            return Err(AppError::BusinessRule(anyhow::anyhow!(
                "document is already an invoice"
            )));
        }
        if quote.status != DocumentStatus::Accepted {
            return Err(AppError::BusinessRule(anyhow::anyhow!(
                "only accepted quotes can be converted"
            )));
        }

        let quote_lines = self.store.fetch_line_items(tenant_id, quote_id).await?;

        let invoice_id = Uuid::new_v4();
        let now = Utc::now();
        let invoice = Document {
            document_id: invoice_id,
            tenant_id,
            document_type: DocumentType::Invoice,
            number: None,
            status: DocumentStatus::Draft,
            client_id: quote.client_id,
            project_id: quote.project_id,
            po_number: quote.po_number.clone(),
            issue_date: None,
            due_date: None,
            expiry_date: None,
            notes: quote.notes.clone(),
            subtotal_cents: quote.subtotal_cents,
            tax_total_cents: quote.tax_total_cents,
            total_cents: quote.total_cents,
            amount_paid_cents: 0,
            balance_due_cents: quote.total_cents,
            row_version: 0,
            created_utc: now,
            finalized_utc: None,
            sent_utc: None,
            accepted_utc: None,
            voided_utc: None,
            archived_utc: None,
        };

        let invoice_lines: Vec<LineItem> = quote_lines
            .iter()
            .map(|line| LineItem {
                line_item_id: Uuid::new_v4(),
                document_id: invoice_id,
                tenant_id,
                position: line.position,
                description: line.description.clone(),
                quantity: line.quantity,
                unit_price_cents: line.unit_price_cents,
                tax_rate_percent: line.tax_rate_percent,
                subtotal_cents: line.subtotal_cents,
                tax_cents: line.tax_cents,
                total_cents: line.total_cents,
                created_utc: now,
            })
            .collect();

        self.store
            .insert_document_with_line_items(&invoice, &invoice_lines)
            .await?;

        DOCUMENTS_TOTAL
            .with_label_values(&["invoice", "converted"])
            .inc();
        info!(
            quote_id = %quote_id,
            invoice_id = %invoice_id,
            line_count = invoice_lines.len(),
            "Quote converted to invoice"
        );

        Ok((invoice, invoice_lines))
    }
}
