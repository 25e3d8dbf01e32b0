//! Lifecycle operations: finalize, send, accept, expire, void, archive.

use crate::engine::state::{transition, DocumentEvent};
use crate::engine::{totals, LedgerEngine};
use crate::models::{Document, DocumentStatus, DocumentType};
use crate::services::metrics::{DOCUMENTS_TOTAL, ENGINE_OP_DURATION};
use chrono::{Duration, NaiveDate, Utc};
use service_core::error::AppError;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// A quote past its expiry date, never accepted, still in a live status.
fn expiry_due(document: &Document, today: NaiveDate) -> bool {
    document.document_type == DocumentType::Quote
        && document.accepted_utc.is_none()
        && !matches!(
            document.status,
            DocumentStatus::Expired | DocumentStatus::Accepted
        )
        && document.expiry_date.map(|d| d < today).unwrap_or(false)
}

impl LedgerEngine {
    /// Lazy quote expiry, applied on every read and update path. A lost
    /// write race means someone else changed the document; the fresh row
    /// is re-evaluated instead of surfacing the conflict to a reader.
    pub(crate) async fn maybe_expire(&self, document: Document) -> Result<Document, AppError> {
        let mut document = document;
        let mut attempts = 0;
        loop {
            if !expiry_due(&document, Utc::now().date_naive()) {
                return Ok(document);
            }
            let mut expired = document.clone();
            expired.status = transition(
                expired.document_type,
                expired.status,
                DocumentEvent::Expire,
            )?;
            match self.store.update_document(&expired).await {
                Ok(stored) => {
                    DOCUMENTS_TOTAL
                        .with_label_values(&[stored.document_type.as_str(), "expired"])
                        .inc();
                    info!(document_id = %stored.document_id, "Quote expired");
                    return Ok(stored);
                }
                Err(AppError::ConcurrencyConflict(err))
                    if attempts + 1 < self.config.max_write_attempts =>
                {
                    attempts += 1;
                    warn!(error = %err, attempt = attempts, "Retrying lazy expiry");
                    document = self
                        .require_document(document.tenant_id, document.document_id)
                        .await?;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Freeze a draft document: assign its permanent number, materialize
    /// totals, and default the dates. A retry after a lost write takes a
    /// fresh number and leaves a gap, which is acceptable; numbers are
    /// never reused.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, document_id = %document_id))]
    pub async fn finalize(
        &self,
        tenant_id: Uuid,
        document_id: Uuid,
    ) -> Result<Document, AppError> {
        let timer = ENGINE_OP_DURATION
            .with_label_values(&["finalize"])
            .start_timer();
        let mut attempts = 0;
        let result = loop {
            match self.finalize_inner(tenant_id, document_id).await {
                Err(AppError::ConcurrencyConflict(err))
                    if attempts + 1 < self.config.max_write_attempts =>
                {
                    attempts += 1;
                    warn!(error = %err, attempt = attempts, "Retrying finalize");
                }
                other => break other,
            }
        };
        Self::observe(timer, result)
    }

    async fn finalize_inner(
        &self,
        tenant_id: Uuid,
        document_id: Uuid,
    ) -> Result<Document, AppError> {
        let document = self.require_document(tenant_id, document_id).await?;
        let mut document = self.maybe_expire(document).await?;

        if document.number.is_some() {
            return Err(AppError::BusinessRule(anyhow::anyhow!(
                "document is already finalized"
            )));
        }
        document.status = transition(
            document.document_type,
            document.status,
            DocumentEvent::Finalize,
        )?;

        let line_items = self.store.fetch_line_items(tenant_id, document_id).await?;
        if line_items.is_empty() {
            return Err(AppError::BusinessRule(anyhow::anyhow!(
                "cannot finalize a document without line items"
            )));
        }

        let totals = totals::document_totals(&line_items);
        document.subtotal_cents = totals.subtotal_cents;
        document.tax_total_cents = totals.tax_total_cents;
        document.total_cents = totals.total_cents;
        document.balance_due_cents = totals.total_cents - document.amount_paid_cents;

        let issue_date = document
            .issue_date
            .unwrap_or_else(|| Utc::now().date_naive());
        document.issue_date = Some(issue_date);
        if document.document_type == DocumentType::Invoice && document.due_date.is_none() {
            document.due_date = Some(issue_date + Duration::days(self.config.payment_terms_days));
        }

        document.number = Some(
            self.next_number(tenant_id, document.document_type)
                .await?,
        );
        document.finalized_utc = Some(Utc::now());

        let stored = self.store.update_document(&document).await?;

        DOCUMENTS_TOTAL
            .with_label_values(&[stored.document_type.as_str(), "finalized"])
            .inc();
        info!(
            document_id = %stored.document_id,
            number = %stored.number.as_deref().unwrap_or(""),
            total_cents = stored.total_cents,
            "Document finalized"
        );

        Ok(stored)
    }

    /// Mark a finalized document as sent. Sets `sent_utc` once; calling
    /// again is a no-op. The documented contract is finalize-then-send.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, document_id = %document_id))]
    pub async fn send(&self, tenant_id: Uuid, document_id: Uuid) -> Result<Document, AppError> {
        let timer = ENGINE_OP_DURATION.with_label_values(&["send"]).start_timer();
        let result = self.send_inner(tenant_id, document_id).await;
        Self::observe(timer, result)
    }

    async fn send_inner(&self, tenant_id: Uuid, document_id: Uuid) -> Result<Document, AppError> {
        let document = self.require_document(tenant_id, document_id).await?;
        let mut document = self.maybe_expire(document).await?;

        if document.number.is_none() {
            return Err(AppError::BusinessRule(anyhow::anyhow!(
                "document must be finalized before it can be sent"
            )));
        }
        let next_status = transition(
            document.document_type,
            document.status,
            DocumentEvent::Send,
        )?;

        if document.sent_utc.is_some() && next_status == document.status {
            return Ok(document);
        }
        if document.sent_utc.is_none() {
            document.sent_utc = Some(Utc::now());
        }
        document.status = next_status;

        let stored = self.store.update_document(&document).await?;
        DOCUMENTS_TOTAL
            .with_label_values(&[stored.document_type.as_str(), "sent"])
            .inc();
        info!(document_id = %stored.document_id, "Document sent");
        Ok(stored)
    }

    /// Accept a quote. Terminal: an accepted quote never expires.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, document_id = %document_id))]
    pub async fn accept_quote(
        &self,
        tenant_id: Uuid,
        document_id: Uuid,
    ) -> Result<Document, AppError> {
        let timer = ENGINE_OP_DURATION
            .with_label_values(&["accept_quote"])
            .start_timer();
        let result = self.accept_quote_inner(tenant_id, document_id).await;
        Self::observe(timer, result)
    }

    async fn accept_quote_inner(
        &self,
        tenant_id: Uuid,
        document_id: Uuid,
    ) -> Result<Document, AppError> {
        let document = self.require_document(tenant_id, document_id).await?;
        let mut document = self.maybe_expire(document).await?;

        document.status = transition(
            document.document_type,
            document.status,
            DocumentEvent::Accept,
        )?;
        document.accepted_utc = Some(Utc::now());

        let stored = self.store.update_document(&document).await?;
        DOCUMENTS_TOTAL
            .with_label_values(&[stored.document_type.as_str(), "accepted"])
            .inc();
        info!(document_id = %stored.document_id, "Quote accepted");
        Ok(stored)
    }

    /// Void an invoice. Requires a zero balance; absolutely terminal.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, document_id = %document_id))]
    pub async fn void_invoice(
        &self,
        tenant_id: Uuid,
        document_id: Uuid,
    ) -> Result<Document, AppError> {
        let timer = ENGINE_OP_DURATION
            .with_label_values(&["void_invoice"])
            .start_timer();
        let result = self.void_invoice_inner(tenant_id, document_id).await;
        Self::observe(timer, result)
    }

    async fn void_invoice_inner(
        &self,
        tenant_id: Uuid,
        document_id: Uuid,
    ) -> Result<Document, AppError> {
        let mut document = self.require_document(tenant_id, document_id).await?;

        let next_status = transition(
            document.document_type,
            document.status,
            DocumentEvent::Void,
        )?;
        if document.balance_due_cents > 0 {
            return Err(AppError::BusinessRule(anyhow::anyhow!(
                "outstanding balance"
            )));
        }
        document.status = next_status;
        document.voided_utc = Some(Utc::now());

        let stored = self.store.update_document(&document).await?;
        DOCUMENTS_TOTAL
            .with_label_values(&[stored.document_type.as_str(), "voided"])
            .inc();
        info!(document_id = %stored.document_id, "Invoice voided");
        Ok(stored)
    }

    /// Archive a document. Invoices must be settled (Paid or Void) first.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, document_id = %document_id))]
    pub async fn archive(&self, tenant_id: Uuid, document_id: Uuid) -> Result<Document, AppError> {
        let timer = ENGINE_OP_DURATION
            .with_label_values(&["archive"])
            .start_timer();
        let result = self.archive_inner(tenant_id, document_id).await;
        Self::observe(timer, result)
    }

    async fn archive_inner(
        &self,
        tenant_id: Uuid,
        document_id: Uuid,
    ) -> Result<Document, AppError> {
        let document = self.require_document(tenant_id, document_id).await?;
        let mut document = self.maybe_expire(document).await?;

        if document.archived_utc.is_some() {
            return Err(AppError::BusinessRule(anyhow::anyhow!(
                "document is already archived"
            )));
        }
        if document.document_type == DocumentType::Invoice
            && !matches!(
                document.status,
                DocumentStatus::Paid | DocumentStatus::Void
            )
        {
            return Err(AppError::BusinessRule(anyhow::anyhow!(
                "cannot archive unpaid invoice"
            )));
        }
        document.archived_utc = Some(Utc::now());

        let stored = self.store.update_document(&document).await?;
        info!(document_id = %stored.document_id, "Document archived");
        Ok(stored)
    }
}
