//! The document ledger engine.
//!
//! `LedgerEngine` is the application-service owner of all derived state:
//! numbers, totals, balances and statuses are computed here and written
//! through the storage collaborator as atomic units. Route layers call
//! these operations with an already-resolved tenant id.

pub mod conversion;
pub mod expenses;
pub mod lifecycle;
pub mod line_items;
pub mod numbering;
pub mod payments;
pub mod state;
pub mod totals;

use crate::config::LedgerConfig;
use crate::models::{
    CreateDocument, Document, DocumentStatus, DocumentType, LineItem, ListDocumentsFilter,
    UpdateDocument,
};
use crate::services::metrics::{DOCUMENTS_TOTAL, ENGINE_OP_DURATION, ERRORS_TOTAL};
use crate::services::store::DocumentStore;
use chrono::Utc;
use service_core::error::AppError;
use std::sync::Arc;
use self::totals::DocumentTotals;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

/// Engine facade over the storage collaborator.
#[derive(Clone)]
pub struct LedgerEngine {
    pub(crate) store: Arc<dyn DocumentStore>,
    pub(crate) config: LedgerConfig,
}

impl LedgerEngine {
    pub fn new(store: Arc<dyn DocumentStore>, config: LedgerConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Record op duration and error kind for a finished operation.
    pub(crate) fn observe<T>(
        timer: prometheus::HistogramTimer,
        result: Result<T, AppError>,
    ) -> Result<T, AppError> {
        timer.observe_duration();
        if let Err(ref err) = result {
            ERRORS_TOTAL.with_label_values(&[err.kind()]).inc();
        }
        result
    }

    pub(crate) async fn require_document(
        &self,
        tenant_id: Uuid,
        document_id: Uuid,
    ) -> Result<Document, AppError> {
        self.store
            .fetch_document(tenant_id, document_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("document {document_id} not found")))
    }

    /// Create a draft document. The PO number is a one-time snapshot: when
    /// absent and a project is attached, the project default is copied
    /// here and never re-synced afterward.
    #[instrument(skip(self, input), fields(tenant_id = %input.tenant_id))]
    pub async fn create_document(&self, input: &CreateDocument) -> Result<Document, AppError> {
        let timer = ENGINE_OP_DURATION
            .with_label_values(&["create_document"])
            .start_timer();
        let result = self.create_document_inner(input).await;
        Self::observe(timer, result)
    }

    async fn create_document_inner(&self, input: &CreateDocument) -> Result<Document, AppError> {
        input.validate()?;
        match input.document_type {
            DocumentType::Quote if input.due_date.is_some() => {
                return Err(AppError::InvalidInput(anyhow::anyhow!(
                    "quotes carry an expiry date, not a due date"
                )));
            }
            DocumentType::Invoice if input.expiry_date.is_some() => {
                return Err(AppError::InvalidInput(anyhow::anyhow!(
                    "invoices carry a due date, not an expiry date"
                )));
            }
            _ => {}
        }

        let mut po_number = input.po_number.clone().filter(|po| !po.is_empty());
        if po_number.is_none() {
            if let Some(project_id) = input.project_id {
                po_number = self
                    .store
                    .project_default_po_number(input.tenant_id, project_id)
                    .await?
                    .filter(|po| !po.is_empty());
            }
        }

        let document = Document {
            document_id: Uuid::new_v4(),
            tenant_id: input.tenant_id,
            document_type: input.document_type,
            number: None,
            status: DocumentStatus::Draft,
            client_id: input.client_id,
            project_id: input.project_id,
            po_number,
            issue_date: None,
            due_date: input.due_date,
            expiry_date: input.expiry_date,
            notes: input.notes.clone(),
            subtotal_cents: 0,
            tax_total_cents: 0,
            total_cents: 0,
            amount_paid_cents: 0,
            balance_due_cents: 0,
            row_version: 0,
            created_utc: Utc::now(),
            finalized_utc: None,
            sent_utc: None,
            accepted_utc: None,
            voided_utc: None,
            archived_utc: None,
        };

        self.store.insert_document(&document).await?;

        DOCUMENTS_TOTAL
            .with_label_values(&[document.document_type.as_str(), "created"])
            .inc();
        info!(document_id = %document.document_id, document_type = %document.document_type, "Draft document created");

        Ok(document)
    }

    /// Fetch a document, applying lazy quote expiry.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, document_id = %document_id))]
    pub async fn get_document(
        &self,
        tenant_id: Uuid,
        document_id: Uuid,
    ) -> Result<Document, AppError> {
        let document = self.require_document(tenant_id, document_id).await?;
        self.maybe_expire(document).await
    }

    /// List documents, applying lazy quote expiry to each hit.
    #[instrument(skip(self, filter), fields(tenant_id = %tenant_id))]
    pub async fn list_documents(
        &self,
        tenant_id: Uuid,
        filter: &ListDocumentsFilter,
    ) -> Result<Vec<Document>, AppError> {
        let documents = self.store.list_documents(tenant_id, filter).await?;
        let mut out = Vec::with_capacity(documents.len());
        for document in documents {
            out.push(self.maybe_expire(document).await?);
        }
        Ok(out)
    }

    /// Update editable fields of a draft document.
    #[instrument(skip(self, input), fields(tenant_id = %tenant_id, document_id = %document_id))]
    pub async fn update_document(
        &self,
        tenant_id: Uuid,
        document_id: Uuid,
        input: &UpdateDocument,
    ) -> Result<Document, AppError> {
        let timer = ENGINE_OP_DURATION
            .with_label_values(&["update_document"])
            .start_timer();
        let mut attempts = 0;
        let result = loop {
            match self.update_document_inner(tenant_id, document_id, input).await {
                Err(AppError::ConcurrencyConflict(err))
                    if attempts + 1 < self.config.max_write_attempts =>
                {
                    attempts += 1;
                    tracing::warn!(error = %err, attempt = attempts, "Retrying document update");
                }
                other => break other,
            }
        };
        Self::observe(timer, result)
    }

    async fn update_document_inner(
        &self,
        tenant_id: Uuid,
        document_id: Uuid,
        input: &UpdateDocument,
    ) -> Result<Document, AppError> {
        input.validate()?;
        let document = self.require_document(tenant_id, document_id).await?;
        let mut document = self.maybe_expire(document).await?;
        if document.status != DocumentStatus::Draft {
            return Err(AppError::BusinessRule(anyhow::anyhow!(
                "only draft documents can be updated"
            )));
        }
        if document.document_type == DocumentType::Quote && input.due_date.is_some() {
            return Err(AppError::InvalidInput(anyhow::anyhow!(
                "quotes carry an expiry date, not a due date"
            )));
        }
        if document.document_type == DocumentType::Invoice && input.expiry_date.is_some() {
            return Err(AppError::InvalidInput(anyhow::anyhow!(
                "invoices carry a due date, not an expiry date"
            )));
        }

        if let Some(ref po_number) = input.po_number {
            document.po_number = Some(po_number.clone());
        }
        if let Some(due_date) = input.due_date {
            document.due_date = Some(due_date);
        }
        if let Some(expiry_date) = input.expiry_date {
            document.expiry_date = Some(expiry_date);
        }
        if let Some(ref notes) = input.notes {
            document.notes = Some(notes.clone());
        }

        let stored = self.store.update_document(&document).await?;
        info!(document_id = %stored.document_id, "Document updated");
        Ok(stored)
    }

    /// Delete a draft document and its line items.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, document_id = %document_id))]
    pub async fn delete_document(
        &self,
        tenant_id: Uuid,
        document_id: Uuid,
    ) -> Result<(), AppError> {
        let timer = ENGINE_OP_DURATION
            .with_label_values(&["delete_document"])
            .start_timer();
        let result = self.delete_document_inner(tenant_id, document_id).await;
        Self::observe(timer, result)
    }

    async fn delete_document_inner(
        &self,
        tenant_id: Uuid,
        document_id: Uuid,
    ) -> Result<(), AppError> {
        let document = self.require_document(tenant_id, document_id).await?;
        if document.status != DocumentStatus::Draft {
            return Err(AppError::BusinessRule(anyhow::anyhow!(
                "only draft documents can be deleted"
            )));
        }
        if !self.store.delete_document(tenant_id, document_id).await? {
            return Err(AppError::NotFound(anyhow::anyhow!(
                "document {document_id} not found"
            )));
        }
        info!(document_id = %document_id, "Draft document deleted");
        Ok(())
    }

    /// Line items of a document, in position order.
    pub async fn line_items(
        &self,
        tenant_id: Uuid,
        document_id: Uuid,
    ) -> Result<Vec<LineItem>, AppError> {
        self.require_document(tenant_id, document_id).await?;
        self.store.fetch_line_items(tenant_id, document_id).await
    }

    /// Recompute (read-only) the totals of a document from its line items.
    pub async fn document_totals(
        &self,
        tenant_id: Uuid,
        document_id: Uuid,
    ) -> Result<DocumentTotals, AppError> {
        self.require_document(tenant_id, document_id).await?;
        let line_items = self.store.fetch_line_items(tenant_id, document_id).await?;
        Ok(totals::document_totals(&line_items))
    }
}
