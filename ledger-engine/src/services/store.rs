//! Storage collaborator contract.
//!
//! Every method is tenant-scoped and atomic: the write methods commit all
//! of their rows or none, so readers only ever observe a fully consistent
//! total set. Methods that take a [`Document`] treat its `row_version` as
//! the version read from storage and fail with
//! [`AppError::ConcurrencyConflict`] when the stored row has moved on;
//! committed writes bump the version by one and return the stored row.

use crate::models::{
    Document, DocumentType, Expense, LineItem, ListDocumentsFilter, NumberSequence, Payment,
};
use async_trait::async_trait;
use service_core::error::AppError;
use uuid::Uuid;

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn insert_document(&self, document: &Document) -> Result<(), AppError>;

    /// Insert a document together with its line items (quote conversion).
    async fn insert_document_with_line_items(
        &self,
        document: &Document,
        line_items: &[LineItem],
    ) -> Result<(), AppError>;

    async fn fetch_document(
        &self,
        tenant_id: Uuid,
        document_id: Uuid,
    ) -> Result<Option<Document>, AppError>;

    async fn list_documents(
        &self,
        tenant_id: Uuid,
        filter: &ListDocumentsFilter,
    ) -> Result<Vec<Document>, AppError>;

    /// Versioned full-row update.
    async fn update_document(&self, document: &Document) -> Result<Document, AppError>;

    /// Delete a document and its line items. Returns false when absent.
    async fn delete_document(&self, tenant_id: Uuid, document_id: Uuid)
        -> Result<bool, AppError>;

    async fn fetch_line_items(
        &self,
        tenant_id: Uuid,
        document_id: Uuid,
    ) -> Result<Vec<LineItem>, AppError>;

    /// Upsert and remove line items and update the owning document's
    /// materialized totals in one transaction.
    async fn write_line_items(
        &self,
        document: &Document,
        upserts: &[LineItem],
        removals: &[Uuid],
    ) -> Result<Document, AppError>;

    async fn fetch_payments(
        &self,
        tenant_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Vec<Payment>, AppError>;

    /// Insert a payment and update the invoice's paid/balance/status in
    /// one transaction.
    async fn insert_payment_with_totals(
        &self,
        document: &Document,
        payment: &Payment,
    ) -> Result<Document, AppError>;

    /// Delete a payment and update the invoice's paid/balance/status in
    /// one transaction.
    async fn delete_payment_with_totals(
        &self,
        document: &Document,
        payment_id: Uuid,
    ) -> Result<Document, AppError>;

    async fn fetch_expense(
        &self,
        tenant_id: Uuid,
        expense_id: Uuid,
    ) -> Result<Option<Expense>, AppError>;

    /// Bill expenses onto an invoice: insert the generated line items,
    /// update the invoice totals, and mark every expense billed — all or
    /// nothing. An expense that is no longer unbilled fails the whole
    /// write with a ConcurrencyConflict.
    async fn link_expenses(
        &self,
        document: &Document,
        line_items: &[LineItem],
        expense_ids: &[Uuid],
    ) -> Result<Document, AppError>;

    /// Atomically increment and return the number sequence for
    /// (tenant, type), creating it from the defaults when absent. This is
    /// the only operation requiring strict serialization.
    async fn increment_sequence(
        &self,
        tenant_id: Uuid,
        document_type: DocumentType,
        default_prefix: &str,
        default_padding: i32,
    ) -> Result<NumberSequence, AppError>;

    /// One-time PO snapshot source at document creation.
    async fn project_default_po_number(
        &self,
        tenant_id: Uuid,
        project_id: Uuid,
    ) -> Result<Option<String>, AppError>;

    async fn health_check(&self) -> Result<(), AppError>;
}
