//! In-memory store.
//!
//! Backs the test suites and local tooling. A single mutex over the whole
//! data set gives every trait method the same atomicity the Postgres
//! implementation gets from a transaction: writes land entirely or not at
//! all, and the sequence increment is serialized.

use crate::models::{
    BillingStatus, Document, DocumentType, Expense, LineItem, ListDocumentsFilter, NumberSequence,
    Payment,
};
use crate::services::store::DocumentStore;
use async_trait::async_trait;
use chrono::Utc;
use service_core::error::AppError;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

#[derive(Default)]
struct Inner {
    documents: HashMap<Uuid, Document>,
    line_items: HashMap<Uuid, LineItem>,
    payments: HashMap<Uuid, Payment>,
    expenses: HashMap<Uuid, Expense>,
    sequences: HashMap<(Uuid, DocumentType), NumberSequence>,
    project_po_numbers: HashMap<(Uuid, Uuid), String>,
}

impl Inner {
    fn assert_version(&self, document: &Document) -> Result<(), AppError> {
        let stored = self
            .documents
            .get(&document.document_id)
            .filter(|d| d.tenant_id == document.tenant_id)
            .ok_or_else(|| {
                AppError::NotFound(anyhow::anyhow!(
                    "document {} not found",
                    document.document_id
                ))
            })?;
        if stored.row_version != document.row_version {
            return Err(AppError::ConcurrencyConflict(anyhow::anyhow!(
                "stale version {} for document {}, stored {}",
                document.row_version,
                document.document_id,
                stored.row_version
            )));
        }
        Ok(())
    }

    /// Store the updated row with a bumped version. Version must already
    /// have been asserted.
    fn commit_document(&mut self, document: &Document) -> Document {
        let mut updated = document.clone();
        updated.row_version += 1;
        self.documents
            .insert(updated.document_id, updated.clone());
        updated
    }
}

/// Mutex-guarded in-memory implementation of [`DocumentStore`].
#[derive(Default)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().expect("ledger store mutex poisoned")
    }

    /// Seed an expense row (test fixture; expense CRUD is route-layer
    /// plumbing in production).
    pub fn seed_expense(&self, expense: Expense) {
        self.lock().expenses.insert(expense.expense_id, expense);
    }

    /// Seed a project default PO number (test fixture).
    pub fn seed_project_po_number(&self, tenant_id: Uuid, project_id: Uuid, po_number: &str) {
        self.lock()
            .project_po_numbers
            .insert((tenant_id, project_id), po_number.to_string());
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn insert_document(&self, document: &Document) -> Result<(), AppError> {
        let mut inner = self.lock();
        inner
            .documents
            .insert(document.document_id, document.clone());
        Ok(())
    }

    async fn insert_document_with_line_items(
        &self,
        document: &Document,
        line_items: &[LineItem],
    ) -> Result<(), AppError> {
        let mut inner = self.lock();
        inner
            .documents
            .insert(document.document_id, document.clone());
        for line in line_items {
            inner.line_items.insert(line.line_item_id, line.clone());
        }
        Ok(())
    }

    async fn fetch_document(
        &self,
        tenant_id: Uuid,
        document_id: Uuid,
    ) -> Result<Option<Document>, AppError> {
        let inner = self.lock();
        Ok(inner
            .documents
            .get(&document_id)
            .filter(|d| d.tenant_id == tenant_id)
            .cloned())
    }

    async fn list_documents(
        &self,
        tenant_id: Uuid,
        filter: &ListDocumentsFilter,
    ) -> Result<Vec<Document>, AppError> {
        let inner = self.lock();
        let limit = filter.page_size.clamp(1, 100) as usize;

        let mut documents: Vec<Document> = inner
            .documents
            .values()
            .filter(|d| d.tenant_id == tenant_id)
            .filter(|d| filter.document_type.map_or(true, |t| d.document_type == t))
            .filter(|d| filter.status.map_or(true, |s| d.status == s))
            .filter(|d| filter.client_id.map_or(true, |c| d.client_id == c))
            .filter(|d| filter.page_token.map_or(true, |t| d.document_id > t))
            .cloned()
            .collect();
        documents.sort_by_key(|d| d.document_id);
        documents.truncate(limit);
        Ok(documents)
    }

    async fn update_document(&self, document: &Document) -> Result<Document, AppError> {
        let mut inner = self.lock();
        inner.assert_version(document)?;
        Ok(inner.commit_document(document))
    }

    async fn delete_document(
        &self,
        tenant_id: Uuid,
        document_id: Uuid,
    ) -> Result<bool, AppError> {
        let mut inner = self.lock();
        let existed = inner
            .documents
            .get(&document_id)
            .map(|d| d.tenant_id == tenant_id)
            .unwrap_or(false);
        if existed {
            inner.documents.remove(&document_id);
            inner.line_items.retain(|_, l| l.document_id != document_id);
        }
        Ok(existed)
    }

    async fn fetch_line_items(
        &self,
        tenant_id: Uuid,
        document_id: Uuid,
    ) -> Result<Vec<LineItem>, AppError> {
        let inner = self.lock();
        let mut line_items: Vec<LineItem> = inner
            .line_items
            .values()
            .filter(|l| l.tenant_id == tenant_id && l.document_id == document_id)
            .cloned()
            .collect();
        line_items.sort_by_key(|l| (l.position, l.created_utc));
        Ok(line_items)
    }

    async fn write_line_items(
        &self,
        document: &Document,
        upserts: &[LineItem],
        removals: &[Uuid],
    ) -> Result<Document, AppError> {
        let mut inner = self.lock();
        inner.assert_version(document)?;
        for line in upserts {
            inner.line_items.insert(line.line_item_id, line.clone());
        }
        for line_item_id in removals {
            inner.line_items.remove(line_item_id);
        }
        Ok(inner.commit_document(document))
    }

    async fn fetch_payments(
        &self,
        tenant_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Vec<Payment>, AppError> {
        let inner = self.lock();
        let mut payments: Vec<Payment> = inner
            .payments
            .values()
            .filter(|p| p.tenant_id == tenant_id && p.invoice_id == invoice_id)
            .cloned()
            .collect();
        payments.sort_by_key(|p| p.created_utc);
        Ok(payments)
    }

    async fn insert_payment_with_totals(
        &self,
        document: &Document,
        payment: &Payment,
    ) -> Result<Document, AppError> {
        let mut inner = self.lock();
        inner.assert_version(document)?;
        inner.payments.insert(payment.payment_id, payment.clone());
        Ok(inner.commit_document(document))
    }

    async fn delete_payment_with_totals(
        &self,
        document: &Document,
        payment_id: Uuid,
    ) -> Result<Document, AppError> {
        let mut inner = self.lock();
        inner.assert_version(document)?;
        let existed = inner
            .payments
            .get(&payment_id)
            .map(|p| p.tenant_id == document.tenant_id && p.invoice_id == document.document_id)
            .unwrap_or(false);
        if !existed {
            return Err(AppError::NotFound(anyhow::anyhow!(
                "payment {payment_id} not found"
            )));
        }
        inner.payments.remove(&payment_id);
        Ok(inner.commit_document(document))
    }

    async fn fetch_expense(
        &self,
        tenant_id: Uuid,
        expense_id: Uuid,
    ) -> Result<Option<Expense>, AppError> {
        let inner = self.lock();
        Ok(inner
            .expenses
            .get(&expense_id)
            .filter(|e| e.tenant_id == tenant_id)
            .cloned())
    }

    async fn link_expenses(
        &self,
        document: &Document,
        line_items: &[LineItem],
        expense_ids: &[Uuid],
    ) -> Result<Document, AppError> {
        let mut inner = self.lock();
        inner.assert_version(document)?;

        // Re-check the billing guard under the lock before writing.
        for expense_id in expense_ids {
            let expense = inner
                .expenses
                .get(expense_id)
                .filter(|e| e.tenant_id == document.tenant_id)
                .ok_or_else(|| {
                    AppError::NotFound(anyhow::anyhow!("expense {expense_id} not found"))
                })?;
            if !expense.billable || expense.billing_status != BillingStatus::Unbilled {
                return Err(AppError::ConcurrencyConflict(anyhow::anyhow!(
                    "expense {expense_id} was billed concurrently"
                )));
            }
        }

        for line in line_items {
            inner.line_items.insert(line.line_item_id, line.clone());
        }
        for expense_id in expense_ids {
            if let Some(expense) = inner.expenses.get_mut(expense_id) {
                expense.billing_status = BillingStatus::Billed;
                expense.linked_invoice_id = Some(document.document_id);
            }
        }
        Ok(inner.commit_document(document))
    }

    async fn increment_sequence(
        &self,
        tenant_id: Uuid,
        document_type: DocumentType,
        default_prefix: &str,
        default_padding: i32,
    ) -> Result<NumberSequence, AppError> {
        let mut inner = self.lock();
        let sequence = inner
            .sequences
            .entry((tenant_id, document_type))
            .or_insert_with(|| NumberSequence {
                tenant_id,
                document_type,
                prefix: default_prefix.to_string(),
                current_value: 0,
                padding: default_padding,
                created_utc: Utc::now(),
            });
        sequence.current_value += 1;
        Ok(sequence.clone())
    }

    async fn project_default_po_number(
        &self,
        tenant_id: Uuid,
        project_id: Uuid,
    ) -> Result<Option<String>, AppError> {
        let inner = self.lock();
        Ok(inner
            .project_po_numbers
            .get(&(tenant_id, project_id))
            .cloned())
    }

    async fn health_check(&self) -> Result<(), AppError> {
        Ok(())
    }
}
