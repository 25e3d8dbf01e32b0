//! Shared test harness: an engine over the in-memory store.
#![allow(dead_code)]

use chrono::{Duration, NaiveDate, Utc};
use ledger_engine::models::{
    BillingStatus, CreateDocument, CreateLineItem, Document, DocumentType, Expense, LineItem,
};
use ledger_engine::services::memory::InMemoryStore;
use ledger_engine::{LedgerConfig, LedgerEngine};
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

pub struct TestApp {
    pub engine: LedgerEngine,
    pub store: Arc<InMemoryStore>,
    pub tenant_id: Uuid,
}

impl TestApp {
    pub fn spawn() -> Self {
        service_core::observability::logging::init_tracing("ledger-engine-tests", "warn");
        let store = Arc::new(InMemoryStore::new());
        let engine = LedgerEngine::new(store.clone(), LedgerConfig::default());
        Self {
            engine,
            store,
            tenant_id: Uuid::new_v4(),
        }
    }
}

pub fn dec(s: &str) -> Decimal {
    s.parse().expect("bad decimal literal")
}

pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

pub fn days_ahead(days: i64) -> NaiveDate {
    today() + Duration::days(days)
}

pub fn days_ago(days: i64) -> NaiveDate {
    today() - Duration::days(days)
}

pub fn draft_invoice_input(tenant_id: Uuid) -> CreateDocument {
    CreateDocument {
        tenant_id,
        document_type: DocumentType::Invoice,
        client_id: Uuid::new_v4(),
        project_id: None,
        po_number: None,
        due_date: None,
        expiry_date: None,
        notes: None,
    }
}

pub fn draft_quote_input(tenant_id: Uuid) -> CreateDocument {
    CreateDocument {
        tenant_id,
        document_type: DocumentType::Quote,
        client_id: Uuid::new_v4(),
        project_id: None,
        po_number: None,
        due_date: None,
        expiry_date: Some(days_ahead(30)),
        notes: None,
    }
}

pub async fn create_draft_invoice(app: &TestApp) -> Document {
    app.engine
        .create_document(&draft_invoice_input(app.tenant_id))
        .await
        .expect("Failed to create draft invoice")
}

pub async fn create_draft_quote(app: &TestApp) -> Document {
    app.engine
        .create_document(&draft_quote_input(app.tenant_id))
        .await
        .expect("Failed to create draft quote")
}

pub fn line_input(
    description: &str,
    quantity: &str,
    unit_price_cents: i64,
    tax_rate_percent: Option<&str>,
) -> CreateLineItem {
    CreateLineItem {
        description: description.to_string(),
        quantity: dec(quantity),
        unit_price_cents,
        tax_rate_percent: tax_rate_percent.map(dec),
        position: None,
    }
}

pub async fn add_line(
    app: &TestApp,
    document_id: Uuid,
    quantity: &str,
    unit_price_cents: i64,
    tax_rate_percent: Option<&str>,
) -> (Document, LineItem) {
    app.engine
        .add_line_item(
            app.tenant_id,
            document_id,
            &line_input("Consulting services", quantity, unit_price_cents, tax_rate_percent),
        )
        .await
        .expect("Failed to add line item")
}

/// A finalized and sent invoice with a single untaxed line totalling
/// `amount_cents`.
pub async fn issued_invoice(app: &TestApp, amount_cents: i64) -> Document {
    let invoice = create_draft_invoice(app).await;
    add_line(app, invoice.document_id, "1", amount_cents, None).await;
    app.engine
        .finalize(app.tenant_id, invoice.document_id)
        .await
        .expect("Failed to finalize invoice");
    app.engine
        .send(app.tenant_id, invoice.document_id)
        .await
        .expect("Failed to send invoice")
}

/// A finalized, sent and accepted quote with one taxed line.
pub async fn accepted_quote(app: &TestApp) -> Document {
    let quote = create_draft_quote(app).await;
    add_line(app, quote.document_id, "10", 15_000, Some("8.25")).await;
    app.engine
        .finalize(app.tenant_id, quote.document_id)
        .await
        .expect("Failed to finalize quote");
    app.engine
        .send(app.tenant_id, quote.document_id)
        .await
        .expect("Failed to send quote");
    app.engine
        .accept_quote(app.tenant_id, quote.document_id)
        .await
        .expect("Failed to accept quote")
}

pub fn expense_fixture(
    tenant_id: Uuid,
    description: &str,
    total_amount_cents: i64,
    billable: bool,
    billing_status: BillingStatus,
) -> Expense {
    Expense {
        expense_id: Uuid::new_v4(),
        tenant_id,
        description: description.to_string(),
        expense_date: days_ago(7),
        total_amount_cents,
        billable,
        billing_status,
        linked_invoice_id: None,
        created_utc: Utc::now(),
    }
}
