//! Lifecycle tests: finalize, send, accept, lazy expiry, void and
//! archive.

mod common;

use chrono::Duration;
use common::{
    accepted_quote, add_line, create_draft_invoice, create_draft_quote, days_ago, issued_invoice,
    today, TestApp,
};
use ledger_engine::models::{DocumentStatus, UpdateDocument};
use service_core::error::AppError;

#[tokio::test]
async fn finalize_assigns_number_dates_and_totals() {
    let app = TestApp::spawn();
    let invoice = create_draft_invoice(&app).await;
    add_line(&app, invoice.document_id, "10", 15_000, Some("8.25")).await;

    let finalized = app
        .engine
        .finalize(app.tenant_id, invoice.document_id)
        .await
        .unwrap();

    assert_eq!(finalized.number.as_deref(), Some("INV-0001"));
    assert_eq!(finalized.status, DocumentStatus::Draft);
    assert_eq!(finalized.issue_date, Some(today()));
    assert_eq!(finalized.due_date, Some(today() + Duration::days(30)));
    assert!(finalized.finalized_utc.is_some());
    assert_eq!(finalized.total_cents, 162_375);
    assert_eq!(finalized.balance_due_cents, 162_375);
}

#[tokio::test]
async fn finalize_without_line_items_fails() {
    let app = TestApp::spawn();
    let invoice = create_draft_invoice(&app).await;

    let result = app.engine.finalize(app.tenant_id, invoice.document_id).await;
    assert!(matches!(result, Err(AppError::BusinessRule(_))));
}

#[tokio::test]
async fn finalize_twice_fails_and_leaves_state_unchanged() {
    let app = TestApp::spawn();
    let invoice = create_draft_invoice(&app).await;
    add_line(&app, invoice.document_id, "1", 10_000, None).await;

    let first = app
        .engine
        .finalize(app.tenant_id, invoice.document_id)
        .await
        .unwrap();

    let second = app.engine.finalize(app.tenant_id, invoice.document_id).await;
    assert!(matches!(second, Err(AppError::BusinessRule(_))));

    let fetched = app
        .engine
        .get_document(app.tenant_id, invoice.document_id)
        .await
        .unwrap();
    assert_eq!(fetched.number, first.number);
    assert_eq!(fetched.row_version, first.row_version);
    assert_eq!(fetched.finalized_utc, first.finalized_utc);
}

#[tokio::test]
async fn explicit_due_date_is_not_overridden() {
    let app = TestApp::spawn();
    let invoice = create_draft_invoice(&app).await;
    add_line(&app, invoice.document_id, "1", 10_000, None).await;

    let due = today() + Duration::days(7);
    app.engine
        .update_document(
            app.tenant_id,
            invoice.document_id,
            &UpdateDocument {
                due_date: Some(due),
                ..UpdateDocument::default()
            },
        )
        .await
        .unwrap();

    let finalized = app
        .engine
        .finalize(app.tenant_id, invoice.document_id)
        .await
        .unwrap();
    assert_eq!(finalized.due_date, Some(due));
}

#[tokio::test]
async fn send_requires_finalize_first() {
    let app = TestApp::spawn();
    let invoice = create_draft_invoice(&app).await;
    add_line(&app, invoice.document_id, "1", 10_000, None).await;

    let result = app.engine.send(app.tenant_id, invoice.document_id).await;
    assert!(matches!(result, Err(AppError::BusinessRule(_))));
}

#[tokio::test]
async fn send_sets_sent_at_once() {
    let app = TestApp::spawn();
    let invoice = create_draft_invoice(&app).await;
    add_line(&app, invoice.document_id, "1", 10_000, None).await;
    app.engine
        .finalize(app.tenant_id, invoice.document_id)
        .await
        .unwrap();

    let sent = app
        .engine
        .send(app.tenant_id, invoice.document_id)
        .await
        .unwrap();
    assert_eq!(sent.status, DocumentStatus::Sent);
    let first_sent_utc = sent.sent_utc.expect("sent_utc must be set");

    let resent = app
        .engine
        .send(app.tenant_id, invoice.document_id)
        .await
        .unwrap();
    assert_eq!(resent.sent_utc, Some(first_sent_utc));
    assert_eq!(resent.status, DocumentStatus::Sent);
}

#[tokio::test]
async fn accept_quote_sets_terminal_status() {
    let app = TestApp::spawn();
    let quote = accepted_quote(&app).await;

    assert_eq!(quote.status, DocumentStatus::Accepted);
    assert!(quote.accepted_utc.is_some());

    let again = app.engine.accept_quote(app.tenant_id, quote.document_id).await;
    assert!(matches!(again, Err(AppError::BusinessRule(_))));
}

#[tokio::test]
async fn accept_invoice_fails() {
    let app = TestApp::spawn();
    let invoice = issued_invoice(&app, 10_000).await;

    let result = app
        .engine
        .accept_quote(app.tenant_id, invoice.document_id)
        .await;
    assert!(matches!(result, Err(AppError::BusinessRule(_))));
}

#[tokio::test]
async fn quote_expires_lazily_on_read() {
    let app = TestApp::spawn();
    let mut input = common::draft_quote_input(app.tenant_id);
    input.expiry_date = Some(days_ago(1));
    let quote = app.engine.create_document(&input).await.unwrap();

    let fetched = app
        .engine
        .get_document(app.tenant_id, quote.document_id)
        .await
        .unwrap();
    assert_eq!(fetched.status, DocumentStatus::Expired);
}

#[tokio::test]
async fn expired_quote_cannot_be_accepted() {
    let app = TestApp::spawn();
    let mut input = common::draft_quote_input(app.tenant_id);
    input.expiry_date = Some(days_ago(1));
    let quote = app.engine.create_document(&input).await.unwrap();

    let result = app.engine.accept_quote(app.tenant_id, quote.document_id).await;
    assert!(matches!(result, Err(AppError::BusinessRule(_))));
}

#[tokio::test]
async fn accepted_quote_never_expires() {
    let app = TestApp::spawn();
    let quote = accepted_quote(&app).await;

    // Push the expiry into the past behind the engine's back; the
    // accepted status must still hold on every read.
    let mut stale = quote.clone();
    stale.expiry_date = Some(days_ago(10));
    use ledger_engine::services::store::DocumentStore;
    app.store.update_document(&stale).await.unwrap();

    let fetched = app
        .engine
        .get_document(app.tenant_id, quote.document_id)
        .await
        .unwrap();
    assert_eq!(fetched.status, DocumentStatus::Accepted);
}

#[tokio::test]
async fn void_draft_invoice_with_zero_balance_succeeds() {
    let app = TestApp::spawn();
    let invoice = create_draft_invoice(&app).await;

    let voided = app
        .engine
        .void_invoice(app.tenant_id, invoice.document_id)
        .await
        .unwrap();
    assert_eq!(voided.status, DocumentStatus::Void);
    assert!(voided.voided_utc.is_some());
}

#[tokio::test]
async fn void_quote_fails() {
    let app = TestApp::spawn();
    let quote = create_draft_quote(&app).await;

    let result = app.engine.void_invoice(app.tenant_id, quote.document_id).await;
    assert!(matches!(result, Err(AppError::BusinessRule(_))));
}

#[tokio::test]
async fn void_is_absolutely_terminal() {
    let app = TestApp::spawn();
    let invoice = create_draft_invoice(&app).await;
    app.engine
        .void_invoice(app.tenant_id, invoice.document_id)
        .await
        .unwrap();

    let again = app.engine.void_invoice(app.tenant_id, invoice.document_id).await;
    assert!(matches!(again, Err(AppError::BusinessRule(_))));

    let sent = app.engine.send(app.tenant_id, invoice.document_id).await;
    assert!(matches!(sent, Err(AppError::BusinessRule(_))));
}

#[tokio::test]
async fn archive_rules() {
    let app = TestApp::spawn();

    // Quotes archive in any status.
    let quote = create_draft_quote(&app).await;
    let archived = app
        .engine
        .archive(app.tenant_id, quote.document_id)
        .await
        .unwrap();
    assert!(archived.archived_utc.is_some());

    // Unpaid invoices do not.
    let invoice = issued_invoice(&app, 10_000).await;
    let result = app.engine.archive(app.tenant_id, invoice.document_id).await;
    assert!(matches!(result, Err(AppError::BusinessRule(_))));

    // Void invoices do.
    let voidable = create_draft_invoice(&app).await;
    app.engine
        .void_invoice(app.tenant_id, voidable.document_id)
        .await
        .unwrap();
    let archived_invoice = app
        .engine
        .archive(app.tenant_id, voidable.document_id)
        .await
        .unwrap();
    assert!(archived_invoice.archived_utc.is_some());

    // Archiving twice fails.
    let again = app.engine.archive(app.tenant_id, voidable.document_id).await;
    assert!(matches!(again, Err(AppError::BusinessRule(_))));
}
