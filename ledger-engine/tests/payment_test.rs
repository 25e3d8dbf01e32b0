//! Payment ledger tests: balance maintenance, status derivation, and the
//! guards around draft/void invoices and overpayment.

mod common;

use common::{create_draft_invoice, create_draft_quote, issued_invoice, today, TestApp};
use ledger_engine::models::{CreatePayment, DocumentStatus};
use service_core::error::AppError;
use uuid::Uuid;

fn payment(tenant_id: Uuid, invoice_id: Uuid, amount_cents: i64) -> CreatePayment {
    CreatePayment {
        tenant_id,
        invoice_id,
        payment_date: today(),
        amount_cents,
        method: Some("bank_transfer".to_string()),
        reference: None,
    }
}

#[tokio::test]
async fn partial_then_paid_then_void() {
    let app = TestApp::spawn();
    let invoice = issued_invoice(&app, 108_000).await;

    let (after_first, _) = app
        .engine
        .record_payment(&payment(app.tenant_id, invoice.document_id, 50_000))
        .await
        .unwrap();
    assert_eq!(after_first.status, DocumentStatus::Partial);
    assert_eq!(after_first.amount_paid_cents, 50_000);
    assert_eq!(after_first.balance_due_cents, 58_000);

    let (after_second, _) = app
        .engine
        .record_payment(&payment(app.tenant_id, invoice.document_id, 58_000))
        .await
        .unwrap();
    assert_eq!(after_second.status, DocumentStatus::Paid);
    assert_eq!(after_second.balance_due_cents, 0);

    let voided = app
        .engine
        .void_invoice(app.tenant_id, invoice.document_id)
        .await
        .unwrap();
    assert_eq!(voided.status, DocumentStatus::Void);
}

#[tokio::test]
async fn void_with_outstanding_balance_fails() {
    let app = TestApp::spawn();
    let invoice = issued_invoice(&app, 10_000).await;

    let result = app
        .engine
        .void_invoice(app.tenant_id, invoice.document_id)
        .await;
    match result {
        Err(AppError::BusinessRule(err)) => {
            assert!(err.to_string().contains("outstanding balance"));
        }
        other => panic!("expected BusinessRule, got {other:?}"),
    }
}

#[tokio::test]
async fn balance_invariant_holds_after_every_operation() {
    let app = TestApp::spawn();
    let invoice = issued_invoice(&app, 90_000).await;

    let mut paid_so_far = 0;
    for amount in [10_000, 20_000, 30_000] {
        let (document, _) = app
            .engine
            .record_payment(&payment(app.tenant_id, invoice.document_id, amount))
            .await
            .unwrap();
        paid_so_far += amount;
        assert_eq!(document.amount_paid_cents, paid_so_far);
        assert_eq!(
            document.balance_due_cents,
            document.total_cents - document.amount_paid_cents
        );
        assert!(document.balance_due_cents >= 0);
    }
}

#[tokio::test]
async fn overpayment_is_rejected() {
    let app = TestApp::spawn();
    let invoice = issued_invoice(&app, 10_000).await;

    let result = app
        .engine
        .record_payment(&payment(app.tenant_id, invoice.document_id, 12_000))
        .await;
    assert!(matches!(result, Err(AppError::InvalidInput(_))));

    // Also after a partial payment.
    app.engine
        .record_payment(&payment(app.tenant_id, invoice.document_id, 8_000))
        .await
        .unwrap();
    let result = app
        .engine
        .record_payment(&payment(app.tenant_id, invoice.document_id, 3_000))
        .await;
    assert!(matches!(result, Err(AppError::InvalidInput(_))));
}

#[tokio::test]
async fn non_positive_amounts_fail_validation() {
    let app = TestApp::spawn();
    let invoice = issued_invoice(&app, 10_000).await;

    for amount in [0, -500] {
        let result = app
            .engine
            .record_payment(&payment(app.tenant_id, invoice.document_id, amount))
            .await;
        assert!(matches!(result, Err(AppError::ValidationError(_))));
    }
}

#[tokio::test]
async fn payments_require_a_non_draft_invoice() {
    let app = TestApp::spawn();

    let draft = create_draft_invoice(&app).await;
    let result = app
        .engine
        .record_payment(&payment(app.tenant_id, draft.document_id, 1_000))
        .await;
    assert!(matches!(result, Err(AppError::BusinessRule(_))));

    let quote = create_draft_quote(&app).await;
    let result = app
        .engine
        .record_payment(&payment(app.tenant_id, quote.document_id, 1_000))
        .await;
    assert!(matches!(result, Err(AppError::InvalidInput(_))));

    let result = app
        .engine
        .record_payment(&payment(app.tenant_id, Uuid::new_v4(), 1_000))
        .await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn payments_are_tenant_isolated() {
    let app = TestApp::spawn();
    let invoice = issued_invoice(&app, 10_000).await;

    let result = app
        .engine
        .record_payment(&payment(Uuid::new_v4(), invoice.document_id, 1_000))
        .await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn void_invoice_ignores_payment_sequences() {
    let app = TestApp::spawn();
    let invoice = issued_invoice(&app, 10_000).await;
    app.engine
        .record_payment(&payment(app.tenant_id, invoice.document_id, 10_000))
        .await
        .unwrap();
    app.engine
        .void_invoice(app.tenant_id, invoice.document_id)
        .await
        .unwrap();

    let record = app
        .engine
        .record_payment(&payment(app.tenant_id, invoice.document_id, 1_000))
        .await;
    assert!(matches!(record, Err(AppError::BusinessRule(_))));

    let payments = app
        .engine
        .list_payments(app.tenant_id, invoice.document_id)
        .await
        .unwrap();
    let remove = app
        .engine
        .remove_payment(app.tenant_id, invoice.document_id, payments[0].payment_id)
        .await;
    assert!(matches!(remove, Err(AppError::BusinessRule(_))));

    let fetched = app
        .engine
        .get_document(app.tenant_id, invoice.document_id)
        .await
        .unwrap();
    assert_eq!(fetched.status, DocumentStatus::Void);
}

#[tokio::test]
async fn remove_payment_recomputes_status_and_balance() {
    let app = TestApp::spawn();
    let invoice = issued_invoice(&app, 50_000).await;

    let (_, first) = app
        .engine
        .record_payment(&payment(app.tenant_id, invoice.document_id, 50_000))
        .await
        .unwrap();

    let document = app
        .engine
        .remove_payment(app.tenant_id, invoice.document_id, first.payment_id)
        .await
        .unwrap();
    assert_eq!(document.status, DocumentStatus::Unpaid);
    assert_eq!(document.amount_paid_cents, 0);
    assert_eq!(document.balance_due_cents, 50_000);

    let unknown = app
        .engine
        .remove_payment(app.tenant_id, invoice.document_id, Uuid::new_v4())
        .await;
    assert!(matches!(unknown, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn list_payments_returns_recorded_entries() {
    let app = TestApp::spawn();
    let invoice = issued_invoice(&app, 30_000).await;

    app.engine
        .record_payment(&payment(app.tenant_id, invoice.document_id, 10_000))
        .await
        .unwrap();
    app.engine
        .record_payment(&payment(app.tenant_id, invoice.document_id, 20_000))
        .await
        .unwrap();

    let payments = app
        .engine
        .list_payments(app.tenant_id, invoice.document_id)
        .await
        .unwrap();
    assert_eq!(payments.len(), 2);
    let total: i64 = payments.iter().map(|p| p.amount_cents).sum();
    assert_eq!(total, 30_000);
}
