//! Line item tests: amount computation, totals maintenance, draft-only
//! guards, and validation.

mod common;

use common::{add_line, create_draft_invoice, dec, line_input, TestApp};
use ledger_engine::models::UpdateLineItem;
use service_core::error::AppError;

#[tokio::test]
async fn add_line_computes_amounts() {
    let app = TestApp::spawn();
    let invoice = create_draft_invoice(&app).await;

    let (document, line) = add_line(&app, invoice.document_id, "10", 15_000, Some("8.25")).await;

    assert_eq!(line.subtotal_cents, 150_000);
    assert_eq!(line.tax_cents, 12_375);
    assert_eq!(line.total_cents, 162_375);

    assert_eq!(document.subtotal_cents, 150_000);
    assert_eq!(document.tax_total_cents, 12_375);
    assert_eq!(document.total_cents, 162_375);
    assert_eq!(document.balance_due_cents, 162_375);
}

#[tokio::test]
async fn document_totals_sum_per_line_rounding() {
    let app = TestApp::spawn();
    let invoice = create_draft_invoice(&app).await;

    // 33¢ at 15% is 4.95¢, rounded to 5¢ per line. Summing the stored
    // line cents gives 15¢; recomputing from the aggregate would give
    // 14.85¢ and drift.
    for _ in 0..3 {
        add_line(&app, invoice.document_id, "1", 33, Some("15")).await;
    }

    let document = app
        .engine
        .get_document(app.tenant_id, invoice.document_id)
        .await
        .unwrap();
    assert_eq!(document.subtotal_cents, 99);
    assert_eq!(document.tax_total_cents, 15);
    assert_eq!(document.total_cents, 114);

    // The read-only recomputation agrees with the materialized fields.
    let totals = app
        .engine
        .document_totals(app.tenant_id, invoice.document_id)
        .await
        .unwrap();
    assert_eq!(totals.subtotal_cents, document.subtotal_cents);
    assert_eq!(totals.tax_total_cents, document.tax_total_cents);
    assert_eq!(totals.total_cents, document.total_cents);
}

#[tokio::test]
async fn update_line_recomputes_totals() {
    let app = TestApp::spawn();
    let invoice = create_draft_invoice(&app).await;
    let (_, line) = add_line(&app, invoice.document_id, "2", 10_000, None).await;

    let (document, updated) = app
        .engine
        .update_line_item(
            app.tenant_id,
            invoice.document_id,
            line.line_item_id,
            &UpdateLineItem {
                quantity: Some(dec("3")),
                tax_rate_percent: Some(dec("10")),
                ..UpdateLineItem::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.subtotal_cents, 30_000);
    assert_eq!(updated.tax_cents, 3_000);
    assert_eq!(document.total_cents, 33_000);
}

#[tokio::test]
async fn remove_line_recomputes_totals() {
    let app = TestApp::spawn();
    let invoice = create_draft_invoice(&app).await;
    let (_, line) = add_line(&app, invoice.document_id, "1", 25_000, None).await;
    add_line(&app, invoice.document_id, "1", 5_000, None).await;

    let document = app
        .engine
        .remove_line_item(app.tenant_id, invoice.document_id, line.line_item_id)
        .await
        .unwrap();

    assert_eq!(document.subtotal_cents, 5_000);
    assert_eq!(document.total_cents, 5_000);
}

#[tokio::test]
async fn removing_last_line_zeroes_totals() {
    let app = TestApp::spawn();
    let invoice = create_draft_invoice(&app).await;
    let (_, line) = add_line(&app, invoice.document_id, "1", 25_000, Some("5")).await;

    let document = app
        .engine
        .remove_line_item(app.tenant_id, invoice.document_id, line.line_item_id)
        .await
        .unwrap();

    assert_eq!(document.subtotal_cents, 0);
    assert_eq!(document.tax_total_cents, 0);
    assert_eq!(document.total_cents, 0);
    assert_eq!(document.balance_due_cents, 0);
}

#[tokio::test]
async fn line_edits_require_draft_status() {
    let app = TestApp::spawn();
    let invoice = common::issued_invoice(&app, 10_000).await;

    let result = app
        .engine
        .add_line_item(
            app.tenant_id,
            invoice.document_id,
            &line_input("Extra work", "1", 5_000, None),
        )
        .await;
    assert!(matches!(result, Err(AppError::BusinessRule(_))));
}

#[tokio::test]
async fn invalid_line_inputs_are_rejected() {
    let app = TestApp::spawn();
    let invoice = create_draft_invoice(&app).await;

    let negative_price = app
        .engine
        .add_line_item(
            app.tenant_id,
            invoice.document_id,
            &line_input("Bad", "1", -100, None),
        )
        .await;
    assert!(matches!(negative_price, Err(AppError::InvalidInput(_))));

    let negative_quantity = app
        .engine
        .add_line_item(
            app.tenant_id,
            invoice.document_id,
            &line_input("Bad", "-1", 100, None),
        )
        .await;
    assert!(matches!(negative_quantity, Err(AppError::InvalidInput(_))));

    let too_precise = app
        .engine
        .add_line_item(
            app.tenant_id,
            invoice.document_id,
            &line_input("Bad", "1.00005", 100, None),
        )
        .await;
    assert!(matches!(too_precise, Err(AppError::InvalidInput(_))));

    let tax_out_of_range = app
        .engine
        .add_line_item(
            app.tenant_id,
            invoice.document_id,
            &line_input("Bad", "1", 100, Some("101")),
        )
        .await;
    assert!(matches!(tax_out_of_range, Err(AppError::InvalidInput(_))));

    let empty_description = app
        .engine
        .add_line_item(
            app.tenant_id,
            invoice.document_id,
            &line_input("", "1", 100, None),
        )
        .await;
    assert!(matches!(
        empty_description,
        Err(AppError::ValidationError(_))
    ));

    // Nothing was written.
    let document = app
        .engine
        .get_document(app.tenant_id, invoice.document_id)
        .await
        .unwrap();
    assert_eq!(document.total_cents, 0);
}

#[tokio::test]
async fn positions_append_in_order() {
    let app = TestApp::spawn();
    let invoice = create_draft_invoice(&app).await;

    let (_, first) = add_line(&app, invoice.document_id, "1", 100, None).await;
    let (_, second) = add_line(&app, invoice.document_id, "1", 200, None).await;
    let (_, third) = add_line(&app, invoice.document_id, "1", 300, None).await;

    assert_eq!(first.position, 1);
    assert_eq!(second.position, 2);
    assert_eq!(third.position, 3);

    let line_items = app
        .engine
        .line_items(app.tenant_id, invoice.document_id)
        .await
        .unwrap();
    let positions: Vec<i32> = line_items.iter().map(|l| l.position).collect();
    assert_eq!(positions, vec![1, 2, 3]);
}

#[tokio::test]
async fn fractional_quantities_are_supported() {
    let app = TestApp::spawn();
    let invoice = create_draft_invoice(&app).await;

    // 7.5 hours at $120.00/h
    let (document, line) = add_line(&app, invoice.document_id, "7.5", 12_000, None).await;
    assert_eq!(line.subtotal_cents, 90_000);
    assert_eq!(document.total_cents, 90_000);
}
