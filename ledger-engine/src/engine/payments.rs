//! Payment ledger: append-only payments driving invoice balances.

use crate::engine::state::{transition, DocumentEvent};
use crate::engine::LedgerEngine;
use crate::models::{CreatePayment, Document, DocumentStatus, DocumentType, Payment};
use crate::services::metrics::{ENGINE_OP_DURATION, PAYMENTS_TOTAL, PAYMENT_AMOUNT_CENTS_TOTAL};
use chrono::Utc;
use service_core::error::AppError;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

impl LedgerEngine {
    async fn require_invoice(
        &self,
        tenant_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Document, AppError> {
        let document = self.require_document(tenant_id, invoice_id).await?;
        if document.document_type != DocumentType::Invoice {
            return Err(AppError::InvalidInput(anyhow::anyhow!(
                "document {invoice_id} is not an invoice"
            )));
        }
        Ok(document)
    }

    /// Record a payment against an invoice and derive the new status.
    #[instrument(skip(self, input), fields(tenant_id = %input.tenant_id, invoice_id = %input.invoice_id))]
    pub async fn record_payment(
        &self,
        input: &CreatePayment,
    ) -> Result<(Document, Payment), AppError> {
        let timer = ENGINE_OP_DURATION
            .with_label_values(&["record_payment"])
            .start_timer();
        let mut attempts = 0;
        let result = loop {
            match self.record_payment_inner(input).await {
                Err(AppError::ConcurrencyConflict(err))
                    if attempts + 1 < self.config.max_write_attempts =>
                {
                    attempts += 1;
                    warn!(error = %err, attempt = attempts, "Retrying payment record");
                }
                other => break other,
            }
        };
        Self::observe(timer, result)
    }

    async fn record_payment_inner(
        &self,
        input: &CreatePayment,
    ) -> Result<(Document, Payment), AppError> {
        input.validate()?;
        let mut document = self
            .require_invoice(input.tenant_id, input.invoice_id)
            .await?;

        match document.status {
            DocumentStatus::Draft => {
                return Err(AppError::BusinessRule(anyhow::anyhow!(
                    "cannot record a payment against a draft invoice"
                )));
            }
            DocumentStatus::Void => {
                return Err(AppError::BusinessRule(anyhow::anyhow!(
                    "cannot record a payment against a void invoice"
                )));
            }
            _ => {}
        }
        if input.amount_cents > document.balance_due_cents {
            return Err(AppError::InvalidInput(anyhow::anyhow!(
                "payment amount {} exceeds balance due {}",
                input.amount_cents,
                document.balance_due_cents
            )));
        }

        let payment = Payment {
            payment_id: Uuid::new_v4(),
            tenant_id: input.tenant_id,
            invoice_id: input.invoice_id,
            payment_date: input.payment_date,
            amount_cents: input.amount_cents,
            method: input.method.clone(),
            reference: input.reference.clone(),
            created_utc: Utc::now(),
        };

        let existing = self
            .store
            .fetch_payments(input.tenant_id, input.invoice_id)
            .await?;
        let amount_paid_cents: i64 =
            existing.iter().map(|p| p.amount_cents).sum::<i64>() + payment.amount_cents;

        document.amount_paid_cents = amount_paid_cents;
        document.balance_due_cents = document.total_cents - amount_paid_cents;
        document.status = transition(
            document.document_type,
            document.status,
            DocumentEvent::PaymentsApplied {
                amount_paid_cents,
                total_cents: document.total_cents,
            },
        )?;

        let stored = self
            .store
            .insert_payment_with_totals(&document, &payment)
            .await?;

        PAYMENTS_TOTAL
            .with_label_values(&[payment.method.as_deref().unwrap_or("unspecified")])
            .inc();
        PAYMENT_AMOUNT_CENTS_TOTAL
            .with_label_values(&[payment.method.as_deref().unwrap_or("unspecified")])
            .inc_by(payment.amount_cents as f64);
        info!(
            payment_id = %payment.payment_id,
            invoice_id = %payment.invoice_id,
            amount_cents = payment.amount_cents,
            status = %stored.status,
            "Payment recorded"
        );

        Ok((stored, payment))
    }

    /// Remove a payment (correction) and re-derive the invoice status.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, payment_id = %payment_id))]
    pub async fn remove_payment(
        &self,
        tenant_id: Uuid,
        invoice_id: Uuid,
        payment_id: Uuid,
    ) -> Result<Document, AppError> {
        let timer = ENGINE_OP_DURATION
            .with_label_values(&["remove_payment"])
            .start_timer();
        let mut attempts = 0;
        let result = loop {
            match self
                .remove_payment_inner(tenant_id, invoice_id, payment_id)
                .await
            {
                Err(AppError::ConcurrencyConflict(err))
                    if attempts + 1 < self.config.max_write_attempts =>
                {
                    attempts += 1;
                    warn!(error = %err, attempt = attempts, "Retrying payment removal");
                }
                other => break other,
            }
        };
        Self::observe(timer, result)
    }

    async fn remove_payment_inner(
        &self,
        tenant_id: Uuid,
        invoice_id: Uuid,
        payment_id: Uuid,
    ) -> Result<Document, AppError> {
        let mut document = self.require_invoice(tenant_id, invoice_id).await?;
        if document.status == DocumentStatus::Void {
            return Err(AppError::BusinessRule(anyhow::anyhow!(
                "cannot modify payments on a void invoice"
            )));
        }

        let payments = self.store.fetch_payments(tenant_id, invoice_id).await?;
        let target = payments
            .iter()
            .find(|p| p.payment_id == payment_id)
            .ok_or_else(|| {
                AppError::NotFound(anyhow::anyhow!("payment {payment_id} not found"))
            })?;

        let amount_paid_cents: i64 = payments
            .iter()
            .filter(|p| p.payment_id != payment_id)
            .map(|p| p.amount_cents)
            .sum();

        document.amount_paid_cents = amount_paid_cents;
        document.balance_due_cents = document.total_cents - amount_paid_cents;
        document.status = transition(
            document.document_type,
            document.status,
            DocumentEvent::PaymentsApplied {
                amount_paid_cents,
                total_cents: document.total_cents,
            },
        )?;

        let stored = self
            .store
            .delete_payment_with_totals(&document, payment_id)
            .await?;

        info!(
            payment_id = %payment_id,
            amount_cents = target.amount_cents,
            status = %stored.status,
            "Payment removed"
        );
        Ok(stored)
    }

    /// Payments recorded against an invoice.
    pub async fn list_payments(
        &self,
        tenant_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Vec<Payment>, AppError> {
        self.require_invoice(tenant_id, invoice_id).await?;
        self.store.fetch_payments(tenant_id, invoice_id).await
    }
}
