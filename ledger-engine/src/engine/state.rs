//! Pure lifecycle state machine.
//!
//! Every status change in the engine flows through [`transition`], which
//! is side-effect free and unit-testable without storage. Accepted,
//! Expired and Paid are terminal for automatic transitions; Void is
//! absolutely terminal.

use crate::models::{DocumentStatus, DocumentType};
use service_core::error::AppError;

/// Lifecycle event applied to a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentEvent {
    Finalize,
    Send,
    Accept,
    Expire,
    /// Payment set changed; status is derived from the new paid amount.
    PaymentsApplied {
        amount_paid_cents: i64,
        total_cents: i64,
    },
    Void,
}

/// Compute the status a document moves to when `event` is applied.
///
/// Preconditions that need data beyond the status itself (line items,
/// balances, expiry dates) are checked by the calling operation; this
/// function owns the status table alone.
pub fn transition(
    document_type: DocumentType,
    status: DocumentStatus,
    event: DocumentEvent,
) -> Result<DocumentStatus, AppError> {
    match event {
        DocumentEvent::Finalize => match status {
            DocumentStatus::Draft => Ok(DocumentStatus::Draft),
            _ => Err(AppError::BusinessRule(anyhow::anyhow!(
                "only draft documents can be finalized"
            ))),
        },

        DocumentEvent::Send => match status {
            DocumentStatus::Void => Err(AppError::BusinessRule(anyhow::anyhow!(
                "cannot send a void invoice"
            ))),
            DocumentStatus::Expired => Err(AppError::BusinessRule(anyhow::anyhow!(
                "cannot send an expired quote"
            ))),
            DocumentStatus::Draft => Ok(DocumentStatus::Sent),
            other => Ok(other),
        },

        DocumentEvent::Accept => {
            if document_type != DocumentType::Quote {
                return Err(AppError::BusinessRule(anyhow::anyhow!(
                    "only quotes can be accepted"
                )));
            }
            match status {
                DocumentStatus::Draft | DocumentStatus::Sent => Ok(DocumentStatus::Accepted),
                DocumentStatus::Accepted => Err(AppError::BusinessRule(anyhow::anyhow!(
                    "quote is already accepted"
                ))),
                DocumentStatus::Expired => {
                    Err(AppError::BusinessRule(anyhow::anyhow!("quote has expired")))
                }
                other => Err(AppError::BusinessRule(anyhow::anyhow!(
                    "quote cannot be accepted from status {other}"
                ))),
            }
        }

        DocumentEvent::Expire => {
            if document_type != DocumentType::Quote {
                return Err(AppError::BusinessRule(anyhow::anyhow!(
                    "only quotes can expire"
                )));
            }
            match status {
                DocumentStatus::Draft | DocumentStatus::Sent => Ok(DocumentStatus::Expired),
                other => Err(AppError::BusinessRule(anyhow::anyhow!(
                    "quote cannot expire from status {other}"
                ))),
            }
        }

        DocumentEvent::PaymentsApplied {
            amount_paid_cents,
            total_cents,
        } => {
            if document_type != DocumentType::Invoice {
                return Err(AppError::BusinessRule(anyhow::anyhow!(
                    "payments apply only to invoices"
                )));
            }
            match status {
                // Payment arithmetic never overrides Draft or Void.
                DocumentStatus::Draft | DocumentStatus::Void => Ok(status),
                _ if amount_paid_cents == 0 => Ok(DocumentStatus::Unpaid),
                _ if amount_paid_cents < total_cents => Ok(DocumentStatus::Partial),
                _ => Ok(DocumentStatus::Paid),
            }
        }

        DocumentEvent::Void => {
            if document_type != DocumentType::Invoice {
                return Err(AppError::BusinessRule(anyhow::anyhow!(
                    "only invoices can be voided"
                )));
            }
            if status == DocumentStatus::Void {
                return Err(AppError::BusinessRule(anyhow::anyhow!(
                    "invoice is already void"
                )));
            }
            Ok(DocumentStatus::Void)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DocumentStatus::*;
    use crate::models::DocumentType::{Invoice, Quote};

    #[test]
    fn finalize_requires_draft() {
        assert_eq!(transition(Invoice, Draft, DocumentEvent::Finalize).unwrap(), Draft);
        assert!(transition(Invoice, Sent, DocumentEvent::Finalize).is_err());
        assert!(transition(Quote, Accepted, DocumentEvent::Finalize).is_err());
    }

    #[test]
    fn send_moves_draft_to_sent_and_is_idempotent() {
        assert_eq!(transition(Quote, Draft, DocumentEvent::Send).unwrap(), Sent);
        assert_eq!(transition(Quote, Sent, DocumentEvent::Send).unwrap(), Sent);
        assert_eq!(transition(Invoice, Partial, DocumentEvent::Send).unwrap(), Partial);
        assert!(transition(Invoice, Void, DocumentEvent::Send).is_err());
        assert!(transition(Quote, Expired, DocumentEvent::Send).is_err());
    }

    #[test]
    fn accept_is_quote_only() {
        assert_eq!(transition(Quote, Sent, DocumentEvent::Accept).unwrap(), Accepted);
        assert_eq!(transition(Quote, Draft, DocumentEvent::Accept).unwrap(), Accepted);
        assert!(transition(Invoice, Sent, DocumentEvent::Accept).is_err());
        assert!(transition(Quote, Expired, DocumentEvent::Accept).is_err());
        assert!(transition(Quote, Accepted, DocumentEvent::Accept).is_err());
    }

    #[test]
    fn accepted_quotes_never_expire() {
        assert!(transition(Quote, Accepted, DocumentEvent::Expire).is_err());
        assert_eq!(transition(Quote, Sent, DocumentEvent::Expire).unwrap(), Expired);
    }

    #[test]
    fn payments_derive_unpaid_partial_paid() {
        let derive = |paid, total| {
            transition(
                Invoice,
                Sent,
                DocumentEvent::PaymentsApplied {
                    amount_paid_cents: paid,
                    total_cents: total,
                },
            )
            .unwrap()
        };
        assert_eq!(derive(0, 10_000), Unpaid);
        assert_eq!(derive(5_000, 10_000), Partial);
        assert_eq!(derive(10_000, 10_000), Paid);
    }

    #[test]
    fn payments_never_override_draft_or_void() {
        let event = DocumentEvent::PaymentsApplied {
            amount_paid_cents: 10_000,
            total_cents: 10_000,
        };
        assert_eq!(transition(Invoice, Draft, event).unwrap(), Draft);
        assert_eq!(transition(Invoice, Void, event).unwrap(), Void);
    }

    #[test]
    fn void_is_invoice_only_and_absolutely_terminal() {
        assert_eq!(transition(Invoice, Paid, DocumentEvent::Void).unwrap(), Void);
        assert!(transition(Invoice, Void, DocumentEvent::Void).is_err());
        assert!(transition(Quote, Sent, DocumentEvent::Void).is_err());
    }
}
