//! Document model: the quote/invoice row and its inputs.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// Document type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    Quote,
    Invoice,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::Quote => "quote",
            DocumentType::Invoice => "invoice",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "quote" => DocumentType::Quote,
            _ => DocumentType::Invoice,
        }
    }
}

impl std::fmt::Display for DocumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Document status.
///
/// Draft and Sent apply to both types; Accepted and Expired are
/// quote-only; Unpaid, Partial, Paid and Void are invoice-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Draft,
    Sent,
    Accepted,
    Expired,
    Unpaid,
    Partial,
    Paid,
    Void,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Draft => "draft",
            DocumentStatus::Sent => "sent",
            DocumentStatus::Accepted => "accepted",
            DocumentStatus::Expired => "expired",
            DocumentStatus::Unpaid => "unpaid",
            DocumentStatus::Partial => "partial",
            DocumentStatus::Paid => "paid",
            DocumentStatus::Void => "void",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "sent" => DocumentStatus::Sent,
            "accepted" => DocumentStatus::Accepted,
            "expired" => DocumentStatus::Expired,
            "unpaid" => DocumentStatus::Unpaid,
            "partial" => DocumentStatus::Partial,
            "paid" => DocumentStatus::Paid,
            "void" => DocumentStatus::Void,
            _ => DocumentStatus::Draft,
        }
    }
}

impl std::fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Quote or invoice row with materialized totals.
///
/// All monetary fields are integer cents. `row_version` is the optimistic
/// concurrency token: it holds the value read from storage, and every
/// committed write bumps it by one.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Document {
    pub document_id: Uuid,
    pub tenant_id: Uuid,
    pub document_type: DocumentType,
    pub number: Option<String>,
    pub status: DocumentStatus,
    pub client_id: Uuid,
    pub project_id: Option<Uuid>,
    pub po_number: Option<String>,
    pub issue_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub subtotal_cents: i64,
    pub tax_total_cents: i64,
    pub total_cents: i64,
    pub amount_paid_cents: i64,
    pub balance_due_cents: i64,
    pub row_version: i64,
    pub created_utc: DateTime<Utc>,
    pub finalized_utc: Option<DateTime<Utc>>,
    pub sent_utc: Option<DateTime<Utc>>,
    pub accepted_utc: Option<DateTime<Utc>>,
    pub voided_utc: Option<DateTime<Utc>>,
    pub archived_utc: Option<DateTime<Utc>>,
}

/// Filter parameters for listing documents.
#[derive(Debug, Clone, Default)]
pub struct ListDocumentsFilter {
    pub document_type: Option<DocumentType>,
    pub status: Option<DocumentStatus>,
    pub client_id: Option<Uuid>,
    pub page_size: i32,
    pub page_token: Option<Uuid>,
}

/// Input for creating a draft document.
#[derive(Debug, Clone, Validate)]
pub struct CreateDocument {
    pub tenant_id: Uuid,
    pub document_type: DocumentType,
    pub client_id: Uuid,
    pub project_id: Option<Uuid>,
    #[validate(length(max = 100))]
    pub po_number: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

/// Input for updating a draft document. `Some` fields overwrite.
#[derive(Debug, Clone, Default, Validate)]
pub struct UpdateDocument {
    #[validate(length(max = 100))]
    pub po_number: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}
