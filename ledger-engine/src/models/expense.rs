//! Expense model, as seen by the billing linker.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Expense billing status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BillingStatus {
    Unbilled,
    Billed,
    UserPaid,
}

impl BillingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingStatus::Unbilled => "unbilled",
            BillingStatus::Billed => "billed",
            BillingStatus::UserPaid => "user_paid",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "billed" => BillingStatus::Billed,
            "user_paid" => BillingStatus::UserPaid,
            _ => BillingStatus::Unbilled,
        }
    }
}

impl std::fmt::Display for BillingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Expense row. Created and edited by the route layer; the engine only
/// reads expenses and links them into invoices.
///
/// Invariant: `linked_invoice_id` is `Some` iff `billing_status` is
/// `Billed`, and then references an invoice-type document of the same
/// tenant.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Expense {
    pub expense_id: Uuid,
    pub tenant_id: Uuid,
    pub description: String,
    pub expense_date: NaiveDate,
    pub total_amount_cents: i64,
    pub billable: bool,
    pub billing_status: BillingStatus,
    pub linked_invoice_id: Option<Uuid>,
    pub created_utc: DateTime<Utc>,
}
