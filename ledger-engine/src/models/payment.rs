//! Payment model.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// Payment applied to an invoice. Append-only; removable for corrections.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Payment {
    pub payment_id: Uuid,
    pub tenant_id: Uuid,
    pub invoice_id: Uuid,
    pub payment_date: NaiveDate,
    pub amount_cents: i64,
    pub method: Option<String>,
    pub reference: Option<String>,
    pub created_utc: DateTime<Utc>,
}

/// Input for recording a payment.
#[derive(Debug, Clone, Validate)]
pub struct CreatePayment {
    pub tenant_id: Uuid,
    pub invoice_id: Uuid,
    pub payment_date: NaiveDate,
    #[validate(range(min = 1))]
    pub amount_cents: i64,
    #[validate(length(max = 50))]
    pub method: Option<String>,
    #[validate(length(max = 200))]
    pub reference: Option<String>,
}
