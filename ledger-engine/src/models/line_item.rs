//! Line item model.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// Priced entry on a document.
///
/// `tax_rate_percent` is a snapshot taken when the line was written, not a
/// reference to a live tax-rate definition. The derived cent fields are
/// computed by the engine and stored; document totals sum them as-is.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LineItem {
    pub line_item_id: Uuid,
    pub document_id: Uuid,
    pub tenant_id: Uuid,
    pub position: i32,
    pub description: String,
    pub quantity: Decimal,
    pub unit_price_cents: i64,
    pub tax_rate_percent: Option<Decimal>,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
    pub created_utc: DateTime<Utc>,
}

/// Input for adding a line item to a draft document.
#[derive(Debug, Clone, Validate)]
pub struct CreateLineItem {
    #[validate(length(min = 1, max = 500))]
    pub description: String,
    pub quantity: Decimal,
    pub unit_price_cents: i64,
    pub tax_rate_percent: Option<Decimal>,
    /// 1-based position; appended after the current last line when unset.
    pub position: Option<i32>,
}

/// Input for updating a line item. `Some` fields overwrite;
/// `tax_rate_percent` is applied as given, so `None` clears the snapshot.
#[derive(Debug, Clone, Default, Validate)]
pub struct UpdateLineItem {
    #[validate(length(min = 1, max = 500))]
    pub description: Option<String>,
    pub quantity: Option<Decimal>,
    pub unit_price_cents: Option<i64>,
    pub tax_rate_percent: Option<Decimal>,
    pub position: Option<i32>,
}
