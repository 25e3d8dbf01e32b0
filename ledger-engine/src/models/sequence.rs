//! Document number sequence model.

use crate::models::DocumentType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Per-tenant, per-type number sequence.
///
/// `current_value` is strictly increasing and never reused; gaps from
/// abandoned finalizations are acceptable.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct NumberSequence {
    pub tenant_id: Uuid,
    pub document_type: DocumentType,
    pub prefix: String,
    pub current_value: i64,
    pub padding: i32,
    pub created_utc: DateTime<Utc>,
}
