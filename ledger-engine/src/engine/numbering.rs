//! Document number assignment.
//!
//! The store serializes the increment; this module owns formatting and
//! the per-type defaults. Numbers are never reused or compacted — a
//! finalize that loses its write after taking a number simply leaves a
//! gap.

use crate::engine::LedgerEngine;
use crate::models::{DocumentType, NumberSequence};
use service_core::error::AppError;
use uuid::Uuid;

/// `prefix` + zero-padded value. Values wider than the padding print in
/// full rather than being truncated.
pub fn format_number(prefix: &str, value: i64, padding: i32) -> String {
    format!("{prefix}{value:0width$}", width = padding.max(0) as usize)
}

impl LedgerEngine {
    pub(crate) async fn next_number(
        &self,
        tenant_id: Uuid,
        document_type: DocumentType,
    ) -> Result<String, AppError> {
        let default_prefix = match document_type {
            DocumentType::Quote => self.config.quote_number_prefix.as_str(),
            DocumentType::Invoice => self.config.invoice_number_prefix.as_str(),
        };

        let sequence: NumberSequence = self
            .store
            .increment_sequence(
                tenant_id,
                document_type,
                default_prefix,
                self.config.number_padding,
            )
            .await?;

        Ok(format_number(
            &sequence.prefix,
            sequence.current_value,
            sequence.padding,
        ))
    }
}
