//! Money arithmetic for line items and document totals.
//!
//! All derived amounts are integer cents, rounded half-up
//! (`MidpointAwayFromZero`) exactly once per amount. Document totals are
//! the sum of the stored per-line cents, never recomputed from aggregate
//! quantity and price, so per-line rounding can never drift.

use crate::models::LineItem;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use service_core::error::AppError;

/// Derived cent amounts for a single line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineAmounts {
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
}

/// Materialized totals for a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DocumentTotals {
    pub subtotal_cents: i64,
    pub tax_total_cents: i64,
    pub total_cents: i64,
}

fn round_cents(amount: Decimal) -> Result<i64, AppError> {
    amount
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or_else(|| AppError::InvalidInput(anyhow::anyhow!("amount out of range")))
}

/// Compute the cent amounts for one line.
pub fn line_amounts(
    quantity: Decimal,
    unit_price_cents: i64,
    tax_rate_percent: Option<Decimal>,
) -> Result<LineAmounts, AppError> {
    if quantity < Decimal::ZERO {
        return Err(AppError::InvalidInput(anyhow::anyhow!(
            "quantity cannot be negative"
        )));
    }
    if quantity.round_dp(4) != quantity {
        return Err(AppError::InvalidInput(anyhow::anyhow!(
            "quantity is limited to 4 decimal places"
        )));
    }
    if unit_price_cents < 0 {
        return Err(AppError::InvalidInput(anyhow::anyhow!(
            "unit price cannot be negative"
        )));
    }
    if let Some(rate) = tax_rate_percent {
        if rate < Decimal::ZERO || rate > Decimal::from(100) {
            return Err(AppError::InvalidInput(anyhow::anyhow!(
                "tax rate must be between 0 and 100 percent"
            )));
        }
    }

    let subtotal_cents = round_cents(quantity * Decimal::from(unit_price_cents))?;
    let tax_cents = match tax_rate_percent {
        Some(rate) => round_cents(Decimal::from(subtotal_cents) * rate / Decimal::from(100))?,
        None => 0,
    };

    Ok(LineAmounts {
        subtotal_cents,
        tax_cents,
        total_cents: subtotal_cents + tax_cents,
    })
}

/// Sum the stored per-line cents into document totals.
pub fn document_totals(line_items: &[LineItem]) -> DocumentTotals {
    let mut totals = DocumentTotals::default();
    for line in line_items {
        totals.subtotal_cents += line.subtotal_cents;
        totals.tax_total_cents += line.tax_cents;
        totals.total_cents += line.total_cents;
    }
    totals
}
