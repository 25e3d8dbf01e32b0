//! Document ledger engine for consultant bookkeeping.
//!
//! Owns the invariants of quotes and invoices: line-item and tax
//! arithmetic, materialized totals, sequential document numbering,
//! lifecycle transitions, payment application, quote conversion, and
//! expense billing linkage. Storage and transport are collaborators; the
//! engine is the single owner of all derived state.

pub mod config;
pub mod engine;
pub mod models;
pub mod services;

pub use config::LedgerConfig;
pub use engine::LedgerEngine;
