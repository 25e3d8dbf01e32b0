//! Data models for the document ledger engine.

mod document;
mod expense;
mod line_item;
mod payment;
mod sequence;

pub use document::{
    CreateDocument, Document, DocumentStatus, DocumentType, ListDocumentsFilter, UpdateDocument,
};
pub use expense::{BillingStatus, Expense};
pub use line_item::{CreateLineItem, LineItem, UpdateLineItem};
pub use payment::{CreatePayment, Payment};
pub use sequence::NumberSequence;
