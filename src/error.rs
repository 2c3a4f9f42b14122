//! 错误类型

use chrono::NaiveDate;
use thiserror::Error;

use crate::models::InsufficientReason;

/// 仓储层错误
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("corrupt record: {0}")]
    Corrupt(String),

    #[error("duplicate invoice {invoice_number} for carrier {carrier_id}")]
    DuplicateInvoice {
        carrier_id: i64,
        invoice_number: String,
    },

    #[error("not found: {0}")]
    NotFound(String),
}

/// 计费/对账引擎错误
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("invalid date range: {start} > {end}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    #[error("invalid period {month}/{year}")]
    InvalidPeriod { year: i32, month: u32 },

    #[error("insufficient data: {0}")]
    InsufficientData(InsufficientReason),

    #[error("invalid status transition for invoice {invoice_id}: {from} -> {to}")]
    InvalidTransition {
        invoice_id: i64,
        from: String,
        to: String,
    },
}

pub type Result<T> = std::result::Result<T, EngineError>;
