//! Record store errors.
//!
//! These are **infrastructure errors** (storage, isolation) as opposed to
//! domain errors (validation, invariants).
//!
//! ## SQLx mapping
//!
//! | SQLx Error | StoreError |
//! |------------|------------|
//! | Database (any code) on a read | `Read` |
//! | Database (any code) on a write | `Write` |
//! | PoolClosed | `Read` / `Write` by operation kind |
//! | RowNotFound | `NotFound` |
//! | Other (IO, TLS, decode) | `Read` / `Write` by operation kind |

use thiserror::Error;

/// Record store operation error.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("store read failed in {operation}: {message}")]
    Read { operation: String, message: String },

    #[error("store write failed in {operation}: {message}")]
    Write { operation: String, message: String },

    #[error("record not found: {0}")]
    NotFound(String),

    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),
}

/// Whether a failing store call was reading or writing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    Read,
    Write,
}

impl StoreError {
    pub fn read(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Read {
            operation: operation.into(),
            message: message.into(),
        }
    }

    pub fn write(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Write {
            operation: operation.into(),
            message: message.into(),
        }
    }

    pub(crate) fn poisoned(operation: &str, op: StoreOp) -> Self {
        match op {
            StoreOp::Read => Self::read(operation, "lock poisoned"),
            StoreOp::Write => Self::write(operation, "lock poisoned"),
        }
    }
}

pub(crate) fn map_sqlx_error(operation: &str, op: StoreOp, err: sqlx::Error) -> StoreError {
    let message = match err {
        sqlx::Error::RowNotFound => {
            return StoreError::NotFound(format!("no row returned in {operation}"));
        }
        sqlx::Error::Database(db_err) => match db_err.code() {
            Some(code) => format!("database error {code}: {}", db_err.message()),
            None => format!("database error: {}", db_err.message()),
        },
        sqlx::Error::PoolClosed => "connection pool closed".to_string(),
        other => other.to_string(),
    };

    match op {
        StoreOp::Read => StoreError::read(operation, message),
        StoreOp::Write => StoreError::write(operation, message),
    }
}
