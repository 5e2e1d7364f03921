//! Result and error types for the core library

use thiserror::Error;

use crate::token::TokenError;

/// Core library error type
#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unique violation: {0}")]
    UniqueViolation(String),

    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(String),

    #[error("Lock timeout: {0}")]
    LockTimeout(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("account {account_id} currency mismatch: {actual} vs {expected}")]
    CurrencyMismatch {
        account_id: i64,
        actual: String,
        expected: String,
    },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("Password hash error: {0}")]
    PasswordHash(String),

    #[error(transparent)]
    Token(#[from] TokenError),

    /// The transaction body failed and was rolled back.
    #[error("transaction error: {0}")]
    TransactionFailure(#[source] Box<Error>),

    /// The transaction body failed and the rollback failed too.
    #[error("transaction error: {tx}, rollback error: {rollback}")]
    RollbackFailure { tx: Box<Error>, rollback: Box<Error> },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a database error
    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    /// Create a not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create an unauthorized error
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    /// The error that started it all, looking through transaction wrappers.
    ///
    /// For `RollbackFailure` this is the body error, not the rollback error.
    pub fn root(&self) -> &Error {
        match self {
            Error::TransactionFailure(inner) => inner.root(),
            Error::RollbackFailure { tx, .. } => tx.root(),
            other => other,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.root(), Error::NotFound(_))
    }

    /// Coarse failure class recorded in the event log
    pub fn category(&self) -> &'static str {
        match self {
            Error::TransactionFailure(_) | Error::RollbackFailure { .. } | Error::LockTimeout(_) => {
                "transaction"
            }
            Error::Unauthorized(_)
            | Error::InvalidCredentials
            | Error::PasswordHash(_)
            | Error::Token(_) => "auth",
            Error::Validation(_) | Error::CurrencyMismatch { .. } => "validation",
            Error::NotFound(_) => "not_found",
            Error::UniqueViolation(_) | Error::ForeignKeyViolation(_) => "conflict",
            Error::Config(_) => "config",
            Error::Database(_) | Error::Io(_) | Error::Json(_) => "storage",
        }
    }
}

/// Core library result type
pub type Result<T> = std::result::Result<T, Error>;
