//! Exchange Error Types
//!
//! Typed failures surfaced to the request-handling layer. The core never
//! renders user-facing text; handlers translate via `code()`/`http_status()`.

use thiserror::Error;

use crate::core_types::UserId;

use super::status::ExchangeStatus;

/// Exchange error types
#[derive(Error, Debug, Clone)]
pub enum ExchangeError {
    // === User-recoverable ===
    #[error("Insufficient available points")]
    InsufficientFunds,

    // === Authorization ===
    #[error("Actor is not permitted to perform this action")]
    Forbidden,

    // === Validation ===
    #[error("Sender and receiver cannot be the same user")]
    SameUser,

    #[error("Price must be greater than zero")]
    InvalidAmount,

    // === State ===
    #[error("Cannot {action} an exchange in state {state}")]
    InvalidState {
        state: ExchangeStatus,
        action: &'static str,
    },

    #[error("Exchange not found: {0}")]
    ExchangeNotFound(String),

    #[error("Account not found for user {0}")]
    AccountNotFound(UserId),

    // === System ===
    /// A ledger invariant would be violated. Never expected under correct
    /// sequencing; the enclosing operation aborts with no partial writes.
    #[error("Ledger consistency violation: {0}")]
    Consistency(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl ExchangeError {
    /// Get the error code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            ExchangeError::InsufficientFunds => "INSUFFICIENT_FUNDS",
            ExchangeError::Forbidden => "FORBIDDEN",
            ExchangeError::SameUser => "SAME_USER",
            ExchangeError::InvalidAmount => "INVALID_AMOUNT",
            ExchangeError::InvalidState { .. } => "INVALID_STATE",
            ExchangeError::ExchangeNotFound(_) => "EXCHANGE_NOT_FOUND",
            ExchangeError::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            ExchangeError::Consistency(_) => "CONSISTENCY_VIOLATION",
            ExchangeError::Database(_) => "DATABASE_ERROR",
        }
    }

    /// Get HTTP status code suggestion
    pub fn http_status(&self) -> u16 {
        match self {
            ExchangeError::Forbidden => 403,
            ExchangeError::SameUser | ExchangeError::InvalidAmount => 400,
            ExchangeError::InsufficientFunds | ExchangeError::InvalidState { .. } => 422,
            ExchangeError::ExchangeNotFound(_) | ExchangeError::AccountNotFound(_) => 404,
            ExchangeError::Consistency(_) | ExchangeError::Database(_) => 500,
        }
    }
}

impl From<sqlx::Error> for ExchangeError {
    fn from(e: sqlx::Error) -> Self {
        ExchangeError::Database(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            ExchangeError::InsufficientFunds.code(),
            "INSUFFICIENT_FUNDS"
        );
        assert_eq!(ExchangeError::Forbidden.code(), "FORBIDDEN");
        assert_eq!(
            ExchangeError::InvalidState {
                state: ExchangeStatus::Declined,
                action: "decline"
            }
            .code(),
            "INVALID_STATE"
        );
    }

    #[test]
    fn test_http_status() {
        assert_eq!(ExchangeError::Forbidden.http_status(), 403);
        assert_eq!(ExchangeError::SameUser.http_status(), 400);
        assert_eq!(ExchangeError::InsufficientFunds.http_status(), 422);
        assert_eq!(
            ExchangeError::ExchangeNotFound("x".into()).http_status(),
            404
        );
        assert_eq!(
            ExchangeError::Consistency("held underflow".into()).http_status(),
            500
        );
    }

    #[test]
    fn test_display() {
        let err = ExchangeError::InvalidState {
            state: ExchangeStatus::Completed,
            action: "decline",
        };
        assert_eq!(err.to_string(), "Cannot decline an exchange in state COMPLETED");
    }
}
