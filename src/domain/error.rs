//! Failure taxonomy for the transaction subsystem.
//!
//! Every domain error is raised at the point of detection inside an
//! active unit of work; the unit of work rolls back before the caller
//! observes the error.

use thiserror::Error;

use crate::domain::balance::BalanceError;
use crate::domain::user::UserId;

/// Which side of a transfer an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Party {
    Source,
    Destination,
}

impl core::fmt::Display for Party {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            Self::Source => "source",
            Self::Destination => "destination",
        })
    }
}

/// Coarse classification so the HTTP layer can map errors onto status
/// codes without matching every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Referenced user or account does not exist.
    NotFound,
    /// The request itself is unacceptable; retrying it unchanged will
    /// fail again.
    InvalidRequest,
    /// Store-level failure; nothing was committed, safe to retry.
    Transient,
}

/// Failure of the underlying ledger store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("ledger store unavailable: {0}")]
    Unavailable(String),

    #[error("constraint violated: {0}")]
    Constraint(String),
}

/// Error during top-up processing.
#[derive(Debug, Error)]
pub enum TopUpError {
    #[error("user {0} not found")]
    UserNotFound(UserId),

    #[error("no account found for user {0}")]
    AccountNotFound(UserId),

    #[error("amount must be positive, got {0}")]
    InvalidAmount(rust_decimal::Decimal),

    #[error(transparent)]
    Balance(#[from] BalanceError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl TopUpError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::UserNotFound(_) | Self::AccountNotFound(_) => ErrorCategory::NotFound,
            Self::InvalidAmount(_) | Self::Balance(_) => ErrorCategory::InvalidRequest,
            Self::Store(StoreError::Unavailable(_)) => ErrorCategory::Transient,
            Self::Store(StoreError::Constraint(_)) => ErrorCategory::InvalidRequest,
        }
    }
}

/// Error during transfer processing.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("{0} user {1} not found")]
    UserNotFound(Party, UserId),

    #[error("no account found for {0} user {1}")]
    AccountNotFound(Party, UserId),

    #[error("amount must be positive, got {0}")]
    InvalidAmount(rust_decimal::Decimal),

    #[error(transparent)]
    Balance(#[from] BalanceError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl TransferError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::UserNotFound(..) | Self::AccountNotFound(..) => ErrorCategory::NotFound,
            Self::InvalidAmount(_) | Self::Balance(_) => ErrorCategory::InvalidRequest,
            Self::Store(StoreError::Unavailable(_)) => ErrorCategory::Transient,
            Self::Store(StoreError::Constraint(_)) => ErrorCategory::InvalidRequest,
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn categories_match_the_http_mapping() {
        assert_eq!(
            TopUpError::UserNotFound("u1".to_owned()).category(),
            ErrorCategory::NotFound
        );
        assert_eq!(
            TransferError::AccountNotFound(Party::Destination, "u2".to_owned()).category(),
            ErrorCategory::NotFound
        );
        assert_eq!(
            TransferError::Balance(BalanceError::InsufficientFunds {
                available: dec!(1),
                requested: dec!(2),
            })
            .category(),
            ErrorCategory::InvalidRequest
        );
        assert_eq!(
            TopUpError::Store(StoreError::Unavailable("connection reset".to_owned())).category(),
            ErrorCategory::Transient
        );
    }

    #[test]
    fn transfer_errors_name_the_party() {
        let err = TransferError::UserNotFound(Party::Destination, "u9".to_owned());
        assert_eq!(err.to_string(), "destination user u9 not found");
    }
}
