//! Pure balance arithmetic. Writing the result is the caller's job.

use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BalanceError {
    #[error("insufficient funds: available {available}, requested {requested}")]
    InsufficientFunds {
        available: Decimal,
        requested: Decimal,
    },

    #[error("balance arithmetic overflowed")]
    Overflow,
}

/// New balance after crediting `amount` onto `current`.
pub fn credit(current: Decimal, amount: Decimal) -> Result<Decimal, BalanceError> {
    current.checked_add(amount).ok_or(BalanceError::Overflow)
}

/// New balance after debiting `amount` from `current`.
///
/// Fails if the debit would drive the balance negative, so callers can
/// check sufficiency before issuing any write.
pub fn debit(current: Decimal, amount: Decimal) -> Result<Decimal, BalanceError> {
    if amount > current {
        return Err(BalanceError::InsufficientFunds {
            available: current,
            requested: amount,
        });
    }
    current.checked_sub(amount).ok_or(BalanceError::Overflow)
}
