use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::domain::account::Account;
use crate::domain::user::UserId;

/// Wire values for the ledger's transaction type column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionType {
    TopUp,
    Transfer,
}

impl TransactionType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TopUp => "topup",
            Self::Transfer => "transfer",
        }
    }
}

impl core::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque token identifying a top-up, or linking the two legs of a transfer.
pub type ReferenceNo = String;

/// 128-bit random value, lower-hex encoded. Uniqueness is probabilistic;
/// the store does not enforce it.
pub fn random_reference() -> ReferenceNo {
    format!("{:032x}", rand::random::<u128>())
}

/// One immutable row of the append-only ledger: a single balance-changing
/// event for a single user. Never updated or deleted once written.
#[derive(Debug, Clone)]
pub struct LedgerEntry {
    pub reference_no: ReferenceNo,
    pub user_id: UserId,
    pub transaction_type: TransactionType,
    /// Positive magnitude; the direction is carried by the balance pair.
    pub amount: Decimal,
    pub balance_before: Decimal,
    pub balance_after: Decimal,
    pub created_date: DateTime<Utc>,
}

impl LedgerEntry {
    pub fn new(
        reference_no: &str,
        user_id: &str,
        transaction_type: TransactionType,
        amount: Decimal,
        balance_before: Decimal,
        balance_after: Decimal,
    ) -> Self {
        Self {
            reference_no: reference_no.to_owned(),
            user_id: user_id.to_owned(),
            transaction_type,
            amount,
            balance_before,
            balance_after,
            created_date: Utc::now(),
        }
    }
}

/// Denormalized balance state at the time of a transaction, tagged with
/// the account used. Reporting reads these instead of replaying the ledger.
#[derive(Debug, Clone)]
pub struct BalanceSnapshot {
    pub user_id: UserId,
    pub balance: Decimal,
    pub account_no: String,
    pub account_type: String,
    pub created_at: DateTime<Utc>,
}

impl BalanceSnapshot {
    /// Snapshot for one ledger entry, carrying the entry's timestamp so
    /// both rows record the same instant.
    pub fn for_entry(entry: &LedgerEntry, account: &Account) -> Self {
        Self {
            user_id: entry.user_id.clone(),
            balance: entry.balance_after,
            account_no: account.account_no.clone(),
            account_type: account.account_type.clone(),
            created_at: entry.created_date,
        }
    }
}
