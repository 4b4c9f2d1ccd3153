//! Boundary to the relational ledger store.
//!
//! The store is an external collaborator; this subsystem only requires
//! atomic units of work with row-level locking on the user row.

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::domain::account::Account;
use crate::domain::error::StoreError;
use crate::domain::ledger::{BalanceSnapshot, LedgerEntry};

/// Handle to a store capable of opening units of work.
#[async_trait]
pub trait LedgerStore {
    type Uow: LedgerUow + Send;

    /// Open a fresh unit of work. Each concurrent request gets its own.
    async fn begin(&self) -> Result<Self::Uow, StoreError>;
}

/// One atomic unit of work against the ledger store.
///
/// All reads and writes issued through a unit of work commit together or
/// not at all. Dropping an uncommitted unit of work discards its staged
/// writes and releases its row locks, equivalent to [`rollback`].
///
/// [`rollback`]: LedgerUow::rollback
#[async_trait]
pub trait LedgerUow {
    /// Locking read of a user's balance, the `SELECT ... FOR UPDATE`
    /// equivalent. Blocks until any other unit of work holding the same
    /// user row commits or rolls back, then returns the committed
    /// balance, or `None` for an unknown user. The row stays locked by
    /// this unit of work until commit/rollback.
    async fn balance_for_update(&mut self, user_id: &str) -> Result<Option<Decimal>, StoreError>;

    /// Stage a new balance for a user row. Callers must hold the row via
    /// [`balance_for_update`] first.
    ///
    /// [`balance_for_update`]: LedgerUow::balance_for_update
    async fn update_balance(&mut self, user_id: &str, balance: Decimal) -> Result<(), StoreError>;

    /// First account of a user by creation order, or `None` if the user
    /// has no accounts.
    async fn first_account(&mut self, user_id: &str) -> Result<Option<Account>, StoreError>;

    /// Stage an append to the ledger.
    async fn append_entry(&mut self, entry: LedgerEntry) -> Result<(), StoreError>;

    /// Stage an append to the balance snapshot table.
    async fn append_snapshot(&mut self, snapshot: BalanceSnapshot) -> Result<(), StoreError>;

    /// Apply all staged writes atomically and release row locks.
    async fn commit(self) -> Result<(), StoreError>;

    /// Discard all staged writes and release row locks.
    async fn rollback(self) -> Result<(), StoreError>;
}
