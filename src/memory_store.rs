//! In-memory ledger store.
//!
//! Reference implementation of [`LedgerStore`] with the transactional
//! semantics the engine requires from a relational database: per-user
//! row locks serialize every read-modify-write on a balance, and all
//! writes staged in a unit of work become visible atomically on commit.
//! Dropping an uncommitted unit of work discards its staged writes and
//! releases its row locks.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::{Mutex as RowLock, OwnedMutexGuard};

use crate::domain::{
    Account, BalanceSnapshot, LedgerEntry, LedgerStore, LedgerUow, StoreError, User, UserId,
};

#[derive(Debug, Default)]
struct Tables {
    users: HashMap<UserId, User>,
    /// Per-user account rows in creation order; `first_account` returns
    /// the head.
    accounts: HashMap<UserId, Vec<Account>>,
    ledger: Vec<LedgerEntry>,
    snapshots: Vec<BalanceSnapshot>,
}

#[derive(Debug, Default)]
struct Shared {
    tables: Mutex<Tables>,
    row_locks: Mutex<HashMap<UserId, Arc<RowLock<()>>>>,
}

impl Shared {
    fn tables(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Unavailable("tables mutex poisoned".to_owned()))
    }

    fn row_locks(&self) -> Result<MutexGuard<'_, HashMap<UserId, Arc<RowLock<()>>>>, StoreError> {
        self.row_locks
            .lock()
            .map_err(|_| StoreError::Unavailable("row lock table poisoned".to_owned()))
    }
}

/// Cheaply cloneable handle; clones share the same tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    shared: Arc<Shared>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registration seam used by CIF management, not part of the
    /// transaction protocol. Enforces id and username uniqueness and a
    /// non-negative opening balance.
    pub fn insert_user(&self, user: User) -> Result<(), StoreError> {
        if user.balance < Decimal::ZERO {
            return Err(StoreError::Constraint(format!(
                "negative opening balance for user {}",
                user.id
            )));
        }
        let mut tables = self.shared.tables()?;
        if tables.users.contains_key(&user.id) {
            return Err(StoreError::Constraint(format!("duplicate user id {}", user.id)));
        }
        if tables.users.values().any(|u| u.username == user.username) {
            return Err(StoreError::Constraint(format!(
                "duplicate username {}",
                user.username
            )));
        }
        tables.users.insert(user.id.clone(), user);
        Ok(())
    }

    /// Account-opening seam used by CIF management. Account numbers are
    /// unique across all users.
    pub fn insert_account(&self, account: Account) -> Result<(), StoreError> {
        let mut tables = self.shared.tables()?;
        if !tables.users.contains_key(&account.user_id) {
            return Err(StoreError::Constraint(format!(
                "account {} references unknown user {}",
                account.account_no, account.user_id
            )));
        }
        if tables
            .accounts
            .values()
            .flatten()
            .any(|a| a.account_no == account.account_no)
        {
            return Err(StoreError::Constraint(format!(
                "duplicate account no {}",
                account.account_no
            )));
        }
        tables
            .accounts
            .entry(account.user_id.clone())
            .or_default()
            .push(account);
        Ok(())
    }

    /// Committed balance of one user, outside any unit of work.
    pub fn user_balance(&self, user_id: &str) -> Result<Option<Decimal>, StoreError> {
        Ok(self.shared.tables()?.users.get(user_id).map(|user| user.balance))
    }

    /// Balance table for reporting, ordered by user id.
    pub fn balances(&self) -> Result<Vec<(UserId, String, Decimal)>, StoreError> {
        let tables = self.shared.tables()?;
        let mut rows: Vec<_> = tables
            .users
            .values()
            .map(|user| (user.id.clone(), user.full_name.clone(), user.balance))
            .collect();
        rows.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(rows)
    }

    /// The full ledger in append order.
    pub fn ledger(&self) -> Result<Vec<LedgerEntry>, StoreError> {
        Ok(self.shared.tables()?.ledger.clone())
    }

    /// All balance snapshots in append order.
    pub fn snapshots(&self) -> Result<Vec<BalanceSnapshot>, StoreError> {
        Ok(self.shared.tables()?.snapshots.clone())
    }

    /// Dashboard aggregate: user count and the sum of all balances.
    pub fn totals(&self) -> Result<(usize, Decimal), StoreError> {
        let tables = self.shared.tables()?;
        let total = tables.users.values().map(|user| user.balance).sum();
        Ok((tables.users.len(), total))
    }
}

#[derive(Debug)]
enum Staged {
    Balance { user_id: UserId, balance: Decimal },
    Entry(LedgerEntry),
    Snapshot(BalanceSnapshot),
}

/// A unit of work over [`MemoryStore`]. Holds the row locks it acquired
/// and buffers writes until commit.
#[derive(Debug)]
pub struct MemoryUow {
    shared: Arc<Shared>,
    row_guards: HashMap<UserId, OwnedMutexGuard<()>>,
    staged: Vec<Staged>,
}

#[async_trait]
impl LedgerStore for MemoryStore {
    type Uow = MemoryUow;

    async fn begin(&self) -> Result<MemoryUow, StoreError> {
        Ok(MemoryUow {
            shared: Arc::clone(&self.shared),
            row_guards: HashMap::new(),
            staged: Vec::new(),
        })
    }
}

#[async_trait]
impl LedgerUow for MemoryUow {
    async fn balance_for_update(&mut self, user_id: &str) -> Result<Option<Decimal>, StoreError> {
        if !self.row_guards.contains_key(user_id) {
            // No row to lock for ids that were never registered.
            if !self.shared.tables()?.users.contains_key(user_id) {
                return Ok(None);
            }
            let row_lock = {
                let mut row_locks = self.shared.row_locks()?;
                Arc::clone(row_locks.entry(user_id.to_owned()).or_default())
            };
            let guard = row_lock.lock_owned().await;
            self.row_guards.insert(user_id.to_owned(), guard);
        }
        // Read after the lock is held; users are never deleted by this
        // subsystem, so the row checked above still exists.
        Ok(self.shared.tables()?.users.get(user_id).map(|user| user.balance))
    }

    async fn update_balance(&mut self, user_id: &str, balance: Decimal) -> Result<(), StoreError> {
        self.staged.push(Staged::Balance {
            user_id: user_id.to_owned(),
            balance,
        });
        Ok(())
    }

    async fn first_account(&mut self, user_id: &str) -> Result<Option<Account>, StoreError> {
        Ok(self
            .shared
            .tables()?
            .accounts
            .get(user_id)
            .and_then(|accounts| accounts.first())
            .cloned())
    }

    async fn append_entry(&mut self, entry: LedgerEntry) -> Result<(), StoreError> {
        self.staged.push(Staged::Entry(entry));
        Ok(())
    }

    async fn append_snapshot(&mut self, snapshot: BalanceSnapshot) -> Result<(), StoreError> {
        self.staged.push(Staged::Snapshot(snapshot));
        Ok(())
    }

    async fn commit(mut self) -> Result<(), StoreError> {
        let mut tables = self.shared.tables()?;
        for write in self.staged.drain(..) {
            match write {
                Staged::Balance { user_id, balance } => {
                    if let Some(user) = tables.users.get_mut(&user_id) {
                        user.balance = balance;
                    }
                }
                Staged::Entry(entry) => tables.ledger.push(entry),
                Staged::Snapshot(snapshot) => tables.snapshots.push(snapshot),
            }
        }
        // The tables guard drops before the row guards, so the writes
        // are visible before any waiting unit of work acquires a row.
        Ok(())
    }

    async fn rollback(self) -> Result<(), StoreError> {
        // Staged writes and row guards are dropped with `self`.
        Ok(())
    }
}
