//! Money-movement operations: top-up and transfer.
//!
//! Every operation runs inside a single unit of work obtained from the
//! [`LedgerStore`]. Balances are read under row locks, mutated through
//! the pure functions in [`domain::balance`], and every balance change
//! appends one ledger entry plus one balance snapshot. Any failure drops
//! the unit of work, which rolls back all staged writes.
//!
//! [`domain::balance`]: crate::domain::balance

use rust_decimal::Decimal;
use tracing::info;

use crate::domain::balance;
use crate::domain::{
    Account, AccountNo, BalanceSnapshot, LedgerEntry, LedgerStore, LedgerUow, Party, StoreError,
    TopUpError, TransactionType, TransferError, UserId, random_reference,
};

/// Credit a single user's balance.
///
/// Mirrors the inbound top-up payload. `account_no` is informational;
/// the ledger stamps the account resolved from `user_id`.
#[derive(Debug, Clone)]
pub struct TopUpRequest {
    pub user_id: UserId,
    pub account_no: AccountNo,
    pub amount: Decimal,
}

/// Move funds from one user to another.
///
/// The account numbers are informational, as in [`TopUpRequest`]; both
/// legs stamp the account resolved from the respective user id.
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub source_user_id: UserId,
    pub destination_user_id: UserId,
    pub source_account_no: AccountNo,
    pub destination_account_no: AccountNo,
    pub amount: Decimal,
}

/// Success payload for a top-up.
#[derive(Debug, Clone)]
pub struct TopUpReceipt {
    pub message: String,
    pub new_balance: String,
}

/// Success payload for a transfer. Echoing both new balances is an
/// extension over the upstream service, which only returned a message.
#[derive(Debug, Clone)]
pub struct TransferReceipt {
    pub message: String,
    pub source_balance: String,
    pub destination_balance: String,
}

/// The transaction engine: coordinates top-up and transfer against a
/// ledger store.
#[derive(Debug, Clone)]
pub struct Engine<S> {
    store: S,
}

/// Public API
impl<S: LedgerStore> Engine<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Credit `amount` onto the user's balance and record the movement.
    pub async fn top_up(&self, request: TopUpRequest) -> Result<TopUpReceipt, TopUpError> {
        let result = self.apply_top_up(&request).await;
        match &result {
            Ok(receipt) => info!(
                user = %request.user_id,
                amount = %request.amount,
                balance = %receipt.new_balance,
                "top-up applied"
            ),
            Err(reason) => info!(
                user = %request.user_id,
                amount = %request.amount,
                %reason,
                "top-up rejected"
            ),
        }
        result
    }

    /// Debit the source, credit the destination, and record both legs
    /// under one shared reference number.
    pub async fn transfer(&self, request: TransferRequest) -> Result<TransferReceipt, TransferError> {
        let result = self.apply_transfer(&request).await;
        match &result {
            Ok(receipt) => info!(
                source = %request.source_user_id,
                destination = %request.destination_user_id,
                amount = %request.amount,
                source_balance = %receipt.source_balance,
                "transfer applied"
            ),
            Err(reason) => info!(
                source = %request.source_user_id,
                destination = %request.destination_user_id,
                amount = %request.amount,
                %reason,
                "transfer rejected"
            ),
        }
        result
    }
}

/// Private API
impl<S: LedgerStore> Engine<S> {
    async fn apply_top_up(&self, request: &TopUpRequest) -> Result<TopUpReceipt, TopUpError> {
        let user_id = request.user_id.as_str();
        let amount = request.amount;
        if amount <= Decimal::ZERO {
            return Err(TopUpError::InvalidAmount(amount));
        }

        let mut uow = self.store.begin().await?;

        let balance_before = uow
            .balance_for_update(user_id)
            .await?
            .ok_or_else(|| TopUpError::UserNotFound(user_id.to_owned()))?;
        let balance_after = balance::credit(balance_before, amount)?;
        uow.update_balance(user_id, balance_after).await?;

        let account = uow
            .first_account(user_id)
            .await?
            .ok_or_else(|| TopUpError::AccountNotFound(user_id.to_owned()))?;

        let reference_no = random_reference();
        record_movement(
            &mut uow,
            LedgerEntry::new(
                &reference_no,
                user_id,
                TransactionType::TopUp,
                amount,
                balance_before,
                balance_after,
            ),
            &account,
        )
        .await?;

        uow.commit().await?;

        Ok(TopUpReceipt {
            message: "top up successful".to_owned(),
            new_balance: balance_after.to_string(),
        })
    }

    async fn apply_transfer(
        &self,
        request: &TransferRequest,
    ) -> Result<TransferReceipt, TransferError> {
        let source = request.source_user_id.as_str();
        let destination = request.destination_user_id.as_str();
        let amount = request.amount;
        if amount <= Decimal::ZERO {
            return Err(TransferError::InvalidAmount(amount));
        }

        let mut uow = self.store.begin().await?;

        // Row locks are taken in ascending user id order so two opposing
        // transfers cannot deadlock on each other. A transfer to the same
        // user takes its single lock once.
        let (source_read, destination_read) = if source == destination {
            let balance = uow.balance_for_update(source).await?;
            (balance, balance)
        } else if source < destination {
            let source_balance = uow.balance_for_update(source).await?;
            (source_balance, uow.balance_for_update(destination).await?)
        } else {
            let destination_balance = uow.balance_for_update(destination).await?;
            (uow.balance_for_update(source).await?, destination_balance)
        };

        let source_before = source_read
            .ok_or_else(|| TransferError::UserNotFound(Party::Source, source.to_owned()))?;
        let destination_before = destination_read
            .ok_or_else(|| TransferError::UserNotFound(Party::Destination, destination.to_owned()))?;

        // Sufficiency is checked here, before any write is staged.
        let source_after = balance::debit(source_before, amount)?;
        // A self transfer credits the balance it just debited; the legs
        // cancel out instead of double-counting the stale read.
        let destination_before = if source == destination {
            source_after
        } else {
            destination_before
        };
        let destination_after = balance::credit(destination_before, amount)?;

        uow.update_balance(source, source_after).await?;
        uow.update_balance(destination, destination_after).await?;

        let source_account = uow
            .first_account(source)
            .await?
            .ok_or_else(|| TransferError::AccountNotFound(Party::Source, source.to_owned()))?;
        let destination_account = uow.first_account(destination).await?.ok_or_else(|| {
            TransferError::AccountNotFound(Party::Destination, destination.to_owned())
        })?;

        // Both legs share one reference number.
        let reference_no = random_reference();
        record_movement(
            &mut uow,
            LedgerEntry::new(
                &reference_no,
                source,
                TransactionType::Transfer,
                amount,
                source_before,
                source_after,
            ),
            &source_account,
        )
        .await?;
        record_movement(
            &mut uow,
            LedgerEntry::new(
                &reference_no,
                destination,
                TransactionType::Transfer,
                amount,
                destination_before,
                destination_after,
            ),
            &destination_account,
        )
        .await?;

        uow.commit().await?;

        Ok(TransferReceipt {
            message: "transfer successful".to_owned(),
            source_balance: source_after.to_string(),
            destination_balance: destination_after.to_string(),
        })
    }
}

/// Transaction recorder: appends the ledger entry for one leg and the
/// balance snapshot derived from it, both carrying the same timestamp,
/// into the caller's unit of work.
async fn record_movement<U: LedgerUow>(
    uow: &mut U,
    entry: LedgerEntry,
    account: &Account,
) -> Result<(), StoreError> {
    let snapshot = BalanceSnapshot::for_entry(&entry, account);
    uow.append_entry(entry).await?;
    uow.append_snapshot(snapshot).await?;
    Ok(())
}
