//! Concurrency properties of the transaction subsystem: no lost updates,
//! no deadlocks between opposing transfers, no overdrafts under
//! contention.

use std::time::Duration;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::time::timeout;

use banking_engine::domain::{Account, BalanceError, TransferError, User};
use banking_engine::engine::{TopUpRequest, TransferRequest};
use banking_engine::{Engine, MemoryStore};

fn seed_user(store: &MemoryStore, id: &str, balance: Decimal) {
    store
        .insert_user(User::new(id, format!("{id} name"), id, balance))
        .unwrap();
    store
        .insert_account(Account {
            account_no: format!("ACC-{id}"),
            account_type: "savings".to_owned(),
            user_id: id.to_owned(),
        })
        .unwrap();
}

fn transfer(source: &str, destination: &str, amount: Decimal) -> TransferRequest {
    TransferRequest {
        source_user_id: source.to_owned(),
        destination_user_id: destination.to_owned(),
        source_account_no: format!("ACC-{source}"),
        destination_account_no: format!("ACC-{destination}"),
        amount,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_top_ups_do_not_lose_updates() {
    let store = MemoryStore::new();
    seed_user(&store, "u1", dec!(100.00));
    let engine = Engine::new(store.clone());

    let mut handles = Vec::new();
    for i in 1..=8i64 {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            engine
                .top_up(TopUpRequest {
                    user_id: "u1".to_owned(),
                    account_no: "ACC-u1".to_owned(),
                    amount: Decimal::from(i),
                })
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    // 100 + (1 + 2 + ... + 8): every credit survives.
    assert_eq!(store.user_balance("u1").unwrap(), Some(dec!(136.00)));
    assert_eq!(store.ledger().unwrap().len(), 8);
    assert_eq!(store.snapshots().unwrap().len(), 8);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn opposing_transfers_neither_deadlock_nor_lose_funds() {
    let store = MemoryStore::new();
    seed_user(&store, "u1", dec!(500.00));
    seed_user(&store, "u2", dec!(500.00));
    let engine = Engine::new(store.clone());

    let mut handles = Vec::new();
    for _ in 0..10 {
        let forward = engine.clone();
        handles.push(tokio::spawn(async move {
            forward.transfer(transfer("u1", "u2", dec!(5.00))).await
        }));
        let backward = engine.clone();
        handles.push(tokio::spawn(async move {
            backward.transfer(transfer("u2", "u1", dec!(3.00))).await
        }));
    }

    for handle in handles {
        // A deadlock would hang here, not fail an assertion.
        timeout(Duration::from_secs(10), handle)
            .await
            .expect("opposing transfers must not deadlock")
            .unwrap()
            .unwrap();
    }

    assert_eq!(store.user_balance("u1").unwrap(), Some(dec!(480.00)));
    assert_eq!(store.user_balance("u2").unwrap(), Some(dec!(520.00)));
    // Total funds are conserved, two ledger legs per transfer.
    assert_eq!(store.totals().unwrap(), (2, dec!(1000.00)));
    assert_eq!(store.ledger().unwrap().len(), 40);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_transfers_never_overdraw_the_source() {
    let store = MemoryStore::new();
    seed_user(&store, "u1", dec!(25.00));
    seed_user(&store, "u2", dec!(0.00));
    let engine = Engine::new(store.clone());

    let mut handles = Vec::new();
    for _ in 0..10 {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            engine.transfer(transfer("u1", "u2", dec!(10.00))).await
        }));
    }

    let mut successes = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(TransferError::Balance(BalanceError::InsufficientFunds { .. })) => {}
            Err(other) => panic!("unexpected transfer failure: {other}"),
        }
    }

    // The serialized balance checks admit exactly two of the ten.
    assert_eq!(successes, 2);
    assert_eq!(store.user_balance("u1").unwrap(), Some(dec!(5.00)));
    assert_eq!(store.user_balance("u2").unwrap(), Some(dec!(20.00)));
    assert_eq!(store.ledger().unwrap().len(), 4);
}
