use std::env;
use std::fs::File;

use futures::StreamExt;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use banking_engine::domain::{Account, User};
use banking_engine::engine::{Engine, TopUpRequest, TransferRequest};
use banking_engine::ingestion::{CsvReader, Instruction, InstructionStream};
use banking_engine::memory_store::MemoryStore;
use banking_engine::output;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("warn".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let path = env::args()
        .nth(1)
        .ok_or("usage: banking_engine <instructions.csv>")?;
    let file = File::open(&path)?;

    let store = MemoryStore::new();
    let engine = Engine::new(store.clone());
    let mut ingestion = CsvReader::new(file);

    let mut instructions = ingestion.stream();
    while let Some(item) = instructions.next().await {
        match item {
            Ok(instruction) => apply(&store, &engine, instruction).await,
            Err(error) => warn!(%error, "skipping unreadable instruction"),
        }
    }

    let (users, total_balance) = store.totals()?;
    info!(users, total_balance = %total_balance, "run complete");

    output::write_balances(store.balances()?);

    Ok(())
}

/// Apply one instruction, logging failures without stopping the run.
async fn apply(store: &MemoryStore, engine: &Engine<MemoryStore>, instruction: Instruction) {
    match instruction {
        Instruction::Register {
            user,
            full_name,
            account_no,
            opening_balance,
        } => {
            // Stands in for CIF registration; password hashing lives
            // there, so the seeded row carries no hash.
            let account = Account {
                account_no,
                account_type: "savings".to_owned(),
                user_id: user.clone(),
            };
            let result = store
                .insert_user(User::new(
                    user.clone(),
                    full_name.clone(),
                    full_name,
                    opening_balance,
                ))
                .and_then(|()| store.insert_account(account));
            if let Err(error) = result {
                warn!(user = %user, %error, "registration rejected");
            }
        }
        Instruction::OpenAccount {
            user,
            account_type,
            account_no,
        } => {
            let result = store.insert_account(Account {
                account_no,
                account_type,
                user_id: user.clone(),
            });
            if let Err(error) = result {
                warn!(user = %user, %error, "account rejected");
            }
        }
        // The engine logs the outcome of both money movements itself.
        Instruction::TopUp {
            user,
            account_no,
            amount,
        } => {
            let _ = engine
                .top_up(TopUpRequest {
                    user_id: user,
                    account_no,
                    amount,
                })
                .await;
        }
        Instruction::Transfer {
            source,
            destination,
            source_account_no,
            amount,
        } => {
            let _ = engine
                .transfer(TransferRequest {
                    source_user_id: source,
                    destination_user_id: destination,
                    source_account_no,
                    // Not carried by the csv; informational only.
                    destination_account_no: String::new(),
                    amount,
                })
                .await;
        }
    }
}
