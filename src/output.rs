//! Final balance table, written as CSV to stdout.

use std::io;

use rust_decimal::Decimal;
use serde::Serialize;

use crate::domain::UserId;

#[derive(Debug, Serialize)]
struct BalanceRow {
    user: UserId,
    full_name: String,
    balance: String,
}

/// Write one `user,full_name,balance` row per user.
pub fn write_balances(rows: impl IntoIterator<Item = (UserId, String, Decimal)>) {
    let stdout = io::stdout();
    let mut writer = csv::Writer::from_writer(stdout.lock());

    for (user, full_name, balance) in rows {
        let row = BalanceRow {
            user,
            full_name,
            balance: balance.to_string(),
        };
        writer.serialize(&row).expect("failed to write csv row");
    }

    writer.flush().expect("failed to flush csv writer");
}
