//! CSV instruction ingestion for the driver binary.
//!
//! Rows share the header `type,user,counterparty,account,amount`; the
//! meaning of `counterparty` depends on the row type:
//!
//! | type       | user        | counterparty        | account      | amount          |
//! |------------|-------------|---------------------|--------------|-----------------|
//! | `register` | new user id | full name           | account no   | opening balance |
//! | `account`  | user id     | account type        | account no   | —               |
//! | `topup`    | user id     | —                   | account no   | amount          |
//! | `transfer` | source id   | destination user id | account no   | amount          |

use std::io::Read;
use std::pin::Pin;

use futures::stream::{self, Stream};
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;

use crate::domain::UserId;

/// One driver instruction, parsed and typed.
#[derive(Debug, Clone)]
pub enum Instruction {
    /// Seed a user together with their first account. Stands in for CIF
    /// registration.
    Register {
        user: UserId,
        full_name: String,
        account_no: String,
        opening_balance: Decimal,
    },
    /// Open an additional account for an existing user.
    OpenAccount {
        user: UserId,
        account_type: String,
        account_no: String,
    },
    TopUp {
        user: UserId,
        account_no: String,
        amount: Decimal,
    },
    Transfer {
        source: UserId,
        destination: UserId,
        source_account_no: String,
        amount: Decimal,
    },
}

/// Errors that can occur while reading instruction rows.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("line {line}: failed to parse row: {source}")]
    Parse { line: usize, source: csv::Error },

    #[error("line {line}: unrecognized instruction type '{kind}'")]
    UnrecognizedType { line: usize, kind: String },

    #[error("line {line}: missing required field '{field}'")]
    MissingField { line: usize, field: &'static str },
}

/// Source of driver instructions.
pub trait InstructionStream {
    type Stream: Stream<Item = Result<Instruction, IngestError>> + Send + Unpin + 'static;
    fn stream(&mut self) -> Self::Stream;
}

/// Internal shape used only for CSV deserialization.
#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(rename = "type")]
    kind: String,
    user: String,
    counterparty: Option<String>,
    account: Option<String>,
    amount: Option<Decimal>,
}

fn required<T>(line: usize, field: &'static str, value: Option<T>) -> Result<T, IngestError> {
    value.ok_or(IngestError::MissingField { line, field })
}

impl TryFrom<(usize, CsvRow)> for Instruction {
    type Error = IngestError;

    fn try_from((line, row): (usize, CsvRow)) -> Result<Self, IngestError> {
        match row.kind.trim().to_ascii_lowercase().as_str() {
            "register" => Ok(Self::Register {
                user: row.user,
                full_name: required(line, "counterparty", row.counterparty)?,
                account_no: required(line, "account", row.account)?,
                opening_balance: row.amount.unwrap_or(Decimal::ZERO),
            }),
            "account" => Ok(Self::OpenAccount {
                user: row.user,
                account_type: required(line, "counterparty", row.counterparty)?,
                account_no: required(line, "account", row.account)?,
            }),
            "topup" => Ok(Self::TopUp {
                user: row.user,
                account_no: required(line, "account", row.account)?,
                amount: required(line, "amount", row.amount)?,
            }),
            "transfer" => Ok(Self::Transfer {
                source: row.user,
                destination: required(line, "counterparty", row.counterparty)?,
                source_account_no: required(line, "account", row.account)?,
                amount: required(line, "amount", row.amount)?,
            }),
            other => Err(IngestError::UnrecognizedType {
                line,
                kind: other.to_owned(),
            }),
        }
    }
}

pub struct CsvReader<R: Read> {
    reader: Option<csv::Reader<R>>,
}

impl<R: Read> CsvReader<R> {
    pub fn new(reader: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(reader);
        Self {
            reader: Some(reader),
        }
    }
}

impl<R: Read + Send + 'static> InstructionStream for CsvReader<R> {
    type Stream = Pin<Box<dyn Stream<Item = Result<Instruction, IngestError>> + Send>>;

    fn stream(&mut self) -> Self::Stream {
        // Take ownership of the reader so the stream owns all its data.
        let Some(reader) = self.reader.take() else {
            // Already consumed; return an empty stream.
            return Box::pin(stream::iter(Vec::<Result<Instruction, IngestError>>::new()));
        };

        let iter = reader
            .into_deserialize::<CsvRow>()
            .enumerate()
            .map(|(idx, row)| {
                let line = idx + 2; // 1-indexed, after the header
                match row {
                    Ok(row) => Instruction::try_from((line, row)),
                    Err(source) => Err(IngestError::Parse { line, source }),
                }
            });

        Box::pin(stream::iter(iter))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use futures::StreamExt;
    use rust_decimal_macros::dec;

    use super::*;

    async fn parse(data: &'static str) -> Vec<Result<Instruction, IngestError>> {
        let mut reader = CsvReader::new(Cursor::new(data));
        reader.stream().collect().await
    }

    #[tokio::test]
    async fn reads_register_rows() {
        let rows = parse(
            "type,user,counterparty,account,amount\n\
             register,u1,alice,SAV-1001,100.50\n",
        )
        .await;
        assert_eq!(rows.len(), 1);
        match rows.into_iter().next().unwrap().unwrap() {
            Instruction::Register {
                user,
                full_name,
                account_no,
                opening_balance,
            } => {
                assert_eq!(user, "u1");
                assert_eq!(full_name, "alice");
                assert_eq!(account_no, "SAV-1001");
                assert_eq!(opening_balance, dec!(100.50));
            }
            other => panic!("expected register, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn register_opening_balance_defaults_to_zero() {
        let rows = parse(
            "type,user,counterparty,account,amount\n\
             register,u1,alice,SAV-1001,\n",
        )
        .await;
        match rows.into_iter().next().unwrap().unwrap() {
            Instruction::Register { opening_balance, .. } => {
                assert_eq!(opening_balance, Decimal::ZERO);
            }
            other => panic!("expected register, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn reads_account_topup_and_transfer_rows() {
        let rows = parse(
            "type,user,counterparty,account,amount\n\
             account,u1,checking,CHK-1002,\n\
             topup,u1,,SAV-1001,25.00\n\
             transfer,u1,u2,SAV-1001,75.25\n",
        )
        .await;
        assert_eq!(rows.len(), 3);
        assert!(matches!(
            &rows[0],
            Ok(Instruction::OpenAccount { account_type, .. }) if account_type == "checking"
        ));
        assert!(matches!(
            &rows[1],
            Ok(Instruction::TopUp { amount, .. }) if *amount == dec!(25.00)
        ));
        assert!(matches!(
            &rows[2],
            Ok(Instruction::Transfer { destination, .. }) if destination == "u2"
        ));
    }

    #[tokio::test]
    async fn unrecognized_type_is_reported_with_its_line() {
        let rows = parse(
            "type,user,counterparty,account,amount\n\
             register,u1,alice,SAV-1001,1.00\n\
             withdraw,u1,,SAV-1001,5.00\n",
        )
        .await;
        assert!(matches!(
            &rows[1],
            Err(IngestError::UnrecognizedType { line: 3, kind }) if kind == "withdraw"
        ));
    }

    #[tokio::test]
    async fn missing_amount_on_topup_is_an_error() {
        let rows = parse(
            "type,user,counterparty,account,amount\n\
             topup,u1,,SAV-1001,\n",
        )
        .await;
        assert!(matches!(
            &rows[0],
            Err(IngestError::MissingField { line: 2, field: "amount" })
        ));
    }

    #[tokio::test]
    async fn unparseable_amount_is_a_parse_error() {
        let rows = parse(
            "type,user,counterparty,account,amount\n\
             topup,u1,,SAV-1001,ten\n",
        )
        .await;
        assert!(matches!(&rows[0], Err(IngestError::Parse { line: 2, .. })));
    }

    #[tokio::test]
    async fn a_consumed_reader_yields_an_empty_stream() {
        let mut reader = CsvReader::new(Cursor::new("type,user,counterparty,account,amount\n"));
        let _ = reader.stream().collect::<Vec<_>>().await;
        assert!(reader.stream().collect::<Vec<_>>().await.is_empty());
    }
}
