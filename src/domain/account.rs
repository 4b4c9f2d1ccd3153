use crate::domain::user::UserId;

/// Unique account number, e.g. "SAV-1001".
pub type AccountNo = String;

/// A named account held by a user.
///
/// This subsystem only ever reads accounts, to stamp ledger records;
/// creation and maintenance belong to CIF management.
#[derive(Debug, Clone)]
pub struct Account {
    pub account_no: AccountNo,
    pub account_type: String,
    pub user_id: UserId,
}
