use rust_decimal::Decimal;

/// Opaque customer identifier, assigned by CIF registration.
pub type UserId = String;

/// A customer row: identity plus the current balance.
///
/// The balance is only ever mutated through a unit of work; everything
/// else on this row belongs to CIF management.
#[derive(Debug, Clone)]
pub struct User {
    pub id: UserId,
    pub full_name: String,
    pub username: String,
    /// Hash as produced by the CIF service; never inspected here.
    pub password_hash: String,
    pub balance: Decimal,
}

impl User {
    /// Registration seam. Password hashing happens upstream in the CIF
    /// service, so a freshly registered row carries an empty hash.
    pub fn new(
        id: impl Into<UserId>,
        full_name: impl Into<String>,
        username: impl Into<String>,
        balance: Decimal,
    ) -> Self {
        Self {
            id: id.into(),
            full_name: full_name.into(),
            username: username.into(),
            password_hash: String::new(),
            balance,
        }
    }
}
