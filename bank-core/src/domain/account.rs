//! Account domain model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Currencies an account can be opened in
pub const SUPPORTED_CURRENCIES: &[&str] = &["USD", "EUR", "KES"];

/// A ledger account owned by a user
///
/// The balance is kept in minor units (cents). It only ever changes through
/// the store's atomic add primitive inside a transfer transaction, so it
/// always equals the sum of the account's entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    /// Username of the owning user
    pub owner: String,
    pub balance: i64,
    /// ISO 4217 currency code, normalized to uppercase
    pub currency: String,
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Normalize currency code to uppercase
    pub fn normalize_currency(currency: &str) -> String {
        currency.trim().to_uppercase()
    }

    /// Whether accounts may be opened in this currency
    pub fn is_supported_currency(currency: &str) -> bool {
        SUPPORTED_CURRENCIES.contains(&currency)
    }
}

/// Parameters for opening an account
#[derive(Debug, Clone)]
pub struct CreateAccountParams {
    pub owner: String,
    pub currency: String,
}

/// Page of accounts owned by one user
#[derive(Debug, Clone)]
pub struct ListAccountsParams {
    pub owner: String,
    pub limit: usize,
    pub offset: usize,
}

/// Atomic balance increment
#[derive(Debug, Clone, Copy)]
pub struct AddAccountBalanceParams {
    pub id: i64,
    pub amount: i64,
}
