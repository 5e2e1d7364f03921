//! Core domain entities
//!
//! All ledger entities are defined here. These are pure data structures
//! with small helpers - no I/O.

mod account;
mod entry;
pub mod result;
mod session;
mod transfer;
mod user;

pub use account::{
    Account, AddAccountBalanceParams, CreateAccountParams, ListAccountsParams, SUPPORTED_CURRENCIES,
};
pub use entry::{CreateEntryParams, Entry};
pub use session::{CreateSessionParams, Session};
pub use transfer::{CreateTransferParams, Transfer, TransferTxParams, TransferTxResult};
pub use user::{CreateUserParams, User, UserView};
