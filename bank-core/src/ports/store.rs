//! Ledger store port - transactional persistence abstraction

use std::future::Future;
use std::pin::Pin;

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::result::{Error, Result};
use crate::domain::{
    Account, AddAccountBalanceParams, CreateAccountParams, CreateEntryParams,
    CreateSessionParams, CreateTransferParams, CreateUserParams, Entry, ListAccountsParams,
    Session, Transfer, User,
};

/// Operations available inside a transaction
///
/// `add_account_balance` is the only way a balance changes. It takes the
/// account's row lock, which the transaction then holds until it commits or
/// rolls back.
#[async_trait]
pub trait Queries: Send {
    async fn create_transfer(&mut self, params: CreateTransferParams) -> Result<Transfer>;

    async fn create_entry(&mut self, params: CreateEntryParams) -> Result<Entry>;

    /// Atomically add `amount` to the balance; returns the updated row
    async fn add_account_balance(&mut self, params: AddAccountBalanceParams) -> Result<Account>;

    async fn get_account(&mut self, id: i64) -> Result<Account>;
}

/// An open unit of work
///
/// Dropping a transaction that was neither committed nor rolled back rolls
/// it back, so a cancelled caller never leaves partial writes behind.
#[async_trait]
pub trait LedgerTx: Queries {
    fn queries(&mut self) -> &mut dyn Queries;

    async fn commit(&mut self) -> Result<()>;

    async fn rollback(&mut self) -> Result<()>;
}

/// Ledger store abstraction
///
/// Implementations (adapters) provide the actual storage. Everything outside
/// `begin` runs in its own implicit transaction.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Start a transaction
    async fn begin(&self) -> Result<Box<dyn LedgerTx>>;

    // === Accounts ===

    async fn create_account(&self, params: CreateAccountParams) -> Result<Account>;

    async fn get_account(&self, id: i64) -> Result<Account>;

    /// Accounts of one owner, ordered by id
    async fn list_accounts(&self, params: ListAccountsParams) -> Result<Vec<Account>>;

    // === Entries and transfers ===

    async fn get_entry(&self, id: i64) -> Result<Entry>;

    /// Entries of one account, oldest first
    async fn list_entries(&self, account_id: i64) -> Result<Vec<Entry>>;

    async fn get_transfer(&self, id: i64) -> Result<Transfer>;

    // === Users and sessions ===

    async fn create_user(&self, params: CreateUserParams) -> Result<User>;

    async fn get_user(&self, username: &str) -> Result<User>;

    async fn create_session(&self, params: CreateSessionParams) -> Result<Session>;

    async fn get_session(&self, id: Uuid) -> Result<Session>;
}

/// Future returned by a transaction body
pub type TxFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Run `body` inside one transaction
///
/// Commits iff `body` succeeds. On failure the transaction is rolled back
/// and the body's error comes back as [`Error::TransactionFailure`], or as
/// [`Error::RollbackFailure`] carrying both causes when the rollback fails
/// too.
pub async fn run_tx<T, F>(store: &dyn LedgerStore, body: F) -> Result<T>
where
    T: Send,
    F: for<'q> FnOnce(&'q mut dyn Queries) -> TxFuture<'q, T> + Send,
{
    let mut tx = store.begin().await?;
    let outcome = body(tx.queries()).await;

    match outcome {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => match tx.rollback().await {
            Ok(()) => {
                tracing::debug!(error = %err, "transaction rolled back");
                Err(Error::TransactionFailure(Box::new(err)))
            }
            Err(rollback_err) => {
                tracing::warn!(error = %err, rollback_error = %rollback_err, "rollback failed");
                Err(Error::RollbackFailure {
                    tx: Box::new(err),
                    rollback: Box::new(rollback_err),
                })
            }
        },
    }
}
