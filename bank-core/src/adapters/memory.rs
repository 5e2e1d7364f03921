//! In-process ledger store with row-level locking
//!
//! Every account row sits behind its own async mutex. A transaction takes a
//! row's lock the first time it adds to that balance and keeps it until it
//! commits or rolls back, the way a relational store holds the row lock taken
//! by `UPDATE ... RETURNING`. Inserts are staged inside the transaction and
//! only become visible on commit.
//!
//! The store can be backed by a JSON snapshot file (`open` / `save`) so the
//! CLI keeps its ledger between runs.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex as RowMutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::domain::result::{Error, Result};
use crate::domain::{
    Account, AddAccountBalanceParams, CreateAccountParams, CreateEntryParams,
    CreateSessionParams, CreateTransferParams, CreateUserParams, Entry, ListAccountsParams,
    Session, Transfer, User,
};
use crate::ports::{LedgerStore, LedgerTx, Queries};

/// How long a statement waits for a row lock before giving up
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

type Row = Arc<RowMutex<Account>>;

#[derive(Default)]
struct AccountTable {
    rows: BTreeMap<i64, Row>,
    /// (owner, currency) -> account id
    by_owner: BTreeMap<(String, String), i64>,
}

#[derive(Default)]
struct Tables {
    accounts: RwLock<AccountTable>,
    entries: Mutex<BTreeMap<i64, Entry>>,
    transfers: Mutex<BTreeMap<i64, Transfer>>,
    users: Mutex<BTreeMap<String, User>>,
    sessions: Mutex<HashMap<Uuid, Session>>,
    account_seq: AtomicI64,
    entry_seq: AtomicI64,
    transfer_seq: AtomicI64,
}

fn next_id(seq: &AtomicI64) -> i64 {
    seq.fetch_add(1, Ordering::SeqCst) + 1
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|e| Error::database(format!("Lock poisoned: {}", e)))
}

fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>> {
    lock.read()
        .map_err(|e| Error::database(format!("Lock poisoned: {}", e)))
}

fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>> {
    lock.write()
        .map_err(|e| Error::database(format!("Lock poisoned: {}", e)))
}

impl Tables {
    fn row(&self, id: i64) -> Result<Row> {
        read(&self.accounts)?
            .rows
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("account {}", id)))
    }

    fn account_exists(&self, id: i64) -> Result<bool> {
        Ok(read(&self.accounts)?.rows.contains_key(&id))
    }

    /// Rows referencing an account need it to exist
    fn require_account(&self, id: i64) -> Result<()> {
        if !self.account_exists(id)? {
            return Err(Error::not_found(format!("account {}", id)));
        }
        Ok(())
    }
}

async fn lock_row(row: Row, id: i64, timeout: Duration) -> Result<OwnedMutexGuard<Account>> {
    tokio::time::timeout(timeout, row.lock_owned())
        .await
        .map_err(|_| {
            Error::LockTimeout(format!(
                "row lock on account {} not acquired within {:?}",
                id, timeout
            ))
        })
}

/// Read the committed state of one account
async fn read_account(tables: &Tables, id: i64, timeout: Duration) -> Result<Account> {
    let row = tables.row(id)?;
    let guard = lock_row(row, id, timeout).await?;
    Ok(guard.clone())
}

/// On-disk form of the whole store
#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    accounts: Vec<Account>,
    entries: Vec<Entry>,
    transfers: Vec<Transfer>,
    users: Vec<User>,
    sessions: Vec<Session>,
}

/// In-process ledger store
///
/// Cloning is cheap and every clone shares the same tables.
#[derive(Clone)]
pub struct MemoryStore {
    tables: Arc<Tables>,
    lock_timeout: Duration,
    snapshot_path: Option<PathBuf>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Empty store with no backing file
    pub fn new() -> Self {
        Self {
            tables: Arc::new(Tables::default()),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            snapshot_path: None,
        }
    }

    pub fn with_lock_timeout(mut self, lock_timeout: Duration) -> Self {
        self.lock_timeout = lock_timeout;
        self
    }

    /// Open a store backed by `path`, loading it if the file exists
    pub fn open(path: &Path) -> Result<Self> {
        let mut store = Self::new();
        store.snapshot_path = Some(path.to_path_buf());

        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let snapshot: Snapshot = serde_json::from_str(&content)?;
            store.load(snapshot)?;
        }

        Ok(store)
    }

    pub fn snapshot_path(&self) -> Option<&Path> {
        self.snapshot_path.as_deref()
    }

    fn load(&self, snapshot: Snapshot) -> Result<()> {
        let tables = &self.tables;

        let max_account = snapshot.accounts.iter().map(|a| a.id).max().unwrap_or(0);
        let max_entry = snapshot.entries.iter().map(|e| e.id).max().unwrap_or(0);
        let max_transfer = snapshot.transfers.iter().map(|t| t.id).max().unwrap_or(0);
        tables.account_seq.store(max_account, Ordering::SeqCst);
        tables.entry_seq.store(max_entry, Ordering::SeqCst);
        tables.transfer_seq.store(max_transfer, Ordering::SeqCst);

        {
            let mut accounts = write(&tables.accounts)?;
            for account in snapshot.accounts {
                accounts
                    .by_owner
                    .insert((account.owner.clone(), account.currency.clone()), account.id);
                accounts
                    .rows
                    .insert(account.id, Arc::new(RowMutex::new(account)));
            }
        }

        lock(&tables.entries)?.extend(snapshot.entries.into_iter().map(|e| (e.id, e)));
        lock(&tables.transfers)?.extend(snapshot.transfers.into_iter().map(|t| (t.id, t)));
        lock(&tables.users)?.extend(snapshot.users.into_iter().map(|u| (u.username.clone(), u)));
        lock(&tables.sessions)?.extend(snapshot.sessions.into_iter().map(|s| (s.id, s)));

        Ok(())
    }

    async fn snapshot(&self) -> Result<Snapshot> {
        let rows: Vec<(i64, Row)> = read(&self.tables.accounts)?
            .rows
            .iter()
            .map(|(id, row)| (*id, Arc::clone(row)))
            .collect();

        let mut accounts = Vec::with_capacity(rows.len());
        for (id, row) in rows {
            accounts.push(lock_row(row, id, self.lock_timeout).await?.clone());
        }

        Ok(Snapshot {
            accounts,
            entries: lock(&self.tables.entries)?.values().cloned().collect(),
            transfers: lock(&self.tables.transfers)?.values().cloned().collect(),
            users: lock(&self.tables.users)?.values().cloned().collect(),
            sessions: lock(&self.tables.sessions)?.values().cloned().collect(),
        })
    }

    /// Write the committed state to the snapshot file
    ///
    /// Writes to a temporary file first and renames it over the old one.
    pub async fn save(&self) -> Result<()> {
        let path = self
            .snapshot_path
            .clone()
            .ok_or_else(|| Error::database("store has no snapshot file"))?;

        let snapshot = self.snapshot().await?;
        let content = serde_json::to_string_pretty(&snapshot)?;

        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, content)?;
        std::fs::rename(&tmp_path, &path)?;

        tracing::debug!(path = %path.display(), accounts = snapshot.accounts.len(), "ledger saved");
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn LedgerTx>> {
        Ok(Box::new(MemoryTx {
            tables: Arc::clone(&self.tables),
            lock_timeout: self.lock_timeout,
            locked: BTreeMap::new(),
            transfers: Vec::new(),
            entries: Vec::new(),
            open: true,
        }))
    }

    async fn create_account(&self, params: CreateAccountParams) -> Result<Account> {
        if !lock(&self.tables.users)?.contains_key(&params.owner) {
            return Err(Error::ForeignKeyViolation(format!(
                "user {} does not exist",
                params.owner
            )));
        }

        let mut accounts = write(&self.tables.accounts)?;
        let key = (params.owner, params.currency);
        if accounts.by_owner.contains_key(&key) {
            return Err(Error::UniqueViolation(format!(
                "{} already has a {} account",
                key.0, key.1
            )));
        }

        let account = Account {
            id: next_id(&self.tables.account_seq),
            owner: key.0.clone(),
            balance: 0,
            currency: key.1.clone(),
            created_at: Utc::now(),
        };
        accounts.by_owner.insert(key, account.id);
        accounts
            .rows
            .insert(account.id, Arc::new(RowMutex::new(account.clone())));

        Ok(account)
    }

    async fn get_account(&self, id: i64) -> Result<Account> {
        read_account(&self.tables, id, self.lock_timeout).await
    }

    async fn list_accounts(&self, params: ListAccountsParams) -> Result<Vec<Account>> {
        let rows: Vec<(i64, Row)> = {
            let accounts = read(&self.tables.accounts)?;
            let mut ids: Vec<i64> = accounts
                .by_owner
                .iter()
                .filter(|((owner, _), _)| *owner == params.owner)
                .map(|(_, id)| *id)
                .collect();
            ids.sort_unstable();
            ids.into_iter()
                .skip(params.offset)
                .take(params.limit)
                .filter_map(|id| accounts.rows.get(&id).map(|row| (id, Arc::clone(row))))
                .collect()
        };

        let mut result = Vec::with_capacity(rows.len());
        for (id, row) in rows {
            result.push(lock_row(row, id, self.lock_timeout).await?.clone());
        }
        Ok(result)
    }

    async fn get_entry(&self, id: i64) -> Result<Entry> {
        lock(&self.tables.entries)?
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("entry {}", id)))
    }

    async fn list_entries(&self, account_id: i64) -> Result<Vec<Entry>> {
        Ok(lock(&self.tables.entries)?
            .values()
            .filter(|e| e.account_id == account_id)
            .cloned()
            .collect())
    }

    async fn get_transfer(&self, id: i64) -> Result<Transfer> {
        lock(&self.tables.transfers)?
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("transfer {}", id)))
    }

    async fn create_user(&self, params: CreateUserParams) -> Result<User> {
        let mut users = lock(&self.tables.users)?;
        if users.contains_key(&params.username) {
            return Err(Error::UniqueViolation(format!(
                "username {} is taken",
                params.username
            )));
        }
        if users.values().any(|u| u.email == params.email) {
            return Err(Error::UniqueViolation(format!(
                "email {} is already registered",
                params.email
            )));
        }

        let user = User {
            username: params.username,
            hashed_password: params.hashed_password,
            full_name: params.full_name,
            email: params.email,
            password_changed_at: None,
            created_at: Utc::now(),
        };
        users.insert(user.username.clone(), user.clone());
        Ok(user)
    }

    async fn get_user(&self, username: &str) -> Result<User> {
        lock(&self.tables.users)?
            .get(username)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("user {}", username)))
    }

    async fn create_session(&self, params: CreateSessionParams) -> Result<Session> {
        if !lock(&self.tables.users)?.contains_key(&params.username) {
            return Err(Error::ForeignKeyViolation(format!(
                "user {} does not exist",
                params.username
            )));
        }

        let mut sessions = lock(&self.tables.sessions)?;
        if sessions.contains_key(&params.id) {
            return Err(Error::UniqueViolation(format!("session {}", params.id)));
        }

        let session = Session {
            id: params.id,
            username: params.username,
            refresh_token_hash: Session::fingerprint(&params.refresh_token),
            user_agent: params.user_agent,
            client_ip: params.client_ip,
            is_blocked: params.is_blocked,
            expires_at: params.expires_at,
            created_at: Utc::now(),
        };
        sessions.insert(session.id, session.clone());
        Ok(session)
    }

    async fn get_session(&self, id: Uuid) -> Result<Session> {
        lock(&self.tables.sessions)?
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("session {}", id)))
    }
}

struct LockedRow {
    guard: OwnedMutexGuard<Account>,
    /// Balance before this transaction touched the row
    committed_balance: i64,
}

/// Transaction over a [`MemoryStore`]
pub struct MemoryTx {
    tables: Arc<Tables>,
    lock_timeout: Duration,
    locked: BTreeMap<i64, LockedRow>,
    transfers: Vec<Transfer>,
    entries: Vec<Entry>,
    open: bool,
}

impl MemoryTx {
    fn ensure_open(&self) -> Result<()> {
        if !self.open {
            return Err(Error::database("transaction is already closed"));
        }
        Ok(())
    }

    /// Undo balance changes and drop staged rows, releasing every row lock
    fn abort(&mut self) {
        for row in self.locked.values_mut() {
            row.guard.balance = row.committed_balance;
        }
        self.locked.clear();
        self.transfers.clear();
        self.entries.clear();
        self.open = false;
    }
}

#[async_trait]
impl Queries for MemoryTx {
    async fn create_transfer(&mut self, params: CreateTransferParams) -> Result<Transfer> {
        self.ensure_open()?;
        if params.amount <= 0 {
            return Err(Error::validation("transfer amount must be positive"));
        }
        self.tables.require_account(params.from_account_id)?;
        self.tables.require_account(params.to_account_id)?;

        let transfer = Transfer {
            id: next_id(&self.tables.transfer_seq),
            from_account_id: params.from_account_id,
            to_account_id: params.to_account_id,
            amount: params.amount,
            created_at: Utc::now(),
        };
        self.transfers.push(transfer.clone());
        Ok(transfer)
    }

    async fn create_entry(&mut self, params: CreateEntryParams) -> Result<Entry> {
        self.ensure_open()?;
        self.tables.require_account(params.account_id)?;

        let entry = Entry {
            id: next_id(&self.tables.entry_seq),
            account_id: params.account_id,
            amount: params.amount,
            created_at: Utc::now(),
        };
        self.entries.push(entry.clone());
        Ok(entry)
    }

    async fn add_account_balance(&mut self, params: AddAccountBalanceParams) -> Result<Account> {
        self.ensure_open()?;

        if !self.locked.contains_key(&params.id) {
            let row = self.tables.row(params.id)?;
            let guard = lock_row(row, params.id, self.lock_timeout).await?;
            let committed_balance = guard.balance;
            self.locked.insert(
                params.id,
                LockedRow {
                    guard,
                    committed_balance,
                },
            );
        }

        let row = self
            .locked
            .get_mut(&params.id)
            .ok_or_else(|| Error::database(format!("row lock on account {} lost", params.id)))?;
        row.guard.balance = row
            .guard
            .balance
            .checked_add(params.amount)
            .ok_or_else(|| Error::validation(format!("balance overflow on account {}", params.id)))?;

        Ok(row.guard.clone())
    }

    async fn get_account(&mut self, id: i64) -> Result<Account> {
        self.ensure_open()?;
        if let Some(row) = self.locked.get(&id) {
            return Ok(row.guard.clone());
        }
        read_account(&self.tables, id, self.lock_timeout).await
    }
}

#[async_trait]
impl LedgerTx for MemoryTx {
    fn queries(&mut self) -> &mut dyn Queries {
        self
    }

    async fn commit(&mut self) -> Result<()> {
        self.ensure_open()?;
        {
            // Staged rows land before the row locks are released
            let mut transfers = lock(&self.tables.transfers)?;
            let mut entries = lock(&self.tables.entries)?;
            transfers.extend(self.transfers.drain(..).map(|t| (t.id, t)));
            entries.extend(self.entries.drain(..).map(|e| (e.id, e)));
        }
        let rows = self.locked.len();
        self.locked.clear();
        self.open = false;

        tracing::trace!(rows, "transaction committed");
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.abort();
        Ok(())
    }
}

impl Drop for MemoryTx {
    fn drop(&mut self) {
        if self.open {
            tracing::debug!(rows = self.locked.len(), "transaction dropped while open, rolling back");
            self.abort();
        }
    }
}
