//! Bank Core - ledger, transfer engine and bearer credentials
//!
//! This crate implements the core domain logic following hexagonal architecture:
//!
//! - **domain**: Core entities (Account, Entry, Transfer, User, Session)
//! - **ports**: Trait definitions for external dependencies (LedgerStore)
//! - **services**: Business logic orchestration (transfers, accounts, users)
//! - **adapters**: Concrete implementations (in-process row-locked store)
//! - **token**: Signed-claims and encrypted bearer credentials

pub mod adapters;
pub mod config;
pub mod domain;
pub mod ports;
pub mod services;
pub mod token;

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use fs2::FileExt;

use adapters::MemoryStore;
use config::Config;
use services::*;
use token::{Maker, Payload};

// Re-export commonly used types at crate root
pub use domain::result::Error;
pub use domain::{Account, Entry, Session, Transfer, TransferTxParams, TransferTxResult, User, UserView};
pub use token::{TokenError, TokenScheme};

/// Main context for ledger operations
///
/// This is the primary entry point for all business logic. It owns the
/// store, the configured credential maker and all services, and holds an
/// exclusive lock on the bank directory for as long as it lives.
pub struct BankContext {
    pub config: Config,
    pub store: Arc<MemoryStore>,
    pub maker: Arc<dyn Maker>,
    pub account_service: AccountService,
    pub transfer_service: TransferService,
    pub user_service: UserService,
    bank_dir: PathBuf,
    _lock_file: File,
}

impl BankContext {
    /// Open the ledger in `bank_dir` using its settings
    pub fn new(bank_dir: &Path) -> Result<Self> {
        let config = Config::load(bank_dir)?;
        Self::with_config(bank_dir, config)
    }

    pub fn with_config(bank_dir: &Path, config: Config) -> Result<Self> {
        config.validate()?;
        std::fs::create_dir_all(bank_dir)
            .with_context(|| format!("Failed to create {}", bank_dir.display()))?;

        // One process at a time loads and saves the snapshot
        let lock_path = bank_dir.join("ledger.lock");
        let lock_file = OpenOptions::new()
            .create(true)
            .write(true)
            .open(&lock_path)
            .with_context(|| format!("Failed to open {}", lock_path.display()))?;
        lock_file
            .try_lock_exclusive()
            .with_context(|| format!("{} is in use by another process", bank_dir.display()))?;

        let store = Arc::new(
            MemoryStore::open(&bank_dir.join("ledger.json"))
                .context("Failed to open ledger")?
                .with_lock_timeout(config.lock_timeout),
        );
        let maker = token::new_maker(config.token_scheme, config.symmetric_key()?)?;

        // Create services
        let account_service = AccountService::new(store.clone());
        let transfer_service = TransferService::new(store.clone());
        let user_service = UserService::new(
            store.clone(),
            Arc::clone(&maker),
            config.access_token_duration,
            config.refresh_token_duration,
        );

        tracing::debug!(
            bank_dir = %bank_dir.display(),
            scheme = %config.token_scheme,
            "bank context opened"
        );

        Ok(Self {
            config,
            store,
            maker,
            account_service,
            transfer_service,
            user_service,
            bank_dir: bank_dir.to_path_buf(),
            _lock_file: lock_file,
        })
    }

    /// Verify an authorization header value; the payload subject is the caller
    pub fn authorize(&self, header: Option<&str>) -> domain::result::Result<Payload> {
        services::authorize(self.maker.as_ref(), header)
    }

    /// Persist the committed ledger state
    pub async fn save(&self) -> Result<()> {
        self.store.save().await.context("Failed to save ledger")?;
        Ok(())
    }

    pub fn bank_dir(&self) -> &Path {
        &self.bank_dir
    }
}
