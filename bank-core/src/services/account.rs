//! Account service - opening and reading accounts on behalf of a user

use std::sync::Arc;

use crate::domain::result::{Error, Result};
use crate::domain::{Account, CreateAccountParams, Entry, ListAccountsParams};
use crate::ports::LedgerStore;

/// Largest page `list_accounts` returns
pub const MAX_PAGE_SIZE: u32 = 50;

/// Account service
///
/// Every operation acts for an authenticated subject and refuses to touch
/// accounts the subject does not own.
pub struct AccountService {
    store: Arc<dyn LedgerStore>,
}

impl AccountService {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Open an account in `currency` with a zero balance
    pub async fn create_account(&self, subject: &str, currency: &str) -> Result<Account> {
        let currency = Account::normalize_currency(currency);
        if !Account::is_supported_currency(&currency) {
            return Err(Error::validation(format!(
                "unsupported currency {}",
                currency
            )));
        }

        let account = self
            .store
            .create_account(CreateAccountParams {
                owner: subject.to_string(),
                currency,
            })
            .await?;

        tracing::info!(account_id = account.id, currency = %account.currency, "account opened");
        Ok(account)
    }

    pub async fn get_account(&self, subject: &str, id: i64) -> Result<Account> {
        let account = self.store.get_account(id).await?;
        if account.owner != subject {
            return Err(Error::unauthorized(
                "account doesn't belong to the authenticated user",
            ));
        }
        Ok(account)
    }

    /// One page of the subject's accounts, ordered by id
    ///
    /// Pages are numbered from 1.
    pub async fn list_accounts(
        &self,
        subject: &str,
        page_id: u32,
        page_size: u32,
    ) -> Result<Vec<Account>> {
        if page_id < 1 {
            return Err(Error::validation("page_id must be at least 1"));
        }
        if page_size < 1 || page_size > MAX_PAGE_SIZE {
            return Err(Error::validation(format!(
                "page_size must be between 1 and {}",
                MAX_PAGE_SIZE
            )));
        }

        let offset = (page_id as usize - 1)
            .checked_mul(page_size as usize)
            .ok_or_else(|| Error::validation("page_id is out of range"))?;

        self.store
            .list_accounts(ListAccountsParams {
                owner: subject.to_string(),
                limit: page_size as usize,
                offset,
            })
            .await
    }

    /// Entries of one of the subject's accounts, oldest first
    pub async fn list_entries(&self, subject: &str, account_id: i64) -> Result<Vec<Entry>> {
        self.get_account(subject, account_id).await?;
        self.store.list_entries(account_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::MemoryStore;
    use crate::domain::CreateUserParams;

    async fn setup() -> AccountService {
        let store = Arc::new(MemoryStore::new());
        for username in ["alice", "bob"] {
            store
                .create_user(CreateUserParams {
                    username: username.to_string(),
                    hashed_password: "hash".to_string(),
                    full_name: username.to_string(),
                    email: format!("{}@example.com", username),
                })
                .await
                .unwrap();
        }
        AccountService::new(store)
    }

    #[tokio::test]
    async fn test_create_account() {
        let service = setup().await;

        let account = service.create_account("alice", " eur ").await.unwrap();
        assert_eq!(account.owner, "alice");
        assert_eq!(account.currency, "EUR");
        assert_eq!(account.balance, 0);

        let duplicate = service.create_account("alice", "EUR").await;
        assert!(matches!(duplicate, Err(Error::UniqueViolation(_))));

        let unsupported = service.create_account("alice", "GBP").await;
        assert!(matches!(unsupported, Err(Error::Validation(_))));

        let unknown_owner = service.create_account("carol", "USD").await;
        assert!(matches!(unknown_owner, Err(Error::ForeignKeyViolation(_))));
    }

    #[tokio::test]
    async fn test_get_account_checks_owner() {
        let service = setup().await;
        let account = service.create_account("alice", "USD").await.unwrap();

        assert_eq!(service.get_account("alice", account.id).await.unwrap(), account);
        assert!(matches!(
            service.get_account("bob", account.id).await,
            Err(Error::Unauthorized(_))
        ));
        assert!(matches!(
            service.get_account("alice", 999).await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            service.list_entries("bob", account.id).await,
            Err(Error::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn test_list_accounts_pagination() {
        let service = setup().await;
        for currency in ["USD", "EUR", "KES"] {
            service.create_account("alice", currency).await.unwrap();
        }
        service.create_account("bob", "USD").await.unwrap();

        let first = service.list_accounts("alice", 1, 2).await.unwrap();
        let second = service.list_accounts("alice", 2, 2).await.unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(second.len(), 1);
        assert!(first[1].id < second[0].id);

        assert!(service.list_accounts("alice", 0, 5).await.is_err());
        assert!(service.list_accounts("alice", 1, 0).await.is_err());
        assert!(service.list_accounts("alice", 1, MAX_PAGE_SIZE + 1).await.is_err());
    }

    #[tokio::test]
    async fn test_list_accounts_last_possible_page() {
        let service = setup().await;
        service.create_account("alice", "USD").await.unwrap();

        let far = service.list_accounts("alice", u32::MAX, MAX_PAGE_SIZE).await;
        if usize::BITS > 32 {
            assert!(far.unwrap().is_empty());
        } else {
            // The offset no longer fits in usize
            assert!(matches!(far, Err(Error::Validation(_))));
        }
    }
}
