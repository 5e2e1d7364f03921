//! Transfer engine tests under concurrent load
//!
//! These run on a multi-threaded runtime so transfers really contend for the
//! same account rows. A deadlock shows up as a LockTimeout error instead of
//! a hung test.
//!
//! Run with: cargo test --test transfer_tx_test -- --nocapture

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use bank_core::adapters::MemoryStore;
use bank_core::domain::{
    AddAccountBalanceParams, CreateAccountParams, CreateUserParams, TransferTxParams,
};
use bank_core::ports::{LedgerStore, Queries};
use bank_core::services::TransferService;
use bank_core::{Account, Error};

/// Number of concurrent transfers per test
const CONCURRENT_TRANSFERS: usize = 5;

const AMOUNT: i64 = 10;

// ============================================================================
// Test helpers
// ============================================================================

async fn create_account(store: &MemoryStore, username: &str) -> Account {
    store
        .create_user(CreateUserParams {
            username: username.to_string(),
            hashed_password: "hash".to_string(),
            full_name: format!("{} Test", username),
            email: format!("{}@example.com", username),
        })
        .await
        .unwrap();
    store
        .create_account(CreateAccountParams {
            owner: username.to_string(),
            currency: "USD".to_string(),
        })
        .await
        .unwrap()
}

async fn setup(lock_timeout: Duration) -> (Arc<MemoryStore>, Arc<TransferService>, Account, Account) {
    let store = Arc::new(MemoryStore::new().with_lock_timeout(lock_timeout));
    let account1 = create_account(&store, "alice").await;
    let account2 = create_account(&store, "bob").await;
    let service = Arc::new(TransferService::new(store.clone()));
    (store, service, account1, account2)
}

async fn entry_sum(store: &MemoryStore, account_id: i64) -> i64 {
    store
        .list_entries(account_id)
        .await
        .unwrap()
        .iter()
        .map(|e| e.amount)
        .sum()
}

// ============================================================================
// Concurrent transfers
// ============================================================================

/// N identical transfers run at once. Each result must see a distinct
/// number of completed transfers, and the final balances must account for
/// all of them.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_transfers_same_direction() {
    let (store, service, account1, account2) = setup(Duration::from_secs(5)).await;

    let mut handles = Vec::new();
    for _ in 0..CONCURRENT_TRANSFERS {
        let service = Arc::clone(&service);
        let params = TransferTxParams {
            from_account_id: account1.id,
            to_account_id: account2.id,
            amount: AMOUNT,
        };
        handles.push(tokio::spawn(async move { service.transfer_tx(params).await }));
    }

    let mut seen = HashSet::new();
    for handle in handles {
        let result = handle.await.unwrap().unwrap();

        assert_eq!(result.transfer.from_account_id, account1.id);
        assert_eq!(result.transfer.to_account_id, account2.id);
        assert_eq!(result.transfer.amount, AMOUNT);
        assert_eq!(result.from_entry.account_id, account1.id);
        assert_eq!(result.from_entry.amount, -AMOUNT);
        assert_eq!(result.to_entry.account_id, account2.id);
        assert_eq!(result.to_entry.amount, AMOUNT);

        // Committed rows are readable afterwards
        store.get_transfer(result.transfer.id).await.unwrap();
        store.get_entry(result.from_entry.id).await.unwrap();
        store.get_entry(result.to_entry.id).await.unwrap();

        let diff1 = account1.balance - result.from_account.balance;
        let diff2 = result.to_account.balance - account2.balance;
        assert_eq!(diff1, diff2);
        assert!(diff1 > 0);
        assert_eq!(diff1 % AMOUNT, 0);

        let k = (diff1 / AMOUNT) as usize;
        assert!((1..=CONCURRENT_TRANSFERS).contains(&k));
        assert!(seen.insert(k), "two transfers observed the same balance");
    }

    let n = CONCURRENT_TRANSFERS as i64;
    let updated1 = store.get_account(account1.id).await.unwrap();
    let updated2 = store.get_account(account2.id).await.unwrap();
    assert_eq!(updated1.balance, account1.balance - n * AMOUNT);
    assert_eq!(updated2.balance, account2.balance + n * AMOUNT);

    assert_eq!(entry_sum(&store, account1.id).await, updated1.balance);
    assert_eq!(entry_sum(&store, account2.id).await, updated2.balance);
}

/// Transfers in both directions between the same two accounts. Each one
/// locks the lower account id first, so none of them can deadlock.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_reciprocal_transfers_do_not_deadlock() {
    let (store, service, account1, account2) = setup(Duration::from_secs(5)).await;

    let mut handles = Vec::new();
    for i in 0..CONCURRENT_TRANSFERS * 2 {
        let service = Arc::clone(&service);
        let (from, to) = if i % 2 == 0 {
            (account1.id, account2.id)
        } else {
            (account2.id, account1.id)
        };
        handles.push(tokio::spawn(async move {
            service
                .transfer_tx(TransferTxParams {
                    from_account_id: from,
                    to_account_id: to,
                    amount: AMOUNT,
                })
                .await
        }));
    }

    for handle in handles {
        let result = handle.await.unwrap();
        assert!(result.is_ok(), "transfer failed: {:?}", result.err());
    }

    let updated1 = store.get_account(account1.id).await.unwrap();
    let updated2 = store.get_account(account2.id).await.unwrap();
    assert_eq!(updated1.balance, account1.balance);
    assert_eq!(updated2.balance, account2.balance);

    assert_eq!(entry_sum(&store, account1.id).await, updated1.balance);
    assert_eq!(entry_sum(&store, account2.id).await, updated2.balance);
    assert_eq!(
        store.list_entries(account1.id).await.unwrap().len(),
        CONCURRENT_TRANSFERS * 2
    );
}

// ============================================================================
// Failure and cancellation
// ============================================================================

#[tokio::test]
async fn test_unknown_account_rolls_back() {
    let (store, service, account1, _account2) = setup(Duration::from_secs(5)).await;

    let err = service
        .transfer_tx(TransferTxParams {
            from_account_id: account1.id,
            to_account_id: 9_999,
            amount: AMOUNT,
        })
        .await
        .unwrap_err();

    match &err {
        Error::TransactionFailure(inner) => assert!(matches!(**inner, Error::NotFound(_))),
        other => panic!("expected TransactionFailure, got {:?}", other),
    }
    assert!(err.is_not_found());

    assert_eq!(store.get_account(account1.id).await.unwrap().balance, 0);
    assert!(store.list_entries(account1.id).await.unwrap().is_empty());
    assert!(store.get_transfer(1).await.is_err());
}

/// The second row lock cannot be taken; the lock wait times out and the
/// first account's already-applied delta is undone.
#[tokio::test]
async fn test_lock_timeout_rolls_back_partial_update() {
    let (store, service, account1, account2) = setup(Duration::from_millis(100)).await;
    assert!(account1.id < account2.id);

    // Another transaction holds the higher-id row
    let mut holder = store.begin().await.unwrap();
    holder
        .add_account_balance(AddAccountBalanceParams {
            id: account2.id,
            amount: 0,
        })
        .await
        .unwrap();

    let err = service
        .transfer_tx(TransferTxParams {
            from_account_id: account1.id,
            to_account_id: account2.id,
            amount: AMOUNT,
        })
        .await
        .unwrap_err();
    assert!(matches!(err.root(), Error::LockTimeout(_)));

    holder.rollback().await.unwrap();

    assert_eq!(store.get_account(account1.id).await.unwrap().balance, 0);
    assert_eq!(store.get_account(account2.id).await.unwrap().balance, 0);
    assert!(store.list_entries(account1.id).await.unwrap().is_empty());
    assert!(store.list_entries(account2.id).await.unwrap().is_empty());
}

/// Dropping an in-flight transfer (caller timeout) leaves nothing behind
/// and releases the rows it had locked.
#[tokio::test]
async fn test_cancelled_transfer_leaves_no_writes() {
    let (store, service, account1, account2) = setup(Duration::from_secs(30)).await;

    let mut holder = store.begin().await.unwrap();
    holder
        .add_account_balance(AddAccountBalanceParams {
            id: account2.id,
            amount: 0,
        })
        .await
        .unwrap();

    let cancelled = tokio::time::timeout(
        Duration::from_millis(100),
        service.transfer_tx(TransferTxParams {
            from_account_id: account1.id,
            to_account_id: account2.id,
            amount: AMOUNT,
        }),
    )
    .await;
    assert!(cancelled.is_err(), "transfer should still be waiting for the row lock");

    holder.commit().await.unwrap();

    // account1's row was locked and updated by the dropped transaction
    assert_eq!(store.get_account(account1.id).await.unwrap().balance, 0);
    assert!(store.list_entries(account1.id).await.unwrap().is_empty());

    let result = service
        .transfer_tx(TransferTxParams {
            from_account_id: account1.id,
            to_account_id: account2.id,
            amount: AMOUNT,
        })
        .await
        .unwrap();
    assert_eq!(result.from_account.balance, -AMOUNT);
    assert_eq!(result.to_account.balance, AMOUNT);
}
