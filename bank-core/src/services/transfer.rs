//! Transfer service - the transactional transfer engine

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::domain::result::{Error, Result};
use crate::domain::{
    Account, AddAccountBalanceParams, CreateEntryParams, CreateTransferParams, TransferTxParams,
    TransferTxResult,
};
use crate::ports::{run_tx, LedgerStore, Queries};

/// A transfer as requested by an authenticated caller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferRequest {
    pub from_account_id: i64,
    pub to_account_id: i64,
    pub amount: i64,
    pub currency: String,
}

/// Moves money between accounts
pub struct TransferService {
    store: Arc<dyn LedgerStore>,
}

impl TransferService {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Perform a transfer in a single transaction
    ///
    /// Creates the transfer record and both entries, then applies the two
    /// balance deltas. Balances are always updated lower account id first,
    /// whichever side is sending: every transfer touching the same pair of
    /// accounts takes the two row locks in the same order, so reciprocal
    /// transfers cannot deadlock.
    ///
    /// Expects both accounts to exist with matching currencies and a positive
    /// amount; [`TransferService::create_transfer`] checks all of that.
    pub async fn transfer_tx(&self, params: TransferTxParams) -> Result<TransferTxResult> {
        run_tx(self.store.as_ref(), move |q| {
            Box::pin(async move {
                let transfer = q
                    .create_transfer(CreateTransferParams {
                        from_account_id: params.from_account_id,
                        to_account_id: params.to_account_id,
                        amount: params.amount,
                    })
                    .await?;

                let from_entry = q
                    .create_entry(CreateEntryParams {
                        account_id: params.from_account_id,
                        amount: -params.amount,
                    })
                    .await?;

                let to_entry = q
                    .create_entry(CreateEntryParams {
                        account_id: params.to_account_id,
                        amount: params.amount,
                    })
                    .await?;

                let (from_account, to_account) =
                    if params.from_account_id < params.to_account_id {
                        add_money(
                            q,
                            params.from_account_id,
                            -params.amount,
                            params.to_account_id,
                            params.amount,
                        )
                        .await?
                    } else {
                        let (to_account, from_account) = add_money(
                            q,
                            params.to_account_id,
                            params.amount,
                            params.from_account_id,
                            -params.amount,
                        )
                        .await?;
                        (from_account, to_account)
                    };

                Ok(TransferTxResult {
                    transfer,
                    from_account,
                    to_account,
                    from_entry,
                    to_entry,
                })
            })
        })
        .await
    }

    /// Validate a caller's transfer request, then run it
    ///
    /// The source account must belong to `subject`.
    pub async fn create_transfer(
        &self,
        subject: &str,
        request: TransferRequest,
    ) -> Result<TransferTxResult> {
        if request.amount <= 0 {
            return Err(Error::validation("amount must be greater than zero"));
        }
        if request.from_account_id == request.to_account_id {
            return Err(Error::validation("cannot transfer to the same account"));
        }

        let currency = Account::normalize_currency(&request.currency);
        if !Account::is_supported_currency(&currency) {
            return Err(Error::validation(format!(
                "unsupported currency {}",
                currency
            )));
        }

        let from_account = self.valid_account(request.from_account_id, &currency).await?;
        if from_account.owner != subject {
            return Err(Error::unauthorized(
                "from account doesn't belong to the authenticated user",
            ));
        }
        self.valid_account(request.to_account_id, &currency).await?;

        let result = self
            .transfer_tx(TransferTxParams {
                from_account_id: request.from_account_id,
                to_account_id: request.to_account_id,
                amount: request.amount,
            })
            .await?;

        tracing::info!(
            transfer_id = result.transfer.id,
            from_account_id = request.from_account_id,
            to_account_id = request.to_account_id,
            "transfer committed"
        );
        Ok(result)
    }

    async fn valid_account(&self, account_id: i64, currency: &str) -> Result<Account> {
        let account = self.store.get_account(account_id).await?;
        if account.currency != currency {
            return Err(Error::CurrencyMismatch {
                account_id,
                actual: account.currency,
                expected: currency.to_string(),
            });
        }
        Ok(account)
    }
}

/// Apply two balance deltas, in the order given
async fn add_money(
    q: &mut dyn Queries,
    account_id1: i64,
    amount1: i64,
    account_id2: i64,
    amount2: i64,
) -> Result<(Account, Account)> {
    let account1 = q
        .add_account_balance(AddAccountBalanceParams {
            id: account_id1,
            amount: amount1,
        })
        .await?;
    let account2 = q
        .add_account_balance(AddAccountBalanceParams {
            id: account_id2,
            amount: amount2,
        })
        .await?;
    Ok((account1, account2))
}
