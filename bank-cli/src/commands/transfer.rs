//! Transfer command

use anyhow::Result;
use bank_core::services::TransferRequest;

use super::{authenticate, get_context, AuthArgs};
use crate::output;

pub async fn run(
    from: i64,
    to: i64,
    amount: i64,
    currency: String,
    auth: AuthArgs,
    json: bool,
) -> Result<()> {
    let ctx = get_context()?;
    let payload = authenticate(&ctx, &auth)?;

    let result = ctx
        .transfer_service
        .create_transfer(
            &payload.subject,
            TransferRequest {
                from_account_id: from,
                to_account_id: to,
                amount,
                currency,
            },
        )
        .await?;
    ctx.save().await?;

    if json {
        return output::json(&result);
    }

    let currency = &result.from_account.currency;
    output::success(&format!(
        "Transfer {} committed: {} from account {} to account {}",
        result.transfer.id,
        output::format_amount(result.transfer.amount, currency),
        result.transfer.from_account_id,
        result.transfer.to_account_id
    ));
    println!(
        "  Account {} balance: {}",
        result.from_account.id,
        output::format_amount(result.from_account.balance, currency)
    );
    Ok(())
}
