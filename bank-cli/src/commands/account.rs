//! Account commands

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;

use super::{authenticate, get_context, AuthArgs};
use crate::output;

#[derive(Subcommand)]
pub enum AccountCommands {
    /// Open an account (USD, EUR or KES)
    Create {
        currency: String,
        #[command(flatten)]
        auth: AuthArgs,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one of your accounts
    Get {
        id: i64,
        /// Also list the account's entries
        #[arg(long)]
        entries: bool,
        #[command(flatten)]
        auth: AuthArgs,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List your accounts
    List {
        /// Page number, starting at 1
        #[arg(long, default_value = "1")]
        page: u32,
        /// Accounts per page
        #[arg(long, default_value = "10")]
        page_size: u32,
        #[command(flatten)]
        auth: AuthArgs,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

pub async fn run(command: AccountCommands) -> Result<()> {
    match command {
        AccountCommands::Create {
            currency,
            auth,
            json,
        } => {
            let ctx = get_context()?;
            let payload = authenticate(&ctx, &auth)?;
            let account = ctx
                .account_service
                .create_account(&payload.subject, &currency)
                .await?;
            ctx.save().await?;

            if json {
                return output::json(&account);
            }
            output::success(&format!(
                "Opened {} account {}",
                account.currency, account.id
            ));
        }
        AccountCommands::Get {
            id,
            entries,
            auth,
            json,
        } => {
            let ctx = get_context()?;
            let payload = authenticate(&ctx, &auth)?;
            let account = ctx.account_service.get_account(&payload.subject, id).await?;
            let entry_list = if entries {
                Some(ctx.account_service.list_entries(&payload.subject, id).await?)
            } else {
                None
            };

            if json {
                return output::json(&serde_json::json!({
                    "account": account,
                    "entries": entry_list,
                }));
            }

            println!("{}", output::accounts_table(std::slice::from_ref(&account)));
            if let Some(entry_list) = entry_list {
                println!();
                println!("{}", "Entries".bold());
                let mut table = output::create_table();
                table.set_header(vec!["ID", "Amount", "Created"]);
                for entry in &entry_list {
                    table.add_row(vec![
                        entry.id.to_string(),
                        output::format_amount(entry.amount, &account.currency),
                        output::format_time(&entry.created_at),
                    ]);
                }
                println!("{}", table);
            }
        }
        AccountCommands::List {
            page,
            page_size,
            auth,
            json,
        } => {
            let ctx = get_context()?;
            let payload = authenticate(&ctx, &auth)?;
            let accounts = ctx
                .account_service
                .list_accounts(&payload.subject, page, page_size)
                .await?;

            if json {
                return output::json(&accounts);
            }
            if accounts.is_empty() {
                println!("No accounts found.");
                return Ok(());
            }
            println!("{}", output::accounts_table(&accounts));
        }
    }
    Ok(())
}
