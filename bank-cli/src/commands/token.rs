//! Token commands - renew and inspect credentials

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;

use super::{authenticate, get_context, AuthArgs};
use crate::output;

#[derive(Subcommand)]
pub enum TokenCommands {
    /// Exchange a refresh token for a new access token
    Renew {
        /// Refresh token from `bank login`
        #[arg(long, env = "BANK_REFRESH_TOKEN", hide_env_values = true)]
        refresh_token: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Check an access token and show who it identifies
    Verify {
        #[command(flatten)]
        auth: AuthArgs,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

pub async fn run(command: TokenCommands) -> Result<()> {
    match command {
        TokenCommands::Renew {
            refresh_token,
            json,
        } => {
            let ctx = get_context()?;
            let result = ctx
                .user_service
                .renew_access_token(refresh_token.trim())
                .await?;

            if json {
                return output::json(&result);
            }
            println!("{}", "Access token".bold());
            println!("  {}", result.access_token);
            println!(
                "  expires {}",
                output::format_time(&result.access_token_expires_at).dimmed()
            );
        }
        TokenCommands::Verify { auth, json } => {
            let ctx = get_context()?;
            let payload = authenticate(&ctx, &auth)?;

            if json {
                return output::json(&payload);
            }
            let mut table = output::create_table();
            table.add_row(vec!["Subject".to_string(), payload.subject.clone()]);
            table.add_row(vec!["Token ID".to_string(), payload.id.to_string()]);
            table.add_row(vec!["Issued".to_string(), output::format_time(&payload.issued_at)]);
            table.add_row(vec!["Expires".to_string(), output::format_time(&payload.expires_at)]);
            println!("{}", table);
        }
    }
    Ok(())
}
