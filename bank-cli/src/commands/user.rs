//! User commands

use anyhow::Result;
use bank_core::services::CreateUserRequest;
use clap::Subcommand;

use super::{get_context, password_or_prompt};
use crate::output;

#[derive(Subcommand)]
pub enum UserCommands {
    /// Register a new user
    Create {
        /// Alphanumeric username
        username: String,
        #[arg(long)]
        full_name: String,
        #[arg(long)]
        email: String,
        /// Password (prompted if omitted)
        #[arg(short, long, env = "BANK_PASSWORD", hide_env_values = true)]
        password: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

pub async fn run(command: UserCommands) -> Result<()> {
    match command {
        UserCommands::Create {
            username,
            full_name,
            email,
            password,
            json,
        } => {
            let password = password_or_prompt(password, true)?;
            let ctx = get_context()?;
            let user = ctx
                .user_service
                .create_user(CreateUserRequest {
                    username,
                    password,
                    full_name,
                    email,
                })
                .await?;
            ctx.save().await?;

            if json {
                return output::json(&user);
            }
            output::success(&format!("Created user {}", user.username));
        }
    }
    Ok(())
}
