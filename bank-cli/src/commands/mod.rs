//! CLI command implementations

pub mod account;
pub mod init;
pub mod login;
pub mod logs;
pub mod token;
pub mod transfer;
pub mod user;

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use bank_core::services::{EntryPoint, LoggingService};
use bank_core::token::{Payload, TokenError};
use bank_core::BankContext;
use clap::Args;
use dialoguer::Password;

/// Access credential for commands that act on behalf of a user
#[derive(Args, Debug)]
pub struct AuthArgs {
    /// Access token from `bank login`
    #[arg(long, env = "BANK_ACCESS_TOKEN", hide_env_values = true)]
    pub token: String,
}

/// Get the logging service for CLI operations
///
/// Returns None if logging fails to initialize (shouldn't block operations)
pub fn get_logger() -> Option<LoggingService> {
    let bank_dir = get_bank_dir().ok()?;
    LoggingService::new(&bank_dir, EntryPoint::Cli, env!("CARGO_PKG_VERSION")).ok()
}

/// Record how a command ended, ignoring any errors (logging should never
/// break the app)
pub fn log_outcome(logger: &Option<LoggingService>, command: &str, result: &Result<()>) {
    let Some(l) = logger else {
        return;
    };
    let _ = match result {
        Ok(()) => l.log_command(command),
        Err(e) => l.log_failure(
            command,
            failure_category(e),
            &e.to_string(),
            Some(&format!("{:#}", e)),
        ),
    };
}

/// Category of the first ledger error in the chain
fn failure_category(err: &anyhow::Error) -> &'static str {
    err.chain()
        .find_map(|cause| {
            if let Some(e) = cause.downcast_ref::<bank_core::Error>() {
                return Some(e.category());
            }
            cause.downcast_ref::<TokenError>().map(|_| "auth")
        })
        .unwrap_or("cli")
}

/// Get the bank directory from environment or default
pub fn get_bank_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("BANK_DIR") {
        return Ok(PathBuf::from(dir));
    }
    dirs::home_dir()
        .map(|home| home.join(".bank"))
        .ok_or_else(|| anyhow!("Could not find home directory; set BANK_DIR"))
}

/// Open the ledger in the bank directory
pub fn get_context() -> Result<BankContext> {
    let bank_dir = get_bank_dir()?;
    BankContext::new(&bank_dir).context("Failed to open bank")
}

/// Verify the caller's access credential and return its payload
pub fn authenticate(ctx: &BankContext, auth: &AuthArgs) -> Result<Payload> {
    let header = format!("Bearer {}", auth.token.trim());
    ctx.authorize(Some(&header))
        .context("Not authenticated; run `bank login` and pass the access token")
}

/// Password from the flag/env value, or prompted
pub fn password_or_prompt(password: Option<String>, confirm: bool) -> Result<String> {
    if let Some(p) = password {
        return Ok(p);
    }

    let mut prompt = Password::new().with_prompt("Password");
    if confirm {
        prompt = prompt.with_confirmation("Confirm password", "Passwords do not match");
    }
    Ok(prompt.interact()?)
}
