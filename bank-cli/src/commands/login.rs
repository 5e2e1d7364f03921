//! Login command - open a session

use anyhow::Result;
use bank_core::services::LoginRequest;
use colored::Colorize;

use super::{get_context, password_or_prompt};
use crate::output;

pub async fn run(username: String, password: Option<String>, json: bool) -> Result<()> {
    let password = password_or_prompt(password, false)?;
    let ctx = get_context()?;

    let result = ctx
        .user_service
        .login_user(LoginRequest {
            username,
            password,
            user_agent: format!("bank-cli/{}", env!("CARGO_PKG_VERSION")),
            client_ip: "local".to_string(),
        })
        .await?;
    ctx.save().await?;

    if json {
        return output::json(&result);
    }

    output::success(&format!("Logged in as {}", result.user.username));
    println!();
    println!("{}", "Access token".bold());
    println!("  {}", result.access_token);
    println!(
        "  expires {}",
        output::format_time(&result.access_token_expires_at).dimmed()
    );
    println!("{}", "Refresh token".bold());
    println!("  {}", result.refresh_token);
    println!(
        "  expires {}",
        output::format_time(&result.refresh_token_expires_at).dimmed()
    );
    println!();
    output::info("Export the access token as BANK_ACCESS_TOKEN or pass it with --token");
    Ok(())
}
