//! Bank CLI - a multi-user ledger in your terminal

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::{account, init, login, logs, token, transfer, user, AuthArgs};

/// Bank - multi-user ledger with bearer credentials
#[derive(Parser)]
#[command(name = "bank", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create settings and a token key in the bank directory
    Init {
        /// Credential scheme to issue (paseto or jwt)
        #[arg(long)]
        scheme: Option<String>,
        /// Replace an existing key (invalidates issued credentials)
        #[arg(long)]
        force: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Manage users
    User {
        #[command(subcommand)]
        command: user::UserCommands,
    },

    /// Log in and receive access and refresh credentials
    Login {
        username: String,
        /// Password (prompted if omitted)
        #[arg(short, long, env = "BANK_PASSWORD", hide_env_values = true)]
        password: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Renew or inspect credentials
    Token {
        #[command(subcommand)]
        command: token::TokenCommands,
    },

    /// Manage accounts
    Account {
        #[command(subcommand)]
        command: account::AccountCommands,
    },

    /// Move money between two accounts
    Transfer {
        /// Source account (must be yours)
        #[arg(long)]
        from: i64,
        /// Destination account
        #[arg(long)]
        to: i64,
        /// Amount in minor units (cents)
        #[arg(long)]
        amount: i64,
        /// Currency of both accounts
        #[arg(long)]
        currency: String,
        #[command(flatten)]
        auth: AuthArgs,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// View and manage the event log
    Logs {
        #[command(subcommand)]
        command: logs::LogsCommands,
    },
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Init { .. } => "init",
            Commands::User { .. } => "user",
            Commands::Login { .. } => "login",
            Commands::Token { .. } => "token",
            Commands::Account { .. } => "account",
            Commands::Transfer { .. } => "transfer",
            Commands::Logs { .. } => "logs",
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("BANK_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();
    let command_name = cli.command.name();

    let logger = commands::get_logger();
    let result = run(cli).await;
    commands::log_outcome(&logger, command_name, &result);

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Init { scheme, force, json } => init::run(scheme, force, json),
        Commands::User { command } => user::run(command).await,
        Commands::Login { username, password, json } => login::run(username, password, json).await,
        Commands::Token { command } => token::run(command).await,
        Commands::Account { command } => account::run(command).await,
        Commands::Transfer { from, to, amount, currency, auth, json } => {
            transfer::run(from, to, amount, currency, auth, json).await
        }
        Commands::Logs { command } => logs::run(command),
    }
}
