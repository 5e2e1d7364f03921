//! `bank logs` - command outcomes recorded in logs.jsonl

use anyhow::{bail, Result};
use bank_core::services::{EntryPoint, LogEntry, LogFilter, LogSummary, LoggingService};
use chrono::{Duration, TimeZone, Utc};
use clap::Subcommand;
use colored::Colorize;

use super::get_bank_dir;
use crate::output;

#[derive(Subcommand)]
pub enum LogsCommands {
    /// Recent command outcomes, newest first
    List {
        /// Only this command (e.g. transfer, login)
        #[arg(long)]
        command: Option<String>,
        /// Only failed commands
        #[arg(long)]
        failed: bool,
        /// Only the last N hours
        #[arg(long)]
        hours: Option<i64>,
        #[arg(short, long, default_value = "50")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Success and failure counts per command, failures per category
    Stats {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Drop entries older than N days
    Prune {
        #[arg(long, default_value = "30")]
        days: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn open_log() -> Result<LoggingService> {
    LoggingService::new(&get_bank_dir()?, EntryPoint::Cli, env!("CARGO_PKG_VERSION"))
}

/// Unix ms `hours` ago; rejects windows chrono can't represent
fn cutoff_ms(hours: i64) -> Result<i64> {
    if hours < 0 {
        bail!("Window must not be negative");
    }
    Duration::try_hours(hours)
        .and_then(|window| Utc::now().checked_sub_signed(window))
        .map(|t| t.timestamp_millis())
        .ok_or_else(|| anyhow::anyhow!("Window of {} hours is out of range", hours))
}

fn format_timestamp(timestamp_ms: i64) -> String {
    Utc.timestamp_millis_opt(timestamp_ms)
        .single()
        .map(|dt| output::format_time(&dt))
        .unwrap_or_else(|| timestamp_ms.to_string())
}

fn outcome_cell(entry: &LogEntry) -> String {
    if entry.is_failure() {
        "failed".red().to_string()
    } else {
        "ok".green().to_string()
    }
}

fn print_entries(entries: &[LogEntry]) {
    let mut table = output::create_table();
    table.set_header(vec!["Time", "Command", "Outcome", "Category", "Message"]);
    for entry in entries {
        table.add_row(vec![
            format_timestamp(entry.timestamp),
            entry.command.clone().unwrap_or_else(|| entry.event.clone()),
            outcome_cell(entry),
            entry.category.clone().unwrap_or_default(),
            entry.error_message.clone().unwrap_or_default(),
        ]);
    }
    println!("{}", table);
}

fn print_summary(summary: &LogSummary, log_path: &str) {
    if summary.total == 0 {
        output::info("The event log is empty.");
        return;
    }

    let mut commands = output::create_table();
    commands.set_header(vec!["Command", "Succeeded", "Failed"]);
    for (command, outcomes) in &summary.by_command {
        let failed = if outcomes.failed > 0 {
            outcomes.failed.to_string().red().to_string()
        } else {
            "0".to_string()
        };
        commands.add_row(vec![command.clone(), outcomes.succeeded.to_string(), failed]);
    }
    println!("{}", commands);

    if !summary.failures_by_category.is_empty() {
        let mut categories = output::create_table();
        categories.set_header(vec!["Failure category", "Count"]);
        for (category, count) in &summary.failures_by_category {
            categories.add_row(vec![category.clone(), count.to_string()]);
        }
        println!("{}", categories);
    }

    let span = match (summary.first_timestamp, summary.last_timestamp) {
        (Some(first), Some(last)) => {
            format!("{} .. {}", format_timestamp(first), format_timestamp(last))
        }
        _ => String::new(),
    };
    println!(
        "{} entries, {} failed, {}",
        summary.total,
        summary.failures,
        span.dimmed()
    );
    println!("{}", log_path.dimmed());
}

pub fn run(command: LogsCommands) -> Result<()> {
    let log = open_log()?;

    match command {
        LogsCommands::List {
            command,
            failed,
            hours,
            limit,
            json,
        } => {
            let filter = LogFilter {
                command,
                failures_only: failed,
                since_ms: hours.map(cutoff_ms).transpose()?,
            };
            let entries = log.query(&filter, limit)?;

            if json {
                return output::json(&entries);
            }
            if entries.is_empty() {
                output::info("No matching log entries.");
                return Ok(());
            }
            print_entries(&entries);
        }
        LogsCommands::Stats { json } => {
            let summary = log.summary()?;
            let log_path = log.log_path().display().to_string();

            if json {
                return output::json(&serde_json::json!({
                    "summary": summary,
                    "log_path": log_path,
                }));
            }
            print_summary(&summary, &log_path);
        }
        LogsCommands::Prune { days, json } => {
            let cutoff = days
                .checked_mul(24)
                .ok_or_else(|| anyhow::anyhow!("Window of {} days is out of range", days))
                .and_then(cutoff_ms)?;
            let removed = log.delete_before(cutoff)?;

            if json {
                return output::json(&serde_json::json!({ "removed": removed }));
            }
            output::success(&format!("Removed {} entries older than {} days", removed, days));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cutoff_window() {
        let now = Utc::now().timestamp_millis();
        let cutoff = cutoff_ms(2).unwrap();
        let two_hours = 2 * 60 * 60 * 1000;
        assert!(cutoff <= now - two_hours);
        assert!(cutoff > now - two_hours - 60_000);

        assert!(cutoff_ms(-1).is_err());
        assert!(cutoff_ms(i64::MAX).is_err());
    }
}
