//! Logging service - structured event log as JSON lines
//!
//! Provides a privacy-safe event log stored in logs.jsonl in the bank
//! directory. No ledger data (balances, amounts, credentials, passwords) is
//! ever logged; events carry only names, commands and error messages.
//!
//! Diagnostic output goes through `tracing`; this log is the durable record
//! that `bank logs` reads back.

use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Counter for generating unique IDs within the same millisecond
static ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Get current unix timestamp in milliseconds
fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Generate a unique ID based on timestamp + counter
fn generate_id() -> u64 {
    // Lower 16 bits for the counter, the rest for the timestamp
    let counter = ID_COUNTER.fetch_add(1, Ordering::Relaxed) & 0xFFFF;
    ((now_ms() as u64) << 16) | counter
}

fn detect_platform() -> &'static str {
    if cfg!(target_os = "macos") {
        "macos"
    } else if cfg!(target_os = "windows") {
        "windows"
    } else if cfg!(target_os = "linux") {
        "linux"
    } else {
        "unknown"
    }
}

/// Who is writing to the log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryPoint {
    Cli,
    /// Embedded use of the library
    Library,
}

impl EntryPoint {
    fn as_str(&self) -> &'static str {
        match self {
            EntryPoint::Cli => "cli",
            EntryPoint::Library => "library",
        }
    }
}

/// A log event to be recorded
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEvent {
    pub event: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    /// Failure class, e.g. `auth` or `transaction`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_details: Option<String>,
}

impl LogEvent {
    /// Create a new log event with just an event name
    pub fn new(event: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            command: None,
            category: None,
            error_message: None,
            error_details: None,
        }
    }

    /// Set the command context (for CLI events)
    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Set error information
    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    /// Set error details (source chain, additional context)
    pub fn with_error_details(mut self, details: impl Into<String>) -> Self {
        self.error_details = Some(details.into());
        self
    }
}

/// A log entry as stored in the file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: u64,
    pub timestamp: i64,
    pub entry_point: String,
    pub app_version: String,
    pub platform: String,
    pub event: String,
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub error_details: Option<String>,
}

impl LogEntry {
    pub fn is_failure(&self) -> bool {
        self.error_message.is_some()
    }
}

/// Which entries a query returns
#[derive(Debug, Clone, Default)]
pub struct LogFilter {
    /// Only entries for this command
    pub command: Option<String>,
    /// Only failed entries
    pub failures_only: bool,
    /// Only entries at or after this unix ms timestamp
    pub since_ms: Option<i64>,
}

impl LogFilter {
    fn matches(&self, entry: &LogEntry) -> bool {
        if self.failures_only && !entry.is_failure() {
            return false;
        }
        if let Some(command) = &self.command {
            if entry.command.as_deref() != Some(command.as_str()) {
                return false;
            }
        }
        if let Some(since) = self.since_ms {
            if entry.timestamp < since {
                return false;
            }
        }
        true
    }
}

/// Outcome counts for one command
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommandOutcomes {
    pub succeeded: u64,
    pub failed: u64,
}

/// Aggregate view of the whole log
#[derive(Debug, Clone, Default, Serialize)]
pub struct LogSummary {
    pub total: u64,
    pub failures: u64,
    pub by_command: BTreeMap<String, CommandOutcomes>,
    /// Failure count per category; uncategorized failures count as `other`
    pub failures_by_category: BTreeMap<String, u64>,
    pub first_timestamp: Option<i64>,
    pub last_timestamp: Option<i64>,
}

/// Service for structured event logging
pub struct LoggingService {
    /// Serializes appends and rewrites of the log file
    file_lock: Mutex<()>,
    log_path: PathBuf,
    entry_point: EntryPoint,
    app_version: String,
    platform: &'static str,
}

impl LoggingService {
    /// Create a new logging service writing to logs.jsonl in `bank_dir`
    pub fn new(
        bank_dir: &Path,
        entry_point: EntryPoint,
        app_version: impl Into<String>,
    ) -> Result<Self> {
        std::fs::create_dir_all(bank_dir)
            .with_context(|| format!("Failed to create {}", bank_dir.display()))?;

        Ok(Self {
            file_lock: Mutex::new(()),
            log_path: bank_dir.join("logs.jsonl"),
            entry_point,
            app_version: app_version.into(),
            platform: detect_platform(),
        })
    }

    /// Log an event
    ///
    /// The entry_point, app_version, and platform are added from the service
    /// configuration.
    pub fn log(&self, event: LogEvent) -> Result<()> {
        let _guard = self.file_lock.lock().map_err(|e| anyhow!("Lock poisoned: {}", e))?;

        let entry = LogEntry {
            id: generate_id(),
            timestamp: now_ms(),
            entry_point: self.entry_point.as_str().to_string(),
            app_version: self.app_version.clone(),
            platform: self.platform.to_string(),
            event: event.event,
            command: event.command,
            category: event.category,
            error_message: event.error_message,
            error_details: event.error_details,
        };

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)?;
        let mut line = serde_json::to_string(&entry)?;
        line.push('\n');
        file.write_all(line.as_bytes())?;

        Ok(())
    }

    /// Log a simple event with just a name
    pub fn log_event(&self, event: &str) -> Result<()> {
        self.log(LogEvent::new(event))
    }

    /// Log a successful CLI command
    pub fn log_command(&self, command: &str) -> Result<()> {
        self.log(LogEvent::new("command_executed").with_command(command))
    }

    /// Log a failed CLI command; `details` carries the full error chain
    pub fn log_failure(
        &self,
        command: &str,
        category: &str,
        message: &str,
        details: Option<&str>,
    ) -> Result<()> {
        let mut event = LogEvent::new("command_failed")
            .with_command(command)
            .with_category(category)
            .with_error(message);
        if let Some(d) = details {
            event = event.with_error_details(d);
        }
        self.log(event)
    }

    /// Every stored entry, oldest first. Unreadable lines are skipped.
    fn read_all(&self) -> Result<Vec<LogEntry>> {
        if !self.log_path.exists() {
            return Ok(Vec::new());
        }
        let file = std::fs::File::open(&self.log_path)?;
        let entries = BufReader::new(file)
            .lines()
            .map_while(|line| line.ok())
            .filter_map(|line| serde_json::from_str::<LogEntry>(&line).ok())
            .collect();
        Ok(entries)
    }

    /// Entries matching `filter`, newest first
    pub fn query(&self, filter: &LogFilter, limit: usize) -> Result<Vec<LogEntry>> {
        let _guard = self.file_lock.lock().map_err(|e| anyhow!("Lock poisoned: {}", e))?;
        let mut entries: Vec<LogEntry> = self
            .read_all()?
            .into_iter()
            .filter(|e| filter.matches(e))
            .collect();
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
        entries.truncate(limit);
        Ok(entries)
    }

    /// Most recent entries, newest first
    pub fn get_recent(&self, limit: usize) -> Result<Vec<LogEntry>> {
        self.query(&LogFilter::default(), limit)
    }

    /// Per-command outcomes and failure categories over the whole log
    pub fn summary(&self) -> Result<LogSummary> {
        let _guard = self.file_lock.lock().map_err(|e| anyhow!("Lock poisoned: {}", e))?;

        let mut summary = LogSummary::default();
        for entry in self.read_all()? {
            summary.total += 1;
            summary.first_timestamp = Some(
                summary
                    .first_timestamp
                    .map_or(entry.timestamp, |t| t.min(entry.timestamp)),
            );
            summary.last_timestamp = Some(
                summary
                    .last_timestamp
                    .map_or(entry.timestamp, |t| t.max(entry.timestamp)),
            );

            let outcomes = entry
                .command
                .as_ref()
                .map(|command| summary.by_command.entry(command.clone()).or_default());

            if entry.is_failure() {
                summary.failures += 1;
                if let Some(outcomes) = outcomes {
                    outcomes.failed += 1;
                }
                let category = entry.category.unwrap_or_else(|| "other".to_string());
                *summary.failures_by_category.entry(category).or_default() += 1;
            } else if let Some(outcomes) = outcomes {
                outcomes.succeeded += 1;
            }
        }
        Ok(summary)
    }

    /// Get the total number of log entries
    pub fn count(&self) -> Result<u64> {
        let _guard = self.file_lock.lock().map_err(|e| anyhow!("Lock poisoned: {}", e))?;
        Ok(self.read_all()?.len() as u64)
    }

    /// Delete logs older than the specified timestamp (unix ms)
    pub fn delete_before(&self, timestamp_ms: i64) -> Result<u64> {
        let _guard = self.file_lock.lock().map_err(|e| anyhow!("Lock poisoned: {}", e))?;

        let entries = self.read_all()?;
        let total = entries.len();
        let mut content = String::new();
        for entry in entries.iter().filter(|e| e.timestamp >= timestamp_ms) {
            content.push_str(&serde_json::to_string(entry)?);
            content.push('\n');
        }

        let tmp_path = self.log_path.with_extension("jsonl.tmp");
        std::fs::write(&tmp_path, content)?;
        std::fs::rename(&tmp_path, &self.log_path)?;

        let kept = entries.iter().filter(|e| e.timestamp >= timestamp_ms).count();
        Ok((total - kept) as u64)
    }

    /// Get the path to the log file
    pub fn log_path(&self) -> &Path {
        &self.log_path
    }
}
