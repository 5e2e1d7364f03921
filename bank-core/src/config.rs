//! Configuration management
//!
//! Settings live in `settings.json` in the bank directory:
//! ```json
//! {
//!   "auth": {
//!     "tokenScheme": "paseto",
//!     "tokenSymmetricKey": "...32 characters...",
//!     "accessTokenDurationSecs": 900,
//!     "refreshTokenDurationSecs": 86400
//!   },
//!   "store": { "lockTimeoutMs": 5000 }
//! }
//! ```
//! Keys this crate doesn't know about are kept when saving.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration as StdDuration;

use anyhow::{anyhow, bail, Context, Result};
use chrono::Duration;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::token::{new_maker, TokenScheme, SYMMETRIC_KEY_SIZE};

const DEFAULT_ACCESS_TOKEN_DURATION_SECS: i64 = 15 * 60;
const DEFAULT_REFRESH_TOKEN_DURATION_SECS: i64 = 24 * 60 * 60;
const DEFAULT_LOCK_TIMEOUT_MS: u64 = 5_000;

/// Raw settings.json structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsFile {
    #[serde(default)]
    auth: AuthSettings,
    #[serde(default)]
    store: StoreSettings,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthSettings {
    #[serde(default)]
    token_scheme: TokenScheme,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    token_symmetric_key: Option<String>,
    #[serde(default = "default_access_secs")]
    access_token_duration_secs: i64,
    #[serde(default = "default_refresh_secs")]
    refresh_token_duration_secs: i64,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            token_scheme: TokenScheme::default(),
            token_symmetric_key: None,
            access_token_duration_secs: DEFAULT_ACCESS_TOKEN_DURATION_SECS,
            refresh_token_duration_secs: DEFAULT_REFRESH_TOKEN_DURATION_SECS,
            other: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoreSettings {
    #[serde(default = "default_lock_timeout_ms")]
    lock_timeout_ms: u64,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            lock_timeout_ms: DEFAULT_LOCK_TIMEOUT_MS,
            other: HashMap::new(),
        }
    }
}

fn default_access_secs() -> i64 {
    DEFAULT_ACCESS_TOKEN_DURATION_SECS
}

fn default_refresh_secs() -> i64 {
    DEFAULT_REFRESH_TOKEN_DURATION_SECS
}

fn default_lock_timeout_ms() -> u64 {
    DEFAULT_LOCK_TIMEOUT_MS
}

/// Bank configuration (resolved view of settings plus environment)
#[derive(Debug, Clone)]
pub struct Config {
    pub token_scheme: TokenScheme,
    pub token_symmetric_key: Option<String>,
    pub access_token_duration: Duration,
    pub refresh_token_duration: Duration,
    /// Longest a statement waits for an account row lock
    pub lock_timeout: StdDuration,
    // Keep the raw settings for preservation when saving
    _raw_settings: SettingsFile,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            token_scheme: TokenScheme::default(),
            token_symmetric_key: None,
            access_token_duration: Duration::seconds(DEFAULT_ACCESS_TOKEN_DURATION_SECS),
            refresh_token_duration: Duration::seconds(DEFAULT_REFRESH_TOKEN_DURATION_SECS),
            lock_timeout: StdDuration::from_millis(DEFAULT_LOCK_TIMEOUT_MS),
            _raw_settings: SettingsFile::default(),
        }
    }
}

impl Config {
    fn from_raw(raw: SettingsFile) -> Result<Self> {
        Ok(Self {
            token_scheme: raw.auth.token_scheme,
            token_symmetric_key: raw.auth.token_symmetric_key.clone(),
            access_token_duration: duration_secs(
                raw.auth.access_token_duration_secs,
                "accessTokenDurationSecs",
            )?,
            refresh_token_duration: duration_secs(
                raw.auth.refresh_token_duration_secs,
                "refreshTokenDurationSecs",
            )?,
            lock_timeout: StdDuration::from_millis(raw.store.lock_timeout_ms),
            _raw_settings: raw,
        })
    }

    /// Load config from the bank directory
    ///
    /// Environment variables override the file:
    /// `BANK_TOKEN_SCHEME`, `BANK_TOKEN_SYMMETRIC_KEY`,
    /// `BANK_ACCESS_TOKEN_DURATION_SECS`, `BANK_REFRESH_TOKEN_DURATION_SECS`.
    pub fn load(bank_dir: &Path) -> Result<Self> {
        Self::load_with_env(bank_dir, |name| std::env::var(name).ok())
    }

    /// Load config, reading overrides through `env`
    pub fn load_with_env(bank_dir: &Path, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let raw = read_settings(bank_dir)?;
        let mut config = Self::from_raw(raw)?;

        if let Some(scheme) = env("BANK_TOKEN_SCHEME") {
            config.token_scheme = scheme
                .parse()
                .map_err(|e: String| anyhow!(e))
                .context("Invalid BANK_TOKEN_SCHEME")?;
        }
        if let Some(key) = env("BANK_TOKEN_SYMMETRIC_KEY") {
            config.token_symmetric_key = Some(key);
        }
        if let Some(secs) = env("BANK_ACCESS_TOKEN_DURATION_SECS") {
            let secs: i64 = secs
                .trim()
                .parse()
                .context("Invalid BANK_ACCESS_TOKEN_DURATION_SECS")?;
            config.access_token_duration =
                duration_secs(secs, "BANK_ACCESS_TOKEN_DURATION_SECS")?;
        }
        if let Some(secs) = env("BANK_REFRESH_TOKEN_DURATION_SECS") {
            let secs: i64 = secs
                .trim()
                .parse()
                .context("Invalid BANK_REFRESH_TOKEN_DURATION_SECS")?;
            config.refresh_token_duration =
                duration_secs(secs, "BANK_REFRESH_TOKEN_DURATION_SECS")?;
        }

        Ok(config)
    }

    /// Save config to the bank directory
    /// Preserves other settings that this crate doesn't manage
    pub fn save(&self, bank_dir: &Path) -> Result<()> {
        let settings_path = bank_dir.join("settings.json");

        // Load existing settings to preserve fields we don't manage
        let mut settings = read_settings(bank_dir).unwrap_or_else(|_| self._raw_settings.clone());

        // Update only the fields we manage
        settings.auth.token_scheme = self.token_scheme;
        settings.auth.token_symmetric_key = self.token_symmetric_key.clone();
        settings.auth.access_token_duration_secs = self.access_token_duration.num_seconds();
        settings.auth.refresh_token_duration_secs = self.refresh_token_duration.num_seconds();
        settings.store.lock_timeout_ms = self.lock_timeout.as_millis() as u64;

        std::fs::create_dir_all(bank_dir)?;
        let content = serde_json::to_string_pretty(&settings)?;
        std::fs::write(&settings_path, content)
            .with_context(|| format!("Failed to write {}", settings_path.display()))?;
        Ok(())
    }

    /// The configured key, or an error telling the user how to set one
    pub fn symmetric_key(&self) -> Result<&str> {
        self.token_symmetric_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                anyhow!("No token key configured. Run `bank init` or set BANK_TOKEN_SYMMETRIC_KEY")
            })
    }

    /// Check that the settings can actually be used to issue credentials
    pub fn validate(&self) -> Result<()> {
        let key = self.symmetric_key()?;
        new_maker(self.token_scheme, key)
            .with_context(|| format!("Token key unusable with the {} scheme", self.token_scheme))?;

        if self.access_token_duration <= Duration::zero() {
            bail!("Access token duration must be positive");
        }
        if self.refresh_token_duration < self.access_token_duration {
            bail!("Refresh token duration must not be shorter than the access token duration");
        }
        Ok(())
    }
}

fn duration_secs(secs: i64, name: &str) -> Result<Duration> {
    Duration::try_seconds(secs).ok_or_else(|| anyhow!("{} is out of range: {}", name, secs))
}

fn read_settings(bank_dir: &Path) -> Result<SettingsFile> {
    let settings_path = bank_dir.join("settings.json");
    if !settings_path.exists() {
        return Ok(SettingsFile::default());
    }
    let content = std::fs::read_to_string(&settings_path)?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {}", settings_path.display()))
}

/// A random key that satisfies both token schemes
pub fn generate_symmetric_key() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SYMMETRIC_KEY_SIZE)
        .map(char::from)
        .collect()
}
