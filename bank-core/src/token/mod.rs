//! Bearer credentials
//!
//! Two interchangeable schemes sit behind the [`Maker`] trait:
//!
//! - [`JwtMaker`]: HMAC-signed claims (compact JWS)
//! - [`PasetoMaker`]: XChaCha20-Poly1305 encrypted claims (`v2.local.`)
//!
//! The scheme is picked once at startup (see [`TokenScheme`]); callers only
//! ever see `dyn Maker`.

mod jwt;
mod paseto;
mod payload;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::Duration;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use jwt::{JwtMaker, MIN_SECRET_KEY_SIZE};
pub use paseto::{PasetoMaker, SYMMETRIC_KEY_SIZE};
pub use payload::Payload;

/// Token subsystem error
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("invalid key size: {0}")]
    InvalidKeySize(String),

    #[error("token is invalid")]
    InvalidToken,

    #[error("token has expired")]
    ExpiredToken,

    #[error("failed to create token: {0}")]
    Create(String),
}

/// Issues and verifies bearer credentials
///
/// Verification is pure and stateless, so one maker can be shared by any
/// number of concurrent tasks.
pub trait Maker: Send + Sync {
    /// Create a credential for `subject`, valid for `duration`
    fn create_token(&self, subject: &str, duration: Duration)
        -> Result<(String, Payload), TokenError>;

    /// Check a credential and return the payload it carries
    fn verify_token(&self, token: &str) -> Result<Payload, TokenError>;
}

/// Which credential scheme the process issues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenScheme {
    #[default]
    Paseto,
    Jwt,
}

impl TokenScheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenScheme::Paseto => "paseto",
            TokenScheme::Jwt => "jwt",
        }
    }
}

impl fmt::Display for TokenScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TokenScheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "paseto" => Ok(TokenScheme::Paseto),
            "jwt" => Ok(TokenScheme::Jwt),
            other => Err(format!("unknown token scheme: {}", other)),
        }
    }
}

/// Build the maker for `scheme`
pub fn new_maker(scheme: TokenScheme, key: &str) -> Result<Arc<dyn Maker>, TokenError> {
    let maker: Arc<dyn Maker> = match scheme {
        TokenScheme::Paseto => Arc::new(PasetoMaker::new(key.as_bytes())?),
        TokenScheme::Jwt => Arc::new(JwtMaker::new(key.as_bytes())?),
    };
    Ok(maker)
}
