//! Claim set carried inside every credential

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::TokenError;

/// Identity claim plus validity window
///
/// Validity is recomputed from the payload's own fields on every check;
/// nothing is looked up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    /// Unique per issuance; login binds the refresh session to it
    pub id: Uuid,
    pub subject: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Payload {
    /// New payload for `subject`, valid for `duration` from now.
    ///
    /// A negative duration yields an already-expired payload. A duration that
    /// pushes the expiry past the representable range is an error.
    pub fn new(subject: impl Into<String>, duration: Duration) -> Result<Self, TokenError> {
        let now = Utc::now();
        let expires_at = now
            .checked_add_signed(duration)
            .ok_or_else(|| TokenError::Create("token duration out of range".to_string()))?;
        Ok(Self {
            id: Uuid::new_v4(),
            subject: subject.into(),
            issued_at: now,
            expires_at,
        })
    }

    pub fn valid(&self) -> Result<(), TokenError> {
        if Utc::now() > self.expires_at {
            return Err(TokenError::ExpiredToken);
        }
        Ok(())
    }
}
