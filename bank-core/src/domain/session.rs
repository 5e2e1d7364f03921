//! Login session domain model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// A login session, keyed by the id of its refresh credential's payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub username: String,
    /// SHA-256 hex of the refresh credential; the credential itself is not kept
    pub refresh_token_hash: String,
    pub user_agent: String,
    pub client_ip: String,
    pub is_blocked: bool,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Fingerprint stored in place of the refresh credential
    pub fn fingerprint(refresh_token: &str) -> String {
        hex::encode(Sha256::digest(refresh_token.as_bytes()))
    }

    pub fn matches_token(&self, refresh_token: &str) -> bool {
        self.refresh_token_hash == Self::fingerprint(refresh_token)
    }
}

#[derive(Debug, Clone)]
pub struct CreateSessionParams {
    pub id: Uuid,
    pub username: String,
    pub refresh_token: String,
    pub user_agent: String,
    pub client_ip: String,
    pub is_blocked: bool,
    pub expires_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_matches_only_same_token() {
        let session = Session {
            id: Uuid::new_v4(),
            username: "alice".to_string(),
            refresh_token_hash: Session::fingerprint("v2.local.abc"),
            user_agent: String::new(),
            client_ip: String::new(),
            is_blocked: false,
            expires_at: Utc::now(),
            created_at: Utc::now(),
        };
        assert_eq!(session.refresh_token_hash.len(), 64);
        assert!(session.matches_token("v2.local.abc"));
        assert!(!session.matches_token("v2.local.abd"));
    }
}
