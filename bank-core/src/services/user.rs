//! User service - registration, login and credential renewal

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::password::{check_password, hash_password};
use crate::domain::result::{Error, Result};
use crate::domain::{CreateSessionParams, CreateUserParams, UserView};
use crate::ports::LedgerStore;
use crate::token::Maker;

const MIN_PASSWORD_LENGTH: usize = 6;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub password: String,
    pub full_name: String,
    pub email: String,
}

#[derive(Debug, Clone, Default)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
    pub user_agent: String,
    pub client_ip: String,
}

/// Credentials handed out by a successful login
#[derive(Debug, Clone, Serialize)]
pub struct LoginResult {
    pub session_id: Uuid,
    pub access_token: String,
    pub access_token_expires_at: DateTime<Utc>,
    pub refresh_token: String,
    pub refresh_token_expires_at: DateTime<Utc>,
    pub user: UserView,
}

#[derive(Debug, Clone, Serialize)]
pub struct RenewAccessTokenResult {
    pub access_token: String,
    pub access_token_expires_at: DateTime<Utc>,
}

/// User service
pub struct UserService {
    store: Arc<dyn LedgerStore>,
    maker: Arc<dyn Maker>,
    access_token_duration: Duration,
    refresh_token_duration: Duration,
}

impl UserService {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        maker: Arc<dyn Maker>,
        access_token_duration: Duration,
        refresh_token_duration: Duration,
    ) -> Self {
        Self {
            store,
            maker,
            access_token_duration,
            refresh_token_duration,
        }
    }

    /// Register a user
    pub async fn create_user(&self, request: CreateUserRequest) -> Result<UserView> {
        validate_new_user(&request)?;

        let hashed_password = hash_password(&request.password)?;
        let user = self
            .store
            .create_user(CreateUserParams {
                username: request.username,
                hashed_password,
                full_name: request.full_name,
                email: request.email,
            })
            .await?;

        tracing::info!(username = %user.username, "user created");
        Ok(UserView::from(&user))
    }

    pub async fn get_user(&self, username: &str) -> Result<UserView> {
        let user = self.store.get_user(username).await?;
        Ok(UserView::from(&user))
    }

    /// Check a password and open a session
    ///
    /// Issues a short-lived access credential and a refresh credential. The
    /// session is keyed by the refresh credential's payload id and stores
    /// only a fingerprint of it.
    pub async fn login_user(&self, request: LoginRequest) -> Result<LoginResult> {
        let user = self.store.get_user(&request.username).await?;
        check_password(&request.password, &user.hashed_password).map_err(|e| {
            tracing::debug!(username = %request.username, "login rejected");
            e
        })?;

        let (access_token, access_payload) = self
            .maker
            .create_token(&user.username, self.access_token_duration)?;
        let (refresh_token, refresh_payload) = self
            .maker
            .create_token(&user.username, self.refresh_token_duration)?;

        let session = self
            .store
            .create_session(CreateSessionParams {
                id: refresh_payload.id,
                username: user.username.clone(),
                refresh_token: refresh_token.clone(),
                user_agent: request.user_agent,
                client_ip: request.client_ip,
                is_blocked: false,
                expires_at: refresh_payload.expires_at,
            })
            .await?;

        tracing::info!(username = %user.username, session_id = %session.id, "session opened");

        Ok(LoginResult {
            session_id: session.id,
            access_token,
            access_token_expires_at: access_payload.expires_at,
            refresh_token,
            refresh_token_expires_at: refresh_payload.expires_at,
            user: UserView::from(&user),
        })
    }

    /// Trade a refresh credential for a new access credential
    pub async fn renew_access_token(&self, refresh_token: &str) -> Result<RenewAccessTokenResult> {
        let refresh_payload = self.maker.verify_token(refresh_token)?;
        let session = self.store.get_session(refresh_payload.id).await?;

        if session.is_blocked {
            return Err(Error::unauthorized("blocked session"));
        }
        if session.username != refresh_payload.subject {
            return Err(Error::unauthorized("incorrect session user"));
        }
        if !session.matches_token(refresh_token) {
            return Err(Error::unauthorized("mismatched session token"));
        }
        if Utc::now() > session.expires_at {
            return Err(Error::unauthorized("expired session"));
        }

        let (access_token, access_payload) = self
            .maker
            .create_token(&refresh_payload.subject, self.access_token_duration)?;

        tracing::debug!(session_id = %session.id, "access credential renewed");
        Ok(RenewAccessTokenResult {
            access_token,
            access_token_expires_at: access_payload.expires_at,
        })
    }
}

fn validate_new_user(request: &CreateUserRequest) -> Result<()> {
    if request.username.is_empty() || !request.username.chars().all(|c| c.is_ascii_alphanumeric())
    {
        return Err(Error::validation("username must be alphanumeric"));
    }
    if request.password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(Error::validation(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }
    if request.full_name.trim().is_empty() {
        return Err(Error::validation("full name is required"));
    }
    if !request.email.contains('@') {
        return Err(Error::validation("email is not valid"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::MemoryStore;
    use crate::token::{PasetoMaker, TokenError};

    const KEY: &str = "abcdefghijklmnopqrstuvwxyz012345";

    fn service_with(store: Arc<MemoryStore>, refresh: Duration) -> UserService {
        UserService::new(
            store,
            Arc::new(PasetoMaker::new(KEY).unwrap()),
            Duration::minutes(15),
            refresh,
        )
    }

    fn alice() -> CreateUserRequest {
        CreateUserRequest {
            username: "alice".to_string(),
            password: "secret123".to_string(),
            full_name: "Alice Doe".to_string(),
            email: "alice@example.com".to_string(),
        }
    }

    fn login(username: &str, password: &str) -> LoginRequest {
        LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_user() {
        let store = Arc::new(MemoryStore::new());
        let service = service_with(store.clone(), Duration::hours(1));

        let view = service.create_user(alice()).await.unwrap();
        assert_eq!(view.username, "alice");

        let stored = store.get_user("alice").await.unwrap();
        assert_ne!(stored.hashed_password, "secret123");

        let duplicate = service.create_user(alice()).await;
        assert!(matches!(duplicate, Err(Error::UniqueViolation(_))));
    }

    #[tokio::test]
    async fn test_create_user_validation() {
        let service = service_with(Arc::new(MemoryStore::new()), Duration::hours(1));

        let mut bad = alice();
        bad.username = "alice!".to_string();
        assert!(matches!(service.create_user(bad).await, Err(Error::Validation(_))));

        let mut bad = alice();
        bad.password = "12345".to_string();
        assert!(matches!(service.create_user(bad).await, Err(Error::Validation(_))));

        let mut bad = alice();
        bad.email = "alice.example.com".to_string();
        assert!(matches!(service.create_user(bad).await, Err(Error::Validation(_))));
    }

    #[tokio::test]
    async fn test_login_and_renew() {
        let store = Arc::new(MemoryStore::new());
        let service = service_with(store.clone(), Duration::hours(1));
        service.create_user(alice()).await.unwrap();

        let result = service.login_user(login("alice", "secret123")).await.unwrap();
        assert_eq!(result.user.username, "alice");
        assert!(result.refresh_token_expires_at > result.access_token_expires_at);

        let session = store.get_session(result.session_id).await.unwrap();
        assert!(session.matches_token(&result.refresh_token));
        assert_ne!(session.refresh_token_hash, result.refresh_token);

        let renewed = service.renew_access_token(&result.refresh_token).await.unwrap();
        assert_ne!(renewed.access_token, result.access_token);
    }

    #[tokio::test]
    async fn test_login_failures() {
        let service = service_with(Arc::new(MemoryStore::new()), Duration::hours(1));
        service.create_user(alice()).await.unwrap();

        assert!(matches!(
            service.login_user(login("alice", "wrong-password")).await,
            Err(Error::InvalidCredentials)
        ));
        assert!(matches!(
            service.login_user(login("nobody", "secret123")).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_renew_rejects_unknown_and_expired_credentials() {
        let store = Arc::new(MemoryStore::new());
        let service = service_with(store.clone(), Duration::hours(1));
        service.create_user(alice()).await.unwrap();

        // Valid credential with no session behind it
        let maker = PasetoMaker::new(KEY).unwrap();
        let (orphan, _) = maker.create_token("alice", Duration::hours(1)).unwrap();
        assert!(matches!(
            service.renew_access_token(&orphan).await,
            Err(Error::NotFound(_))
        ));

        let expired_service = service_with(store, -Duration::minutes(1));
        let result = expired_service
            .login_user(login("alice", "secret123"))
            .await
            .unwrap();
        assert!(matches!(
            expired_service.renew_access_token(&result.refresh_token).await,
            Err(Error::Token(TokenError::ExpiredToken))
        ));
    }

    #[tokio::test]
    async fn test_renew_rejects_blocked_session() {
        let store = Arc::new(MemoryStore::new());
        let service = service_with(store.clone(), Duration::hours(1));
        service.create_user(alice()).await.unwrap();

        let maker = PasetoMaker::new(KEY).unwrap();
        let (token, payload) = maker.create_token("alice", Duration::hours(1)).unwrap();
        store
            .create_session(CreateSessionParams {
                id: payload.id,
                username: "alice".to_string(),
                refresh_token: token.clone(),
                user_agent: String::new(),
                client_ip: String::new(),
                is_blocked: true,
                expires_at: payload.expires_at,
            })
            .await
            .unwrap();

        assert!(matches!(
            service.renew_access_token(&token).await,
            Err(Error::Unauthorized(_))
        ));
    }
}
