//! Integration tests for bank-core services
//!
//! These drive a full BankContext (settings, snapshot file, directory lock,
//! credential maker) the way the CLI does.
//!
//! Run with: cargo test --test integration_tests -- --nocapture

use chrono::Duration;
use tempfile::TempDir;

use bank_core::config::{generate_symmetric_key, Config};
use bank_core::services::{CreateUserRequest, LoginRequest, TransferRequest};
use bank_core::token::{new_maker, Maker, TokenError};
use bank_core::{BankContext, Error, TokenScheme};

// ============================================================================
// Test Helpers
// ============================================================================

fn test_config(scheme: TokenScheme) -> Config {
    let mut config = Config::default();
    config.token_scheme = scheme;
    config.token_symmetric_key = Some(generate_symmetric_key());
    config
}

fn open(temp_dir: &TempDir, config: Config) -> BankContext {
    BankContext::with_config(temp_dir.path(), config).expect("Failed to open bank")
}

async fn register(ctx: &BankContext, username: &str) -> String {
    ctx.user_service
        .create_user(CreateUserRequest {
            username: username.to_string(),
            password: "secret123".to_string(),
            full_name: format!("{} Test", username),
            email: format!("{}@example.com", username),
        })
        .await
        .unwrap();

    let login = ctx
        .user_service
        .login_user(LoginRequest {
            username: username.to_string(),
            password: "secret123".to_string(),
            user_agent: "integration-test".to_string(),
            client_ip: "127.0.0.1".to_string(),
        })
        .await
        .unwrap();
    format!("Bearer {}", login.access_token)
}

// ============================================================================
// Credential schemes
// ============================================================================

/// Replace one base64url character with a different valid one
fn flip_char(token: &str, index: usize) -> String {
    let mut chars: Vec<char> = token.chars().collect();
    chars[index] = if chars[index] == 'A' { 'B' } else { 'A' };
    chars.into_iter().collect()
}

/// Character positions whose change must be caught by the MAC or AEAD tag,
/// not just by base64 decoding: the middle of the signed claims (JWT) or of
/// the ciphertext (PASETO), plus the last character.
fn tamper_positions(scheme: TokenScheme, token: &str) -> Vec<usize> {
    let middle = match scheme {
        TokenScheme::Jwt => {
            let first_dot = token.find('.').unwrap();
            let second_dot = token.rfind('.').unwrap();
            (first_dot + 1 + second_dot) / 2
        }
        TokenScheme::Paseto => {
            let body_start = "v2.local.".len();
            // 24-byte nonce is 32 characters; the 16-byte tag is the last 22
            let ciphertext_start = body_start + 32;
            let ciphertext_end = token.len() - 22;
            assert!(ciphertext_end > ciphertext_start);
            (ciphertext_start + ciphertext_end) / 2
        }
    };
    vec![middle, token.len() - 1]
}

/// Callers only ever see `dyn Maker`; both schemes must behave the same
/// through it.
#[test]
fn test_makers_are_interchangeable() {
    let key = generate_symmetric_key();
    let makers: Vec<(TokenScheme, std::sync::Arc<dyn Maker>)> = vec![
        (TokenScheme::Jwt, new_maker(TokenScheme::Jwt, &key).unwrap()),
        (TokenScheme::Paseto, new_maker(TokenScheme::Paseto, &key).unwrap()),
    ];

    for (scheme, maker) in &makers {
        let (token, payload) = maker.create_token("alice", Duration::minutes(1)).unwrap();
        assert_eq!(maker.verify_token(&token).unwrap(), payload, "{}", scheme);

        let (expired, _) = maker.create_token("alice", -Duration::minutes(1)).unwrap();
        assert_eq!(maker.verify_token(&expired), Err(TokenError::ExpiredToken), "{}", scheme);

        for index in tamper_positions(*scheme, &token) {
            let tampered = flip_char(&token, index);
            assert_ne!(tampered, token);
            assert_eq!(
                maker.verify_token(&tampered),
                Err(TokenError::InvalidToken),
                "{} tampered at {}",
                scheme,
                index
            );
        }

        let overflow = maker.create_token("alice", Duration::days(365 * 400_000));
        assert!(matches!(overflow, Err(TokenError::Create(_))), "{}", scheme);
    }

    // A credential from one scheme means nothing to the other
    let (jwt, _) = makers[0].1.create_token("alice", Duration::minutes(1)).unwrap();
    assert_eq!(makers[1].1.verify_token(&jwt), Err(TokenError::InvalidToken));
}

// ============================================================================
// Login, ownership and transfers
// ============================================================================

#[tokio::test]
async fn test_login_authorize_and_transfer() {
    for scheme in [TokenScheme::Paseto, TokenScheme::Jwt] {
        let temp_dir = TempDir::new().unwrap();
        let ctx = open(&temp_dir, test_config(scheme));

        let alice_header = register(&ctx, "alice").await;
        let bob_header = register(&ctx, "bob").await;

        let alice = ctx.authorize(Some(&alice_header)).unwrap().subject;
        let bob = ctx.authorize(Some(&bob_header)).unwrap().subject;
        assert_eq!(alice, "alice");
        assert_eq!(bob, "bob");

        let alice_usd = ctx.account_service.create_account(&alice, "usd").await.unwrap();
        let bob_usd = ctx.account_service.create_account(&bob, "USD").await.unwrap();
        let bob_eur = ctx.account_service.create_account(&bob, "EUR").await.unwrap();

        // bob cannot move alice's money or read her account
        let stolen = ctx
            .transfer_service
            .create_transfer(
                &bob,
                TransferRequest {
                    from_account_id: alice_usd.id,
                    to_account_id: bob_usd.id,
                    amount: 100,
                    currency: "USD".to_string(),
                },
            )
            .await;
        assert!(matches!(stolen, Err(Error::Unauthorized(_))));
        assert!(matches!(
            ctx.account_service.get_account(&bob, alice_usd.id).await,
            Err(Error::Unauthorized(_))
        ));

        let mismatch = ctx
            .transfer_service
            .create_transfer(
                &alice,
                TransferRequest {
                    from_account_id: alice_usd.id,
                    to_account_id: bob_eur.id,
                    amount: 100,
                    currency: "USD".to_string(),
                },
            )
            .await;
        assert!(matches!(mismatch, Err(Error::CurrencyMismatch { .. })));

        let result = ctx
            .transfer_service
            .create_transfer(
                &alice,
                TransferRequest {
                    from_account_id: alice_usd.id,
                    to_account_id: bob_usd.id,
                    amount: 250,
                    currency: "USD".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(result.from_account.balance, -250);
        assert_eq!(result.to_account.balance, 250);

        let bob_entries = ctx.account_service.list_entries(&bob, bob_usd.id).await.unwrap();
        assert_eq!(bob_entries.len(), 1);
        assert_eq!(bob_entries[0].amount, 250);
    }
}

#[tokio::test]
async fn test_refresh_flow() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = open(&temp_dir, test_config(TokenScheme::Paseto));
    register(&ctx, "alice").await;

    let login = ctx
        .user_service
        .login_user(LoginRequest {
            username: "alice".to_string(),
            password: "secret123".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();

    // The refresh credential is a valid bearer token too, but renewal is the
    // only place a session is consulted
    let renewed = ctx
        .user_service
        .renew_access_token(&login.refresh_token)
        .await
        .unwrap();
    let header = format!("bearer {}", renewed.access_token);
    assert_eq!(ctx.authorize(Some(&header)).unwrap().subject, "alice");

    // An access credential has no session behind it
    let err = ctx
        .user_service
        .renew_access_token(&login.access_token)
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

// ============================================================================
// Persistence and directory lock
// ============================================================================

#[tokio::test]
async fn test_ledger_survives_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let config = test_config(TokenScheme::Jwt);
    config.save(temp_dir.path()).unwrap();

    let (alice_header, account_id) = {
        let ctx = BankContext::new(temp_dir.path()).unwrap();
        let header = register(&ctx, "alice").await;
        let account = ctx.account_service.create_account("alice", "KES").await.unwrap();
        ctx.save().await.unwrap();
        (header, account.id)
    };

    // Same key from settings.json, so earlier credentials still verify
    let ctx = BankContext::new(temp_dir.path()).unwrap();
    let subject = ctx.authorize(Some(&alice_header)).unwrap().subject;
    let account = ctx.account_service.get_account(&subject, account_id).await.unwrap();
    assert_eq!(account.currency, "KES");
    assert_eq!(account.balance, 0);
}

#[test]
fn test_bank_dir_is_exclusive() {
    let temp_dir = TempDir::new().unwrap();
    let config = test_config(TokenScheme::Paseto);

    let first = open(&temp_dir, config.clone());
    assert!(BankContext::with_config(temp_dir.path(), config.clone()).is_err());

    drop(first);
    assert!(BankContext::with_config(temp_dir.path(), config).is_ok());
}

#[test]
fn test_context_requires_usable_key() {
    let temp_dir = TempDir::new().unwrap();

    assert!(BankContext::with_config(temp_dir.path(), Config::default()).is_err());

    let mut config = Config::default();
    config.token_symmetric_key = Some("too-short".to_string());
    assert!(BankContext::with_config(temp_dir.path(), config).is_err());
}
