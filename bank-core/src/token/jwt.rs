//! Signed-claims credentials (compact JWS with HMAC)

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Duration;
use ring::hmac;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::{Maker, Payload, TokenError};

/// Shortest secret accepted for HMAC signing
pub const MIN_SECRET_KEY_SIZE: usize = 32;

const ISSUE_ALGORITHM: &str = "HS256";

#[derive(Debug, Serialize, Deserialize)]
struct Header {
    alg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    typ: Option<String>,
}

/// Maker for HMAC-signed tokens
///
/// Issues HS256. Verification accepts any member of the HMAC family and
/// nothing else, so `none` and asymmetric algorithms are rejected before the
/// signature is looked at.
pub struct JwtMaker {
    secret_key: Vec<u8>,
}

impl JwtMaker {
    pub fn new(secret_key: impl AsRef<[u8]>) -> Result<Self, TokenError> {
        let secret_key = secret_key.as_ref();
        if secret_key.len() < MIN_SECRET_KEY_SIZE {
            return Err(TokenError::InvalidKeySize(format!(
                "must be at least {} characters",
                MIN_SECRET_KEY_SIZE
            )));
        }
        Ok(Self {
            secret_key: secret_key.to_vec(),
        })
    }

    fn key(&self, algorithm: hmac::Algorithm) -> hmac::Key {
        hmac::Key::new(algorithm, &self.secret_key)
    }
}

/// Map a JWS `alg` value to an HMAC algorithm, if it is one
fn hmac_algorithm(alg: &str) -> Option<hmac::Algorithm> {
    match alg {
        "HS256" => Some(hmac::HMAC_SHA256),
        "HS384" => Some(hmac::HMAC_SHA384),
        "HS512" => Some(hmac::HMAC_SHA512),
        _ => None,
    }
}

fn encode_segment<T: Serialize>(value: &T) -> Result<String, TokenError> {
    let json = serde_json::to_vec(value).map_err(|e| TokenError::Create(e.to_string()))?;
    Ok(URL_SAFE_NO_PAD.encode(json))
}

fn decode_segment<T: DeserializeOwned>(segment: &str) -> Result<T, TokenError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| TokenError::InvalidToken)?;
    serde_json::from_slice(&bytes).map_err(|_| TokenError::InvalidToken)
}

impl Maker for JwtMaker {
    fn create_token(
        &self,
        subject: &str,
        duration: Duration,
    ) -> Result<(String, Payload), TokenError> {
        let payload = Payload::new(subject, duration)?;
        let header = Header {
            alg: ISSUE_ALGORITHM.to_string(),
            typ: Some("JWT".to_string()),
        };

        let signing_input = format!("{}.{}", encode_segment(&header)?, encode_segment(&payload)?);
        let tag = hmac::sign(&self.key(hmac::HMAC_SHA256), signing_input.as_bytes());
        let token = format!("{}.{}", signing_input, URL_SAFE_NO_PAD.encode(tag.as_ref()));

        Ok((token, payload))
    }

    fn verify_token(&self, token: &str) -> Result<Payload, TokenError> {
        let mut parts = token.split('.');
        let (header_b64, claims_b64, signature_b64) =
            match (parts.next(), parts.next(), parts.next(), parts.next()) {
                (Some(h), Some(c), Some(s), None) => (h, c, s),
                _ => return Err(TokenError::InvalidToken),
            };

        let header: Header = decode_segment(header_b64)?;
        let algorithm = hmac_algorithm(&header.alg).ok_or_else(|| {
            tracing::debug!(alg = %header.alg, "rejecting token signed with disallowed algorithm");
            TokenError::InvalidToken
        })?;

        let signature = URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(|_| TokenError::InvalidToken)?;
        let signing_input = &token[..header_b64.len() + 1 + claims_b64.len()];
        hmac::verify(&self.key(algorithm), signing_input.as_bytes(), &signature)
            .map_err(|_| TokenError::InvalidToken)?;

        let payload: Payload = decode_segment(claims_b64)?;
        payload.valid()?;

        Ok(payload)
    }
}
