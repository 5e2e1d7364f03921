//! Authenticated-encryption credentials (PASETO v2.local layout)

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chacha20poly1305::aead::{Aead, AeadCore, KeyInit, OsRng, Payload as AeadPayload};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use chrono::Duration;

use super::{Maker, Payload, TokenError};

/// XChaCha20-Poly1305 only takes 256-bit keys
pub const SYMMETRIC_KEY_SIZE: usize = 32;

const HEADER: &str = "v2.local.";
const NONCE_SIZE: usize = 24;
const TAG_SIZE: usize = 16;

/// Maker for encrypted tokens
///
/// Token layout: `v2.local.` followed by base64url(nonce || ciphertext). The
/// header, nonce and (empty) footer are bound into the AEAD tag through the
/// pre-authentication encoding.
pub struct PasetoMaker {
    cipher: XChaCha20Poly1305,
}

impl PasetoMaker {
    pub fn new(symmetric_key: impl AsRef<[u8]>) -> Result<Self, TokenError> {
        let symmetric_key = symmetric_key.as_ref();
        if symmetric_key.len() != SYMMETRIC_KEY_SIZE {
            return Err(TokenError::InvalidKeySize(format!(
                "must be exactly {} characters",
                SYMMETRIC_KEY_SIZE
            )));
        }
        Ok(Self {
            cipher: XChaCha20Poly1305::new(Key::from_slice(symmetric_key)),
        })
    }
}

/// PASETO pre-authentication encoding: little-endian 64-bit piece count,
/// then each piece prefixed with its little-endian 64-bit length.
fn pre_auth_encode(pieces: &[&[u8]]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&(pieces.len() as u64).to_le_bytes());
    for piece in pieces {
        out.extend_from_slice(&(piece.len() as u64).to_le_bytes());
        out.extend_from_slice(piece);
    }
    out
}

impl Maker for PasetoMaker {
    fn create_token(
        &self,
        subject: &str,
        duration: Duration,
    ) -> Result<(String, Payload), TokenError> {
        let payload = Payload::new(subject, duration)?;
        let message = serde_json::to_vec(&payload).map_err(|e| TokenError::Create(e.to_string()))?;

        let nonce = XChaCha20Poly1305::generate_nonce(&mut OsRng);
        let aad = pre_auth_encode(&[HEADER.as_bytes(), nonce.as_slice(), &b""[..]]);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, AeadPayload { msg: &message, aad: &aad })
            .map_err(|e| TokenError::Create(e.to_string()))?;

        let mut body = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        body.extend_from_slice(nonce.as_slice());
        body.extend_from_slice(&ciphertext);

        Ok((format!("{}{}", HEADER, URL_SAFE_NO_PAD.encode(body)), payload))
    }

    fn verify_token(&self, token: &str) -> Result<Payload, TokenError> {
        let encoded = token.strip_prefix(HEADER).ok_or(TokenError::InvalidToken)?;
        // Footers are never issued, so a trailing segment means tampering
        if encoded.contains('.') {
            return Err(TokenError::InvalidToken);
        }

        let body = URL_SAFE_NO_PAD
            .decode(encoded)
            .map_err(|_| TokenError::InvalidToken)?;
        if body.len() < NONCE_SIZE + TAG_SIZE {
            return Err(TokenError::InvalidToken);
        }

        let (nonce, ciphertext) = body.split_at(NONCE_SIZE);
        let aad = pre_auth_encode(&[HEADER.as_bytes(), nonce, &b""[..]]);
        let message = self
            .cipher
            .decrypt(XNonce::from_slice(nonce), AeadPayload { msg: ciphertext, aad: &aad })
            .map_err(|_| TokenError::InvalidToken)?;

        let payload: Payload =
            serde_json::from_slice(&message).map_err(|_| TokenError::InvalidToken)?;
        // Decrypting proves authenticity, not freshness
        payload.valid()?;

        Ok(payload)
    }
}
