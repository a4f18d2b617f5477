//! Serialization codecs, one per token kind.
//!
//! Access tokens are integrity-only: an HS256-signed JWS whose claims are
//! readable by anyone but forgeable by no one without the signing key.
//! Refresh tokens mint new sessions and get defense in depth: the claim
//! payload is sealed with ChaCha20-Poly1305 and transported as
//! `base64url(nonce || ciphertext)`, unreadable without the key.
//!
//! Both `deserialize` methods share one probing contract: `Ok(None)` means
//! "structurally not this kind, try the other codec"; `Err(Unverifiable)`
//! means the shape was recognized but the signature or decryption check
//! failed. Foreign or garbage input never panics and never errors hard.
//! Expiry is deliberately not checked here -- that belongs to the
//! authenticator, which must distinguish `Expired` from crypto failures.

use base64::{engine::general_purpose, Engine as _};
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;

use crate::error::AuthError;
use crate::token::claims::Claims;
use crate::token::model::{TokenKind, TokenModel};

const NONCE_LEN: usize = 12;

/// Integrity-only codec for access tokens (HS256 JWS).
#[derive(Clone)]
pub struct AccessTokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl AccessTokenCodec {
    pub fn new(signing_key: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry enforcement lives in the authenticator, which needs to see
        // expired-but-authentic tokens to report `Expired` rather than a
        // crypto failure.
        validation.validate_exp = false;

        Self {
            encoding_key: EncodingKey::from_secret(signing_key),
            decoding_key: DecodingKey::from_secret(signing_key),
            validation,
        }
    }

    /// Sign a token into its transportable string.
    pub fn serialize(&self, token: &TokenModel) -> Result<String, AuthError> {
        debug_assert_eq!(token.kind, TokenKind::Access);

        let claims = Claims::from_model(token);
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Internal(format!("Access token signing failed: {}", e)))
    }

    /// Verify a bearer string as an access token.
    pub fn deserialize(&self, raw: &str) -> Result<Option<TokenModel>, AuthError> {
        match decode::<Claims>(raw, &self.decoding_key, &self.validation) {
            Ok(data) => data.claims.into_model(TokenKind::Access).map(Some),
            Err(e) => match e.kind() {
                ErrorKind::InvalidSignature
                | ErrorKind::InvalidAlgorithm
                | ErrorKind::InvalidAlgorithmName => Err(AuthError::Unverifiable),
                // Not JWS-shaped (or claims that never came from this core):
                // let the caller probe the other codec.
                _ => Ok(None),
            },
        }
    }
}

/// Confidentiality + integrity codec for refresh tokens
/// (ChaCha20-Poly1305 over the JSON claims).
#[derive(Clone)]
pub struct RefreshTokenCodec {
    key: [u8; 32],
}

impl RefreshTokenCodec {
    pub fn new(encryption_key: [u8; 32]) -> Self {
        Self {
            key: encryption_key,
        }
    }

    /// Seal a token into its transportable string with a fresh random nonce.
    pub fn serialize(&self, token: &TokenModel) -> Result<String, AuthError> {
        debug_assert_eq!(token.kind, TokenKind::Refresh);

        let claims = Claims::from_model(token);
        let plaintext = serde_json::to_vec(&claims)
            .map_err(|e| AuthError::Internal(format!("Refresh claims encoding failed: {}", e)))?;

        let cipher = ChaCha20Poly1305::new(Key::from_slice(&self.key));
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext.as_ref())
            .map_err(|_| AuthError::Internal("Refresh token encryption failed".to_string()))?;

        let mut payload = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        payload.extend_from_slice(&nonce_bytes);
        payload.extend_from_slice(&ciphertext);

        Ok(general_purpose::URL_SAFE_NO_PAD.encode(payload))
    }

    /// Open a bearer string as a refresh token.
    pub fn deserialize(&self, raw: &str) -> Result<Option<TokenModel>, AuthError> {
        // A JWS contains dots, which the base64url alphabet excludes, so the
        // two wire shapes are disjoint and this probe is cheap.
        let payload = match general_purpose::URL_SAFE_NO_PAD.decode(raw) {
            Ok(payload) => payload,
            Err(_) => return Ok(None),
        };
        if payload.len() <= NONCE_LEN {
            return Ok(None);
        }

        let (nonce_bytes, ciphertext) = payload.split_at(NONCE_LEN);
        let cipher = ChaCha20Poly1305::new(Key::from_slice(&self.key));
        let nonce = Nonce::from_slice(nonce_bytes);

        let plaintext = cipher
            .decrypt(nonce, ciphertext)
            .map_err(|_| AuthError::Unverifiable)?;

        let claims: Claims =
            serde_json::from_slice(&plaintext).map_err(|_| AuthError::Unverifiable)?;
        claims.into_model(TokenKind::Refresh).map(Some)
    }
}
