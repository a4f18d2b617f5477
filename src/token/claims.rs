//! Wire claims carried by both token kinds.
//!
//! A fixed, strongly-typed claim set with strict decoding: input that does
//! not match this exact shape is rejected rather than partially accepted.

use std::collections::BTreeSet;

use chrono::DateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AuthError;
use crate::token::model::{TokenKind, TokenModel};

/// Claim payload: token id, subject, issue/expiry seconds, authority list.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct Claims {
    /// Token id (JWT ID)
    pub jti: String,
    /// Subject id
    pub sub: String,
    /// Issued at (Unix seconds)
    pub iat: i64,
    /// Expiration time (Unix seconds)
    pub exp: i64,
    pub authorities: Vec<String>,
}

impl Claims {
    pub fn from_model(token: &TokenModel) -> Self {
        Self {
            jti: token.id.to_string(),
            sub: token.subject_id.to_string(),
            iat: token.issued_at.timestamp(),
            exp: token.expires_at.timestamp(),
            authorities: token.authorities.iter().cloned().collect(),
        }
    }

    /// Rebuild the token value for a kind the codec has already verified.
    ///
    /// Claim-level invalidity (bad ids, exp not after iat) in a payload that
    /// passed the cryptographic check is `Unverifiable` -- it cannot be a
    /// token this core minted.
    pub fn into_model(self, kind: TokenKind) -> Result<TokenModel, AuthError> {
        let id = Uuid::parse_str(&self.jti).map_err(|_| AuthError::Unverifiable)?;
        let subject_id = Uuid::parse_str(&self.sub).map_err(|_| AuthError::Unverifiable)?;
        let issued_at =
            DateTime::from_timestamp(self.iat, 0).ok_or(AuthError::Unverifiable)?;
        let expires_at =
            DateTime::from_timestamp(self.exp, 0).ok_or(AuthError::Unverifiable)?;

        if expires_at <= issued_at {
            return Err(AuthError::Unverifiable);
        }

        Ok(TokenModel {
            kind,
            id,
            subject_id,
            issued_at,
            expires_at,
            authorities: BTreeSet::from_iter(self.authorities),
        })
    }
}
