//! The immutable token value: kind, identity, lifetime, and authority set.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

/// The two cryptographically distinct token kinds.
///
/// Access tokens are short-lived and integrity-protected; refresh tokens are
/// long-lived, confidentiality-protected, and tracked server-side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Access => write!(f, "access"),
            TokenKind::Refresh => write!(f, "refresh"),
        }
    }
}

/// A minted credential. Never mutated after issuance.
///
/// Timestamps are second-precision: the wire carries Unix seconds, so
/// factories truncate and round-trips stay lossless.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenModel {
    pub kind: TokenKind,
    pub id: Uuid,
    pub subject_id: Uuid,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub authorities: BTreeSet<String>,
}

impl TokenModel {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Remaining lifetime; negative once expired.
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        self.expires_at - now
    }

    pub fn has_authority(&self, authority: &str) -> bool {
        self.authorities.contains(authority)
    }
}
