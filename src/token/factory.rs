//! Per-kind token minting.

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::principal::Principal;
use crate::token::model::{TokenKind, TokenModel};

/// Grants minting new pairs via the refresh operation.
pub const REFRESH_AUTHORITY: &str = "session:refresh";
/// Grants session termination via sign-out.
pub const SIGNOUT_AUTHORITY: &str = "session:signout";

/// Mints fresh tokens of one kind with a configured time-to-live.
///
/// Authority policy: access tokens freeze the principal's grants at issuance
/// (a role change takes effect only after re-authentication); refresh tokens
/// carry exactly the two session authorities and nothing a resource check
/// would ever accept.
#[derive(Clone)]
pub struct TokenFactory {
    kind: TokenKind,
    ttl: Duration,
}

impl TokenFactory {
    pub fn access(ttl_seconds: i64) -> Self {
        Self {
            kind: TokenKind::Access,
            ttl: Duration::seconds(ttl_seconds),
        }
    }

    pub fn refresh(ttl_seconds: i64) -> Self {
        Self {
            kind: TokenKind::Refresh,
            ttl: Duration::seconds(ttl_seconds),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn generate(&self, principal: &Principal) -> TokenModel {
        let now = now_truncated_to_seconds();
        let authorities = match self.kind {
            TokenKind::Access => principal.authorities.clone(),
            TokenKind::Refresh => [REFRESH_AUTHORITY, SIGNOUT_AUTHORITY]
                .into_iter()
                .map(String::from)
                .collect(),
        };

        TokenModel {
            kind: self.kind,
            id: Uuid::new_v4(),
            subject_id: principal.id,
            issued_at: now,
            expires_at: now + self.ttl,
            authorities,
        }
    }
}

/// The wire carries Unix seconds, so issuance drops sub-second precision
/// up front to keep round-trips lossless.
fn now_truncated_to_seconds() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp(now.timestamp(), 0).unwrap_or(now)
}
