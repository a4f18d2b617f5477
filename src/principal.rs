//! Principal values and the external collaborator contracts.
//!
//! The core never owns user records: the credential verifier maps a login
//! identifier plus secret to a principal, and the principal directory loads
//! and registers principals. Both are supplied by the host application;
//! the core treats `Principal` as opaque apart from `id` and `authorities`.

use std::collections::BTreeSet;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::AuthError;

/// An identity as produced by the directory/verifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub id: Uuid,
    pub login_identifier: String,
    pub credential_secret_hash: String,
    /// Role-derived grants, current as of the directory read.
    pub authorities: BTreeSet<String>,
}

/// Registration data for sign-up.
#[derive(Debug, Clone)]
pub struct NewPrincipal {
    pub login_identifier: String,
    pub secret: String,
}

/// Maps a login identifier + secret to a principal.
///
/// Hashing scheme and comparison are the host's concern; the core only sees
/// success or `AuthError::InvalidCredentials`.
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    async fn verify(&self, identifier: &str, secret: &str) -> Result<Principal, AuthError>;
}

/// Loads and registers principals.
#[async_trait]
pub trait PrincipalDirectory: Send + Sync {
    /// `Ok(None)` signals a directory miss, not a fault.
    async fn load_by_id(&self, subject_id: Uuid) -> Result<Option<Principal>, AuthError>;

    /// Creates the principal record; the side effect lives outside this core.
    async fn register(&self, registration: NewPrincipal) -> Result<Principal, AuthError>;
}
