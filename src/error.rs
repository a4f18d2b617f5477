//! Error types for the authentication core.
//!
//! Two families: `AuthError` is the credential-rejection taxonomy that every
//! authentication or session operation surfaces, and `LedgerError` wraps
//! faults from the revocation store. All rejection kinds collapse into one
//! generic client-facing message; the variants exist for logging and tests,
//! not for differentiated responses (no oracle about which check failed).

use std::error::Error as StdError;
use std::fmt;

use uuid::Uuid;

/// Revocation-ledger store errors
#[derive(Debug)]
pub enum LedgerError {
    QueryExecution(String),
    ConnectionPool(String),
    Unexpected(String),
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerError::QueryExecution(msg) => write!(f, "Ledger query error: {}", msg),
            LedgerError::ConnectionPool(msg) => write!(f, "Ledger connection error: {}", msg),
            LedgerError::Unexpected(msg) => write!(f, "Ledger error: {}", msg),
        }
    }
}

impl StdError for LedgerError {}

impl From<sqlx::Error> for LedgerError {
    fn from(err: sqlx::Error) -> Self {
        let error_msg = err.to_string();

        if error_msg.contains("pool") || error_msg.contains("connect") {
            LedgerError::ConnectionPool(error_msg)
        } else {
            LedgerError::QueryExecution(error_msg)
        }
    }
}

/// Authentication and session-operation errors
///
/// The first five variants are the rejection taxonomy; `InvalidCredentials`
/// is the password-path rejection; `Internal` covers issuance-side faults
/// (serialization, ledger writes) that are not credential rejections.
#[derive(Debug)]
pub enum AuthError {
    /// The bearer string matches neither token codec. Treated as an absent
    /// credential rather than a hard failure.
    Malformed,
    /// Recognized token shape, failed signature or decryption check.
    Unverifiable,
    /// Structurally valid token past its expiry.
    Expired,
    /// Cryptographically valid refresh token absent from the ledger.
    Revoked,
    /// Verified token whose subject no longer exists in the directory.
    SubjectNotFound(Uuid),
    /// Identifier/secret pair rejected by the credential verifier.
    InvalidCredentials,
    Internal(String),
}

impl AuthError {
    /// Whether this is a credential rejection (as opposed to an internal
    /// fault the caller should map to a server error).
    pub fn is_rejection(&self) -> bool {
        !matches!(self, AuthError::Internal(_))
    }

    /// The single client-facing message shared by every rejection kind.
    pub fn public_message(&self) -> &'static str {
        match self {
            AuthError::Internal(_) => "internal error",
            _ => "authentication required or invalid",
        }
    }
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::Malformed => write!(f, "Credential matches no known token format"),
            AuthError::Unverifiable => write!(f, "Token failed cryptographic verification"),
            AuthError::Expired => write!(f, "Token has expired"),
            AuthError::Revoked => write!(f, "Refresh token is no longer tracked"),
            AuthError::SubjectNotFound(id) => {
                write!(f, "Token subject {} not found in directory", id)
            }
            AuthError::InvalidCredentials => write!(f, "Invalid credentials"),
            AuthError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl StdError for AuthError {}

impl From<LedgerError> for AuthError {
    fn from(err: LedgerError) -> Self {
        AuthError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejections_share_one_public_message() {
        let rejections = [
            AuthError::Malformed,
            AuthError::Unverifiable,
            AuthError::Expired,
            AuthError::Revoked,
            AuthError::SubjectNotFound(Uuid::new_v4()),
            AuthError::InvalidCredentials,
        ];

        for err in &rejections {
            assert!(err.is_rejection());
            assert_eq!(err.public_message(), "authentication required or invalid");
        }
    }

    #[test]
    fn internal_is_not_a_rejection() {
        let err = AuthError::Internal("boom".to_string());
        assert!(!err.is_rejection());
        assert_ne!(err.public_message(), "authentication required or invalid");
    }

    #[test]
    fn ledger_error_classifies_connection_failures() {
        let err = LedgerError::from(sqlx::Error::PoolTimedOut);
        assert!(matches!(err, LedgerError::ConnectionPool(_)));
    }
}
