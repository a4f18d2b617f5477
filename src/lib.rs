//! Token-based authentication and session-revocation core.
//!
//! Issues, verifies, and revokes the credentials of a banking API: a
//! short-lived signed access token for ordinary calls and a long-lived
//! encrypted refresh token, tracked server-side, that only renews or ends
//! sessions. The transport layer, user storage, and password hashing are
//! collaborators supplied by the host application.

pub mod authenticator;
pub mod configuration;
pub mod error;
pub mod ledger;
pub mod principal;
pub mod session;
pub mod telemetry;
pub mod token;

pub use authenticator::{AuthenticatedContext, Credential, CredentialAuthenticator};
pub use error::{AuthError, LedgerError};
pub use ledger::{InMemoryLedger, PgRevocationLedger, RevocationLedger, RevocationRecord};
pub use principal::{CredentialVerifier, NewPrincipal, Principal, PrincipalDirectory};
pub use session::{SessionOrchestrator, TokensPair};
pub use token::{
    AccessTokenCodec, RefreshTokenCodec, TokenFactory, TokenKind, TokenModel,
    REFRESH_AUTHORITY, SIGNOUT_AUTHORITY,
};
