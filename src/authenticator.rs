//! The provider chain turning raw credentials into authenticated contexts.
//!
//! Credentials are a tagged union, not a type hierarchy: one dispatch point
//! chooses the password or token path, and adding a credential kind means
//! adding a variant. The resulting `AuthenticatedContext` is an explicit
//! value the caller threads into sign-out/refresh -- nothing is stashed in
//! global or task-local state.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;

use crate::error::AuthError;
use crate::ledger::RevocationLedger;
use crate::principal::{CredentialVerifier, Principal, PrincipalDirectory};
use crate::token::{AccessTokenCodec, RefreshTokenCodec, TokenKind, TokenModel};

/// An unauthenticated credential as extracted from a request.
#[derive(Debug, Clone)]
pub enum Credential {
    Password { identifier: String, secret: String },
    Token(TokenModel),
}

/// A validated caller: the principal plus, on the token path, the exact
/// token that authenticated this call (sign-out and refresh read its id
/// back).
#[derive(Debug, Clone)]
pub struct AuthenticatedContext {
    pub principal: Principal,
    pub token: Option<TokenModel>,
    /// Effective grants for this call. On the token path these are the
    /// token's pinned authorities, not the directory's current ones.
    pub authorities: BTreeSet<String>,
}

impl AuthenticatedContext {
    pub fn has_authority(&self, authority: &str) -> bool {
        self.authorities.contains(authority)
    }
}

pub struct CredentialAuthenticator {
    verifier: Arc<dyn CredentialVerifier>,
    directory: Arc<dyn PrincipalDirectory>,
    ledger: Arc<dyn RevocationLedger>,
    access_codec: AccessTokenCodec,
    refresh_codec: RefreshTokenCodec,
}

impl CredentialAuthenticator {
    pub fn new(
        verifier: Arc<dyn CredentialVerifier>,
        directory: Arc<dyn PrincipalDirectory>,
        ledger: Arc<dyn RevocationLedger>,
        access_codec: AccessTokenCodec,
        refresh_codec: RefreshTokenCodec,
    ) -> Self {
        Self {
            verifier,
            directory,
            ledger,
            access_codec,
            refresh_codec,
        }
    }

    /// Decode an unprefixed bearer string by probing both codecs, then
    /// authenticate the result. Neither codec recognizing the string is
    /// `Malformed` (treated upstream as an absent credential).
    pub async fn authenticate_bearer(&self, raw: &str) -> Result<AuthenticatedContext, AuthError> {
        let token = self.decode_bearer(raw)?;
        self.authenticate(Credential::Token(token)).await
    }

    /// Single dispatch point of the provider chain.
    pub async fn authenticate(
        &self,
        credential: Credential,
    ) -> Result<AuthenticatedContext, AuthError> {
        match credential {
            Credential::Password { identifier, secret } => {
                self.authenticate_password(&identifier, &secret).await
            }
            Credential::Token(token) => self.authenticate_token(token).await,
        }
    }

    fn decode_bearer(&self, raw: &str) -> Result<TokenModel, AuthError> {
        if let Some(token) = self.access_codec.deserialize(raw)? {
            return Ok(token);
        }
        if let Some(token) = self.refresh_codec.deserialize(raw)? {
            return Ok(token);
        }
        Err(AuthError::Malformed)
    }

    async fn authenticate_password(
        &self,
        identifier: &str,
        secret: &str,
    ) -> Result<AuthenticatedContext, AuthError> {
        let principal = self.verifier.verify(identifier, secret).await?;
        let authorities = principal.authorities.clone();
        Ok(AuthenticatedContext {
            principal,
            token: None,
            authorities,
        })
    }

    async fn authenticate_token(
        &self,
        token: TokenModel,
    ) -> Result<AuthenticatedContext, AuthError> {
        let now = Utc::now();
        if token.is_expired(now) {
            tracing::info!(token_id = %token.id, kind = %token.kind, "Expired token presented");
            return Err(AuthError::Expired);
        }

        // Access tokens are deliberately not ledger-checked: a storage
        // round-trip on every authenticated request is traded for a short
        // access TTL. Refresh tokens must still be tracked to be live.
        if token.kind == TokenKind::Refresh {
            let live = match self.ledger.contains(token.id).await {
                Ok(live) => live,
                Err(e) => {
                    // Fail closed: a broken ledger must never authenticate.
                    tracing::warn!(
                        token_id = %token.id,
                        error = %e,
                        "Ledger check failed, treating refresh token as revoked"
                    );
                    false
                }
            };
            if !live {
                tracing::info!(token_id = %token.id, "Untracked refresh token rejected");
                return Err(AuthError::Revoked);
            }
        }

        let principal = self
            .directory
            .load_by_id(token.subject_id)
            .await?
            .ok_or_else(|| {
                // A verified token pointing at a missing subject means the
                // directory and issued tokens disagree.
                tracing::warn!(
                    subject_id = %token.subject_id,
                    token_id = %token.id,
                    "Verified token references unknown subject"
                );
                AuthError::SubjectNotFound(token.subject_id)
            })?;

        let authorities = token.authorities.clone();
        Ok(AuthenticatedContext {
            principal,
            token: Some(token),
            authorities,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LedgerError;
    use crate::ledger::{InMemoryLedger, RevocationRecord};
    use crate::principal::NewPrincipal;
    use crate::token::TokenFactory;
    use async_trait::async_trait;
    use chrono::{DateTime, Duration};
    use std::collections::HashMap;
    use std::sync::Mutex;
    use uuid::Uuid;

    const SIGNING_KEY: &[u8] = b"test-signing-secret-at-least-32-bytes";
    const ENCRYPTION_KEY: [u8; 32] = [42u8; 32];

    struct StubDirectory {
        principals: Mutex<HashMap<Uuid, Principal>>,
    }

    impl StubDirectory {
        fn with(principal: Principal) -> Self {
            Self {
                principals: Mutex::new(HashMap::from([(principal.id, principal)])),
            }
        }

        fn empty() -> Self {
            Self {
                principals: Mutex::new(HashMap::new()),
            }
        }
    }

    #[async_trait]
    impl PrincipalDirectory for StubDirectory {
        async fn load_by_id(&self, subject_id: Uuid) -> Result<Option<Principal>, AuthError> {
            Ok(self.principals.lock().unwrap().get(&subject_id).cloned())
        }

        async fn register(&self, registration: NewPrincipal) -> Result<Principal, AuthError> {
            let principal = Principal {
                id: Uuid::new_v4(),
                login_identifier: registration.login_identifier,
                credential_secret_hash: format!("$stub${}", registration.secret),
                authorities: BTreeSet::from(["cards:read".to_string()]),
            };
            self.principals
                .lock()
                .unwrap()
                .insert(principal.id, principal.clone());
            Ok(principal)
        }
    }

    struct StubVerifier {
        principal: Principal,
    }

    #[async_trait]
    impl CredentialVerifier for StubVerifier {
        async fn verify(&self, identifier: &str, secret: &str) -> Result<Principal, AuthError> {
            if identifier == self.principal.login_identifier && secret == "s3cret-pass" {
                Ok(self.principal.clone())
            } else {
                Err(AuthError::InvalidCredentials)
            }
        }
    }

    struct FailingLedger;

    #[async_trait]
    impl RevocationLedger for FailingLedger {
        async fn insert(&self, _: RevocationRecord) -> Result<(), LedgerError> {
            Err(LedgerError::Unexpected("store down".to_string()))
        }
        async fn contains(&self, _: Uuid) -> Result<bool, LedgerError> {
            Err(LedgerError::Unexpected("store down".to_string()))
        }
        async fn remove(&self, _: Uuid) -> Result<bool, LedgerError> {
            Err(LedgerError::Unexpected("store down".to_string()))
        }
        async fn remove_all_for_subject(&self, _: Uuid) -> Result<u64, LedgerError> {
            Err(LedgerError::Unexpected("store down".to_string()))
        }
        async fn purge_expired(&self, _: DateTime<Utc>) -> Result<u64, LedgerError> {
            Err(LedgerError::Unexpected("store down".to_string()))
        }
    }

    fn sample_principal() -> Principal {
        Principal {
            id: Uuid::new_v4(),
            login_identifier: "9990000000".to_string(),
            credential_secret_hash: "$stub$s3cret-pass".to_string(),
            authorities: BTreeSet::from(["cards:read".to_string()]),
        }
    }

    fn authenticator_with(
        principal: Principal,
        ledger: Arc<dyn RevocationLedger>,
    ) -> CredentialAuthenticator {
        CredentialAuthenticator::new(
            Arc::new(StubVerifier {
                principal: principal.clone(),
            }),
            Arc::new(StubDirectory::with(principal)),
            ledger,
            AccessTokenCodec::new(SIGNING_KEY),
            RefreshTokenCodec::new(ENCRYPTION_KEY),
        )
    }

    #[tokio::test]
    async fn password_path_yields_directory_authorities() {
        let principal = sample_principal();
        let authenticator =
            authenticator_with(principal.clone(), Arc::new(InMemoryLedger::new()));

        let ctx = authenticator
            .authenticate(Credential::Password {
                identifier: "9990000000".to_string(),
                secret: "s3cret-pass".to_string(),
            })
            .await
            .expect("valid password should authenticate");

        assert_eq!(ctx.principal, principal);
        assert!(ctx.token.is_none());
        assert!(ctx.has_authority("cards:read"));
    }

    #[tokio::test]
    async fn wrong_password_is_rejected() {
        let authenticator =
            authenticator_with(sample_principal(), Arc::new(InMemoryLedger::new()));

        let result = authenticator
            .authenticate(Credential::Password {
                identifier: "9990000000".to_string(),
                secret: "wrong".to_string(),
            })
            .await;

        assert!(matches!(result, Err(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn access_token_authenticates_without_ledger() {
        let principal = sample_principal();
        // A failing ledger proves the access path never consults it.
        let authenticator = authenticator_with(principal.clone(), Arc::new(FailingLedger));

        let token = TokenFactory::access(300).generate(&principal);
        let ctx = authenticator
            .authenticate(Credential::Token(token.clone()))
            .await
            .expect("access token should authenticate");

        assert_eq!(ctx.principal.id, principal.id);
        assert_eq!(ctx.token, Some(token));
    }

    #[tokio::test]
    async fn expired_token_is_rejected_before_any_other_check() {
        let principal = sample_principal();
        let authenticator = authenticator_with(principal.clone(), Arc::new(FailingLedger));

        let mut token = TokenFactory::refresh(3600).generate(&principal);
        token.issued_at = token.issued_at - Duration::hours(2);
        token.expires_at = token.expires_at - Duration::hours(2);

        let result = authenticator.authenticate(Credential::Token(token)).await;
        assert!(matches!(result, Err(AuthError::Expired)));
    }

    #[tokio::test]
    async fn untracked_refresh_token_is_revoked() {
        let principal = sample_principal();
        let authenticator =
            authenticator_with(principal.clone(), Arc::new(InMemoryLedger::new()));

        let token = TokenFactory::refresh(3600).generate(&principal);
        let result = authenticator.authenticate(Credential::Token(token)).await;

        assert!(matches!(result, Err(AuthError::Revoked)));
    }

    #[tokio::test]
    async fn tracked_refresh_token_authenticates_with_pinned_authorities() {
        let principal = sample_principal();
        let ledger = Arc::new(InMemoryLedger::new());
        let authenticator = authenticator_with(principal.clone(), ledger.clone());

        let token = TokenFactory::refresh(3600).generate(&principal);
        ledger
            .insert(RevocationRecord::for_token(&token))
            .await
            .unwrap();

        let ctx = authenticator
            .authenticate(Credential::Token(token))
            .await
            .expect("tracked refresh token should authenticate");

        assert!(ctx.has_authority(crate::token::REFRESH_AUTHORITY));
        assert!(ctx.has_authority(crate::token::SIGNOUT_AUTHORITY));
        // Directory grants do not leak into a refresh-token context.
        assert!(!ctx.has_authority("cards:read"));
    }

    #[tokio::test]
    async fn ledger_failure_fails_closed_as_revoked() {
        let principal = sample_principal();
        let authenticator = authenticator_with(principal.clone(), Arc::new(FailingLedger));

        let token = TokenFactory::refresh(3600).generate(&principal);
        let result = authenticator.authenticate(Credential::Token(token)).await;

        assert!(matches!(result, Err(AuthError::Revoked)));
    }

    #[tokio::test]
    async fn missing_subject_surfaces_as_authentication_failure() {
        let principal = sample_principal();
        let authenticator = CredentialAuthenticator::new(
            Arc::new(StubVerifier {
                principal: principal.clone(),
            }),
            Arc::new(StubDirectory::empty()),
            Arc::new(InMemoryLedger::new()),
            AccessTokenCodec::new(SIGNING_KEY),
            RefreshTokenCodec::new(ENCRYPTION_KEY),
        );

        let token = TokenFactory::access(300).generate(&principal);
        let result = authenticator.authenticate(Credential::Token(token)).await;

        assert!(matches!(result, Err(AuthError::SubjectNotFound(id)) if id == principal.id));
    }

    #[tokio::test]
    async fn authority_pinning_survives_directory_changes() {
        let principal = sample_principal();
        let directory = Arc::new(StubDirectory::with(principal.clone()));
        let authenticator = CredentialAuthenticator::new(
            Arc::new(StubVerifier {
                principal: principal.clone(),
            }),
            directory.clone(),
            Arc::new(InMemoryLedger::new()),
            AccessTokenCodec::new(SIGNING_KEY),
            RefreshTokenCodec::new(ENCRYPTION_KEY),
        );

        let token = TokenFactory::access(300).generate(&principal);

        // Promote the subject after issuance.
        {
            let mut principals = directory.principals.lock().unwrap();
            let entry = principals.get_mut(&principal.id).unwrap();
            entry.authorities.insert("admin:everything".to_string());
        }

        let ctx = authenticator
            .authenticate(Credential::Token(token))
            .await
            .unwrap();

        // The context carries issuance-time grants until re-authentication.
        assert!(!ctx.has_authority("admin:everything"));
        assert!(ctx.has_authority("cards:read"));
    }

    #[tokio::test]
    async fn bearer_probe_covers_both_kinds_and_rejects_garbage() {
        let principal = sample_principal();
        let ledger = Arc::new(InMemoryLedger::new());
        let authenticator = authenticator_with(principal.clone(), ledger.clone());

        let access_codec = AccessTokenCodec::new(SIGNING_KEY);
        let refresh_codec = RefreshTokenCodec::new(ENCRYPTION_KEY);

        let access = TokenFactory::access(300).generate(&principal);
        let refresh = TokenFactory::refresh(3600).generate(&principal);
        ledger
            .insert(RevocationRecord::for_token(&refresh))
            .await
            .unwrap();

        let ctx = authenticator
            .authenticate_bearer(&access_codec.serialize(&access).unwrap())
            .await
            .unwrap();
        assert_eq!(ctx.token.as_ref().map(|t| t.kind), Some(TokenKind::Access));

        let ctx = authenticator
            .authenticate_bearer(&refresh_codec.serialize(&refresh).unwrap())
            .await
            .unwrap();
        assert_eq!(ctx.token.as_ref().map(|t| t.kind), Some(TokenKind::Refresh));

        let result = authenticator.authenticate_bearer("not-a-token").await;
        assert!(matches!(result, Err(AuthError::Malformed)));
    }
}
