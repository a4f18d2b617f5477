//! The four user-facing session operations.
//!
//! Sign-up and sign-in both end in issuance: mint an access + refresh pair,
//! mirror the refresh token into the ledger, and hand back the serialized
//! strings with their expiries. Sign-out and refresh act on an
//! `AuthenticatedContext` produced by the authenticator from a refresh-kind
//! token; both consume the context, so the caller's authenticated state is
//! cleared by construction.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::authenticator::{AuthenticatedContext, Credential, CredentialAuthenticator};
use crate::configuration::TokenSettings;
use crate::error::AuthError;
use crate::ledger::{RevocationLedger, RevocationRecord};
use crate::principal::{CredentialVerifier, NewPrincipal, Principal, PrincipalDirectory};
use crate::token::{AccessTokenCodec, RefreshTokenCodec, TokenFactory, TokenKind, TokenModel};

/// A freshly-issued credential pair.
#[derive(Debug, Clone)]
pub struct TokensPair {
    pub access_token: String,
    pub refresh_token: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
}

pub struct SessionOrchestrator {
    directory: Arc<dyn PrincipalDirectory>,
    ledger: Arc<dyn RevocationLedger>,
    authenticator: CredentialAuthenticator,
    access_factory: TokenFactory,
    refresh_factory: TokenFactory,
    access_codec: AccessTokenCodec,
    refresh_codec: RefreshTokenCodec,
}

impl SessionOrchestrator {
    /// Wire the core from settings and the host's collaborators.
    pub fn new(
        settings: &TokenSettings,
        verifier: Arc<dyn CredentialVerifier>,
        directory: Arc<dyn PrincipalDirectory>,
        ledger: Arc<dyn RevocationLedger>,
    ) -> Result<Self, config::ConfigError> {
        let access_codec = AccessTokenCodec::new(settings.signing_key.as_bytes());
        let refresh_codec = RefreshTokenCodec::new(settings.encryption_key_bytes()?);

        let authenticator = CredentialAuthenticator::new(
            verifier,
            directory.clone(),
            ledger.clone(),
            access_codec.clone(),
            refresh_codec.clone(),
        );

        Ok(Self {
            directory,
            ledger,
            authenticator,
            access_factory: TokenFactory::access(settings.access_token_expiry),
            refresh_factory: TokenFactory::refresh(settings.refresh_token_expiry),
            access_codec,
            refresh_codec,
        })
    }

    /// The authenticator sharing this orchestrator's codecs and ledger;
    /// the transport layer calls it per request.
    pub fn authenticator(&self) -> &CredentialAuthenticator {
        &self.authenticator
    }

    /// Register a new principal through the directory, then issue its first
    /// pair.
    pub async fn sign_up(&self, registration: NewPrincipal) -> Result<TokensPair, AuthError> {
        let principal = self.directory.register(registration).await?;
        tracing::info!(subject_id = %principal.id, "Principal registered");
        self.issue_pair(&principal).await
    }

    /// Password authentication followed by issuance.
    pub async fn sign_in(&self, identifier: &str, secret: &str) -> Result<TokensPair, AuthError> {
        let ctx = self
            .authenticator
            .authenticate(Credential::Password {
                identifier: identifier.to_string(),
                secret: secret.to_string(),
            })
            .await?;
        self.issue_pair(&ctx.principal).await
    }

    /// Mint, track, and serialize a fresh access + refresh pair.
    pub async fn issue_pair(&self, principal: &Principal) -> Result<TokensPair, AuthError> {
        let access = self.access_factory.generate(principal);
        let refresh = self.refresh_factory.generate(principal);

        self.ledger
            .insert(RevocationRecord::for_token(&refresh))
            .await?;

        let pair = TokensPair {
            access_token: self.access_codec.serialize(&access)?,
            refresh_token: self.refresh_codec.serialize(&refresh)?,
            access_expires_at: access.expires_at,
            refresh_expires_at: refresh.expires_at,
        };

        tracing::info!(
            subject_id = %principal.id,
            refresh_token_id = %refresh.id,
            "Issued tokens pair"
        );
        Ok(pair)
    }

    /// End the current session, or with `globally` every session of the
    /// subject. Consumes the context. Replaying a single sign-out with an
    /// already-removed token observes `Revoked`.
    pub async fn sign_out(
        &self,
        ctx: AuthenticatedContext,
        globally: bool,
    ) -> Result<(), AuthError> {
        let token = refresh_context_token(&ctx)?;

        if globally {
            let removed = self
                .ledger
                .remove_all_for_subject(ctx.principal.id)
                .await?;
            tracing::info!(
                subject_id = %ctx.principal.id,
                removed,
                "Signed out everywhere"
            );
        } else {
            let removed = self.ledger.remove(token.id).await.unwrap_or_else(|e| {
                tracing::warn!(token_id = %token.id, error = %e, "Sign-out ledger delete failed");
                false
            });
            if !removed {
                return Err(AuthError::Revoked);
            }
            tracing::info!(subject_id = %ctx.principal.id, token_id = %token.id, "Signed out");
        }

        Ok(())
    }

    /// Single-use rotation: atomically consume the presented refresh token,
    /// then issue a brand-new pair for the same principal. The loser of a
    /// race on the same token observes `Revoked`, closing the replay window.
    pub async fn refresh_pair(&self, ctx: AuthenticatedContext) -> Result<TokensPair, AuthError> {
        let token = refresh_context_token(&ctx)?;

        let removed = self.ledger.remove(token.id).await.unwrap_or_else(|e| {
            tracing::warn!(token_id = %token.id, error = %e, "Rotation ledger delete failed");
            false
        });
        if !removed {
            tracing::info!(token_id = %token.id, "Refresh token already consumed");
            return Err(AuthError::Revoked);
        }

        self.issue_pair(&ctx.principal).await
    }
}

/// Sign-out and refresh only make sense for a context authenticated by a
/// refresh token; anything else is a wiring bug in the host, not a client
/// rejection.
fn refresh_context_token(ctx: &AuthenticatedContext) -> Result<&TokenModel, AuthError> {
    match &ctx.token {
        Some(token) if token.kind == TokenKind::Refresh => Ok(token),
        _ => Err(AuthError::Internal(
            "session operation requires a refresh-token authenticated context".to_string(),
        )),
    }
}
