//! Identity reconciliation for external (OAuth) sign-ins
//!
//! Providers are exclusive identity namespaces keyed by email. An external
//! profile either signs into an account created by the same provider, creates
//! a new account, or is rejected. Accounts are never linked across providers.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::models::{ExternalProfile, NewUserPayload, Provider, SafeUser, User};
use super::session::Session;
use super::store::{is_unique_violation, UserStore};
use super::token::{create_token_set_cookie, delete_token_cookie, TokenCodec};
use crate::common::{normalize_email, safe_email_log, ApiError};

/// Successful reconciliation outcome
#[derive(Debug, Clone, PartialEq)]
pub enum Reconciliation {
    /// A new account was created for the profile
    SignedUp(SafeUser),
    /// An existing account of the same provider was signed into
    SignedIn(SafeUser),
}

impl Reconciliation {
    pub fn user(&self) -> &SafeUser {
        match self {
            Reconciliation::SignedUp(user) | Reconciliation::SignedIn(user) => user,
        }
    }

    pub fn into_user(self) -> SafeUser {
        match self {
            Reconciliation::SignedUp(user) | Reconciliation::SignedIn(user) => user,
        }
    }
}

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("We could not retrieve your email address from the provided information. Please ensure you have granted the necessary permissions or use an account with a valid email.")]
    MissingEmail,

    #[error("User with email {email} already exists and cannot register with {provider}, Please sign in with email and password")]
    LocalAccountExists { email: String, provider: Provider },

    #[error("User with email {email} already exists and cannot register with {provider}, Please verify your email and sign in with email and password")]
    LocalAccountUnverified { email: String, provider: Provider },

    #[error("User with email {email} already exists and cannot register with {provider}, Please sign in with {existing}")]
    ProviderMismatch {
        email: String,
        provider: Provider,
        existing: Provider,
    },

    #[error("account store failure: {0}")]
    Store(#[from] sqlx::Error),

    #[error("reconciliation timed out after {0:?}")]
    TimedOut(Duration),
}

impl From<ReconcileError> for ApiError {
    fn from(e: ReconcileError) -> Self {
        match e {
            ReconcileError::Store(db) => ApiError::DatabaseError(db),
            ReconcileError::TimedOut(_) => {
                ApiError::ServiceUnavailable("account service did not respond in time".to_string())
            }
            rejection => ApiError::field("email", rejection.to_string()),
        }
    }
}

/// Maps external profiles onto local accounts
pub struct IdentityReconciler {
    store: Arc<dyn UserStore>,
    timeout: Duration,
}

impl IdentityReconciler {
    pub fn new(store: Arc<dyn UserStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// Classifies `profile` as signup, login or rejection and applies the
    /// resulting account mutation. The whole attempt is bounded by the
    /// configured timeout.
    pub async fn reconcile(
        &self,
        profile: &ExternalProfile,
        provider: Provider,
    ) -> Result<Reconciliation, ReconcileError> {
        let email = profile
            .email
            .as_deref()
            .map(normalize_email)
            .filter(|e| !e.is_empty())
            .ok_or(ReconcileError::MissingEmail)?;

        let payload = NewUserPayload {
            email,
            first_name: profile.given_name.clone(),
            last_name: profile.family_name.clone(),
            provider,
        };

        match tokio::time::timeout(self.timeout, self.apply(payload)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    provider = %provider,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Identity reconciliation timed out"
                );
                Err(ReconcileError::TimedOut(self.timeout))
            }
        }
    }

    async fn apply(&self, payload: NewUserPayload) -> Result<Reconciliation, ReconcileError> {
        if let Some(existing) = self.store.select_user(&payload.email).await? {
            return self.classify(payload, existing).await;
        }

        match self.store.insert_external_user(&payload).await {
            Ok(user) => {
                info!(
                    user_id = %user.id,
                    email = %safe_email_log(&user.email),
                    provider = %payload.provider,
                    "Created account from external profile"
                );
                Ok(Reconciliation::SignedUp(user))
            }
            Err(e) if is_unique_violation(&e) => {
                // A concurrent sign-in created the account after our lookup
                debug!(
                    email = %safe_email_log(&payload.email),
                    "Email claimed concurrently, reclassifying"
                );
                let existing = self.store.select_user(&payload.email).await?.ok_or(e)?;
                self.classify(payload, existing).await
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Applies the provider rules to an account that already owns the email
    async fn classify(
        &self,
        payload: NewUserPayload,
        existing: User,
    ) -> Result<Reconciliation, ReconcileError> {
        match existing.provider {
            Provider::App if existing.is_verified => Err(ReconcileError::LocalAccountExists {
                email: payload.email,
                provider: payload.provider,
            }),
            Provider::App => Err(ReconcileError::LocalAccountUnverified {
                email: payload.email,
                provider: payload.provider,
            }),
            same if same == payload.provider => {
                let user = self.store.update_login(&existing.email).await?;
                info!(
                    user_id = %user.id,
                    email = %safe_email_log(&user.email),
                    provider = %payload.provider,
                    "Signed in with external profile"
                );
                Ok(Reconciliation::SignedIn(user))
            }
            // Owned by a different external provider. With Google as the only
            // external provider this is reached only by an `app` caller.
            other => Err(ReconcileError::ProviderMismatch {
                email: payload.email,
                provider: payload.provider,
                existing: other,
            }),
        }
    }
}

/// Runs the full external sign-in: drops any current session token,
/// reconciles the profile and mints a token for the resulting user
pub async fn complete_external_login(
    reconciler: &IdentityReconciler,
    codec: &TokenCodec,
    session: &Session,
    profile: &ExternalProfile,
    provider: Provider,
) -> Result<SafeUser, ApiError> {
    delete_token_cookie(session);

    let outcome = match reconciler.reconcile(profile, provider).await {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!(error = %e, provider = %provider, "External sign-in rejected");
            return Err(e.into());
        }
    };

    create_token_set_cookie(codec, outcome.user(), session)?;
    Ok(outcome.into_user())
}
