//! Session token codec
//!
//! Tokens are HS256 JWTs embedding a [`SafeUser`] and an expiry. They travel
//! in the session cookie; the helpers at the bottom of this file move them in
//! and out of a request's [`Session`].

use chrono::Utc;
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use thiserror::Error;
use tracing::{debug, warn};

use super::models::{Claims, SafeUser};
use super::session::Session;
use crate::common::{safe_email_log, ApiError};

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token expired")]
    Expired,

    #[error("invalid token: {0}")]
    Invalid(String),

    /// Key or crypto backend failure; not caused by the token itself
    #[error("token processing failed: {0}")]
    Internal(String),
}

impl TokenError {
    /// True for failures a client can cause (expired, malformed, forged)
    pub fn is_expected(&self) -> bool {
        matches!(self, TokenError::Expired | TokenError::Invalid(_))
    }
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        match e.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::InvalidEcdsaKey
            | ErrorKind::InvalidRsaKey(_)
            | ErrorKind::InvalidKeyFormat
            | ErrorKind::Crypto(_) => TokenError::Internal(e.to_string()),
            _ => TokenError::Invalid(e.to_string()),
        }
    }
}

impl From<TokenError> for ApiError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::Expired => ApiError::Unauthorized("session expired".to_string()),
            TokenError::Invalid(_) => ApiError::Unauthorized("invalid session".to_string()),
            TokenError::Internal(msg) => ApiError::InternalServer(format!("token error: {}", msg)),
        }
    }
}

/// Signs and verifies session tokens with a shared secret
#[derive(Clone)]
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: chrono::Duration,
}

impl TokenCodec {
    pub fn new(secret: &str, ttl: chrono::Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl,
        }
    }

    pub fn ttl(&self) -> chrono::Duration {
        self.ttl
    }

    /// Mints a token for `user` valid for the configured window from now
    pub fn create_token(&self, user: &SafeUser) -> Result<String, TokenError> {
        let now = Utc::now();
        let expires_at = now
            .checked_add_signed(self.ttl)
            .ok_or_else(|| TokenError::Internal("token lifetime out of range".to_string()))?;
        let claims = Claims {
            user: user.clone(),
            iat: now.timestamp().max(0) as usize,
            exp: expires_at.timestamp().max(0) as usize,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding).map_err(|e| {
            TokenError::Internal(format!("signing failed: {}", e))
        })
    }

    /// Checks signature and expiry, returning the embedded user
    pub fn verify_token(&self, token: &str) -> Result<SafeUser, TokenError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation)?;
        Ok(data.claims.user)
    }

    /// Re-mints a still-valid token with a fresh expiry
    pub fn refresh_token(&self, token: &str) -> Result<String, TokenError> {
        let user = self.verify_token(token)?;
        self.create_token(&user)
    }
}

/// Mints a token for `user` and stores it in the session
pub fn create_token_set_cookie(
    codec: &TokenCodec,
    user: &SafeUser,
    session: &Session,
) -> Result<(), TokenError> {
    let token = codec.create_token(user)?;
    debug!(email = %safe_email_log(&user.email), "Session token issued");
    session.set_token(token);
    Ok(())
}

/// Removes the session token; safe to call when none is present
pub fn delete_token_cookie(session: &Session) {
    session.clear_token();
}

/// Slides the session window by replacing `token` with a re-minted one
pub fn refresh_token_and_set_cookie(
    codec: &TokenCodec,
    token: &str,
    session: &Session,
) -> Result<(), TokenError> {
    match codec.refresh_token(token) {
        Ok(fresh) => {
            session.set_token(fresh);
            Ok(())
        }
        Err(e) => {
            warn!(error = %e, "Session token refresh failed");
            Err(e)
        }
    }
}
