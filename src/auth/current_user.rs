//! Current-user resolution
//!
//! Every request is either anonymous or authenticated. A valid session token
//! authenticates the request and is re-minted so the session window slides.
//! Expired or forged tokens are dropped and the request continues anonymously.

use async_trait::async_trait;
use axum::{
    extract::{Extension, FromRequestParts, Request},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::{debug, error};

use super::models::SafeUser;
use super::session::Session;
use super::token::{delete_token_cookie, refresh_token_and_set_cookie, TokenCodec, TokenError};
use crate::common::{safe_token_log, ApiError, AppState};

/// Resolved identity for the request; `None` when anonymous
#[derive(Debug, Clone, Default)]
pub struct CurrentUser(pub Option<SafeUser>);

/// Resolves the session token into a user.
///
/// Expected token failures clear the token and yield `Ok(None)`. Anything
/// else is returned as an error after the token has been cleared.
pub fn resolve_current_user(
    codec: &TokenCodec,
    session: &Session,
) -> Result<Option<SafeUser>, TokenError> {
    let token = match session.token() {
        Some(token) => token,
        None => return Ok(None),
    };

    let resolved = codec.verify_token(&token).and_then(|user| {
        refresh_token_and_set_cookie(codec, &token, session)?;
        Ok(user)
    });

    match resolved {
        Ok(user) => Ok(Some(user)),
        Err(e) if e.is_expected() => {
            debug!(error = %e, token = %safe_token_log(&token), "Discarding session token");
            delete_token_cookie(session);
            Ok(None)
        }
        Err(e) => {
            delete_token_cookie(session);
            Err(e)
        }
    }
}

/// Attaches [`CurrentUser`] to every request
pub async fn current_user_middleware(
    Extension(state): Extension<Arc<AppState>>,
    session: Session,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    match resolve_current_user(&state.tokens, &session) {
        Ok(user) => {
            request.extensions_mut().insert(CurrentUser(user));
            Ok(next.run(request).await)
        }
        Err(e) => {
            error!(error = %e, "Failed to resolve current user");
            Err(e.into())
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or_else(|| ApiError::InternalServer("missing current user layer".to_string()))
    }
}

/// Extractor for routes that need an authenticated caller
#[derive(Debug, Clone)]
pub struct RequireUser(pub SafeUser);

#[async_trait]
impl<S> FromRequestParts<S> for RequireUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match CurrentUser::from_request_parts(parts, state).await? {
            CurrentUser(Some(user)) => Ok(RequireUser(user)),
            CurrentUser(None) => Err(ApiError::Unauthorized("Not authorized".to_string())),
        }
    }
}
