//! Authentication handlers

use axum::{
    extract::{Extension, Json, Query},
    http::{header::SET_COOKIE, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Redirect, Response},
};
use std::sync::Arc;
use tracing::{error, info, warn};

use super::current_user::CurrentUser;
use super::google::GoogleError;
use super::models::{OAuthCallbackParams, NewLocalUser, Provider, SafeUser, SignInRequest, SignUpRequest};
use super::password::{hash_password, verify_password};
use super::reconcile::complete_external_login;
use super::session::{parse_cookie, Session, OAUTH_STATE_COOKIE};
use super::store::is_unique_violation;
use super::token::{create_token_set_cookie, delete_token_cookie};
use super::validators::{SignInValidator, SignUpValidator};
use crate::common::{
    generate_raw_id, normalize_email, safe_email_log, ApiError, AppState, Validator,
};

const FAILURE_ROUTE: &str = "/auth/google/failure";

fn append_cookie(response: &mut Response, cookie: String) {
    match HeaderValue::from_str(&cookie) {
        Ok(value) => {
            response.headers_mut().append(SET_COOKIE, value);
        }
        Err(e) => error!(error = %e, "Cookie is not a valid header value"),
    }
}

/// Runs a CPU-heavy closure off the async runtime
async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        error!(error = %e, "Blocking task failed");
        ApiError::InternalServer("internal task failed".to_string())
    })?
}

/// GET /signup/google
/// Redirects to Google's consent screen requesting `email` and `profile`
pub async fn google_signup_start(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Response, ApiError> {
    let google = state.google.as_deref().ok_or(GoogleError::NotConfigured)?;

    let oauth_state = generate_raw_id(32);
    let auth_url = google.authorization_url(&oauth_state);

    info!("Starting Google OAuth flow");
    let mut response = Redirect::to(&auth_url).into_response();
    append_cookie(&mut response, state.cookies.oauth_state_cookie(&oauth_state));
    Ok(response)
}

/// GET /signup/google/callback
/// Completes the OAuth flow and responds with the signed-in user. The
/// `oauth_state` cookie is single-use and is cleared on every outcome.
///
/// # Response
/// ```json
/// { "id": "U_K7NP3X", "email": "...", "firstName": "...", "provider": "google", ... }
/// ```
pub async fn google_signup_callback(
    Extension(state): Extension<Arc<AppState>>,
    session: Session,
    headers: HeaderMap,
    Query(params): Query<OAuthCallbackParams>,
) -> Response {
    let mut response = match finish_google_callback(&state, &session, &headers, params).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    };
    append_cookie(&mut response, state.cookies.clear_oauth_state_cookie());
    response
}

async fn finish_google_callback(
    state: &AppState,
    session: &Session,
    headers: &HeaderMap,
    params: OAuthCallbackParams,
) -> Result<Response, ApiError> {
    if let Some(oauth_error) = params.error.as_deref() {
        warn!(oauth_error = %oauth_error, "Google OAuth returned error");
        return Ok(Redirect::to(FAILURE_ROUTE).into_response());
    }

    let google = state.google.as_deref().ok_or(GoogleError::NotConfigured)?;

    let expected_state = parse_cookie(headers, OAUTH_STATE_COOKIE);
    match (params.state.as_deref(), expected_state.as_deref()) {
        (Some(received), Some(expected)) if received == expected => {}
        _ => {
            warn!(
                has_state = params.state.is_some(),
                has_cookie = expected_state.is_some(),
                "OAuth state mismatch on callback"
            );
            return Err(ApiError::BadRequest("OAuth state mismatch".to_string()));
        }
    }

    let code = params.code.as_deref().ok_or_else(|| {
        warn!("No authorization code in OAuth callback");
        ApiError::BadRequest("No authorization code provided".to_string())
    })?;

    let profile = google.authenticate(code).await?;
    let user = complete_external_login(
        &state.reconciler,
        &state.tokens,
        session,
        &profile,
        Provider::Google,
    )
    .await?;

    info!(
        user_id = %user.id,
        email = %safe_email_log(&user.email),
        provider = "google",
        "User authentication successful via Google OAuth"
    );

    Ok(Json(user).into_response())
}

/// GET /auth/google/success
pub async fn google_auth_success(CurrentUser(user): CurrentUser) -> &'static str {
    match user {
        Some(user) => {
            info!(user_id = %user.id, "Authentication Successful!");
            "Google Authentication Successful!"
        }
        None => "No user data found.",
    }
}

/// GET /auth/google/failure
pub async fn google_auth_failure() -> &'static str {
    warn!("Google Authentication Failed.");
    "Google Authentication Failed."
}

/// POST /signUp
/// Registers a local account and signs it in
///
/// # Request Body
/// ```json
/// {
///   "firstName": "Ada",
///   "lastName": "Lovelace",
///   "email": "ada@example.com",
///   "password": "Str0ng!pass",
///   "phoneNumber": "+4915112345678"
/// }
/// ```
pub async fn sign_up(
    Extension(state): Extension<Arc<AppState>>,
    session: Session,
    Json(payload): Json<SignUpRequest>,
) -> Result<(StatusCode, Json<SafeUser>), ApiError> {
    let validation = SignUpValidator.validate(&payload);
    if !validation.is_valid {
        return Err(validation.into());
    }

    let email = normalize_email(&payload.email);
    if state.users.select_user(&email).await?.is_some() {
        warn!(email = %safe_email_log(&email), "Sign up rejected: email in use");
        return Err(ApiError::field("email", "Email in use"));
    }

    let password = payload.password;
    let password_hash = blocking(move || hash_password(&password)).await?;

    let new_user = NewLocalUser {
        email,
        first_name: payload.first_name.trim().to_string(),
        last_name: payload.last_name.trim().to_string(),
        phone_number: payload.phone_number,
        password_hash,
    };

    let user = match state.users.insert_local_user(&new_user).await {
        Ok(user) => user,
        Err(e) if is_unique_violation(&e) => {
            return Err(ApiError::field("email", "Email in use"));
        }
        Err(e) => return Err(ApiError::DatabaseError(e)),
    };

    create_token_set_cookie(&state.tokens, &user, &session)?;

    info!(
        user_id = %user.id,
        email = %safe_email_log(&user.email),
        provider = "app",
        "New local account created"
    );
    Ok((StatusCode::CREATED, Json(user)))
}

/// POST /signIn
/// Signs in a local account with email and password
pub async fn sign_in(
    Extension(state): Extension<Arc<AppState>>,
    session: Session,
    Json(payload): Json<SignInRequest>,
) -> Result<Json<SafeUser>, ApiError> {
    let validation = SignInValidator.validate(&payload);
    if !validation.is_valid {
        return Err(validation.into());
    }

    let invalid = || ApiError::BadRequest("Invalid credentials".to_string());

    let email = normalize_email(&payload.email);
    let existing = match state.users.select_user(&email).await? {
        Some(user) => user,
        None => {
            warn!(email = %safe_email_log(&email), "Sign in failed: unknown email");
            return Err(invalid());
        }
    };

    if existing.provider != Provider::App {
        return Err(ApiError::field(
            "email",
            format!(
                "User with email {} is registered with {}, Please sign in with {}",
                existing.email, existing.provider, existing.provider
            ),
        ));
    }

    let stored_hash = existing.password_hash.clone().ok_or_else(invalid)?;
    let password = payload.password;
    let matches = blocking(move || verify_password(&password, &stored_hash)).await?;
    if !matches {
        warn!(email = %safe_email_log(&email), "Sign in failed: wrong password");
        return Err(invalid());
    }

    let user = state.users.update_login(&existing.email).await?;
    create_token_set_cookie(&state.tokens, &user, &session)?;

    info!(user_id = %user.id, email = %safe_email_log(&user.email), "User signed in");
    Ok(Json(user))
}

/// POST /signOut
pub async fn sign_out(session: Session) -> Json<serde_json::Value> {
    delete_token_cookie(&session);
    info!("User signed out");
    Json(serde_json::json!({ "message": "Signed out" }))
}

/// GET /currentUser
///
/// # Response
/// ```json
/// { "currentUser": { ... } | null }
/// ```
pub async fn current_user_handler(CurrentUser(user): CurrentUser) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "currentUser": user }))
}
