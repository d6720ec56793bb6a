//! Authentication routes

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers;

/// Creates and returns the authentication router
///
/// # Routes
/// - `GET /signup/google` - Start Google OAuth flow
/// - `GET /signup/google/callback` - Google OAuth callback
/// - `GET /auth/google/success` - Diagnostic success page
/// - `GET /auth/google/failure` - Diagnostic failure page
/// - `POST /signUp` - Local registration
/// - `POST /signIn` - Local sign in
/// - `POST /signOut` - Clear the session
/// - `GET /currentUser` - Resolved session user
pub fn auth_routes() -> Router {
    Router::new()
        .route("/signup/google", get(handlers::google_signup_start))
        .route(
            "/signup/google/callback",
            get(handlers::google_signup_callback),
        )
        .route("/auth/google/success", get(handlers::google_auth_success))
        .route("/auth/google/failure", get(handlers::google_auth_failure))
        .route("/signUp", post(handlers::sign_up))
        .route("/signIn", post(handlers::sign_in))
        .route("/signOut", post(handlers::sign_out))
        .route("/currentUser", get(handlers::current_user_handler))
}
