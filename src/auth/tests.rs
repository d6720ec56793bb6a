//! Tests for auth module
//!
//! These drive the assembled router end to end:
//! - Local sign-up, sign-in and sign-out
//! - Session cookie refresh and expiry handling
//! - Google OAuth entry points

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        http::{
            header::{CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE},
            Request, StatusCode,
        },
        response::Response,
        Router,
    };
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    use crate::auth::models::{Provider, SafeUser};
    use crate::auth::store::tests::setup_test_db;
    use crate::auth::store::SqliteUserStore;
    use crate::auth::token::TokenCodec;
    use crate::build_router;
    use crate::common::config::{AppConfig, GoogleOAuthConfig};
    use crate::common::AppState;

    const SECRET: &str = "router_test_secret";

    fn config(with_google: bool) -> AppConfig {
        AppConfig {
            database_url: "sqlite::memory:".to_string(),
            port: 0,
            jwt_secret: SECRET.to_string(),
            token_ttl: chrono::Duration::minutes(30),
            session_cookie_name: "session".to_string(),
            cookie_secure: false,
            google: with_google.then(|| GoogleOAuthConfig {
                client_id: "test_client_id".to_string(),
                client_secret: "test_secret".to_string(),
                callback_url: "http://localhost:8080/signup/google/callback".to_string(),
            }),
            reconcile_timeout: Duration::from_secs(5),
            cors_origins: Vec::new(),
        }
    }

    async fn test_app(with_google: bool) -> Router {
        let users = Arc::new(SqliteUserStore::new(setup_test_db().await));
        let state = Arc::new(AppState::new(&config(with_google), users));
        build_router(state, &[])
    }

    fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(COOKIE, cookie);
        }
        builder.body(Body::empty()).unwrap()
    }

    fn sign_up_body(email: &str) -> serde_json::Value {
        serde_json::json!({
            "firstName": "Ada",
            "lastName": "Lovelace",
            "email": email,
            "password": "Str0ng!pass",
            "phoneNumber": "+4915112345678"
        })
    }

    fn set_cookies(response: &Response) -> Vec<String> {
        response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect()
    }

    fn session_token(response: &Response) -> Option<String> {
        set_cookies(response)
            .iter()
            .find_map(|c| c.split(';').next()?.strip_prefix("session=").map(str::to_string))
            .filter(|t| !t.is_empty())
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn clears_oauth_state(response: &Response) -> bool {
        set_cookies(response)
            .iter()
            .any(|c| c.starts_with("oauth_state=;") && c.contains("Max-Age=0"))
    }

    async fn text_body(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_sign_up_creates_account_and_session() {
        let app = test_app(false).await;

        let response = app
            .oneshot(json_request("POST", "/signUp", sign_up_body("ada@example.com")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        let token = session_token(&response).expect("session cookie should be set");

        let body = json_body(response).await;
        assert_eq!(body["email"], "ada@example.com");
        assert_eq!(body["provider"], "app");
        assert_eq!(body["isVerified"], false);
        assert!(body.get("passwordHash").is_none());

        let codec = TokenCodec::new(SECRET, chrono::Duration::minutes(30));
        let user: SafeUser = codec.verify_token(&token).unwrap();
        assert_eq!(user.email, "ada@example.com");
        assert_eq!(user.provider, Provider::App);
    }

    #[tokio::test]
    async fn test_sign_up_rejects_duplicate_email() {
        let app = test_app(false).await;

        let first = app
            .clone()
            .oneshot(json_request("POST", "/signUp", sign_up_body("dup@example.com")))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::CREATED);

        let second = app
            .oneshot(json_request("POST", "/signUp", sign_up_body("DUP@example.com")))
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::BAD_REQUEST);
        assert!(session_token(&second).is_none());

        let body = json_body(second).await;
        assert_eq!(body["errors"][0]["field"], "email");
        assert_eq!(body["errors"][0]["message"], "Email in use");
    }

    #[tokio::test]
    async fn test_sign_up_reports_every_invalid_field() {
        let app = test_app(false).await;

        let response = app
            .oneshot(json_request(
                "POST",
                "/signUp",
                serde_json::json!({ "email": "nope", "password": "weak" }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["code"], "VALIDATION_ERROR");

        let fields: Vec<&str> = body["errors"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["field"].as_str().unwrap())
            .collect();
        assert!(fields.contains(&"firstName"));
        assert!(fields.contains(&"lastName"));
        assert!(fields.contains(&"email"));
        assert!(fields.contains(&"password"));
        assert!(fields.contains(&"phoneNumber"));
    }

    #[tokio::test]
    async fn test_current_user_without_session_is_anonymous() {
        let app = test_app(false).await;

        let response = app.oneshot(get("/currentUser", None)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(set_cookies(&response).is_empty());
        let body = json_body(response).await;
        assert!(body["currentUser"].is_null());
    }

    #[tokio::test]
    async fn test_current_user_with_session_refreshes_cookie() {
        let app = test_app(false).await;

        let signed_up = app
            .clone()
            .oneshot(json_request("POST", "/signUp", sign_up_body("cu@example.com")))
            .await
            .unwrap();
        let token = session_token(&signed_up).unwrap();

        let response = app
            .oneshot(get("/currentUser", Some(&format!("session={}", token))))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(session_token(&response).is_some());
        let body = json_body(response).await;
        assert_eq!(body["currentUser"]["email"], "cu@example.com");
    }

    #[tokio::test]
    async fn test_expired_session_is_cleared() {
        let app = test_app(false).await;
        let expired = TokenCodec::new(SECRET, chrono::Duration::minutes(-10))
            .create_token(&SafeUser {
                id: "U_OLD000".to_string(),
                email: "old@example.com".to_string(),
                first_name: None,
                last_name: None,
                provider: Provider::Google,
                is_verified: true,
            })
            .unwrap();

        let response = app
            .oneshot(get("/currentUser", Some(&format!("session={}", expired))))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let cookies = set_cookies(&response);
        assert_eq!(cookies.len(), 1);
        assert!(cookies[0].starts_with("session=;"));
        assert!(cookies[0].contains("Max-Age=0"));

        let body = json_body(response).await;
        assert!(body["currentUser"].is_null());
    }

    #[tokio::test]
    async fn test_sign_in_and_sign_out() {
        let app = test_app(false).await;
        app.clone()
            .oneshot(json_request("POST", "/signUp", sign_up_body("in@example.com")))
            .await
            .unwrap();

        let wrong = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/signIn",
                serde_json::json!({ "email": "in@example.com", "password": "Wr0ng!pass" }),
            ))
            .await
            .unwrap();
        assert_eq!(wrong.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(wrong).await["error"], "Invalid credentials");

        let signed_in = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/signIn",
                serde_json::json!({ "email": "IN@example.com", "password": "Str0ng!pass" }),
            ))
            .await
            .unwrap();
        assert_eq!(signed_in.status(), StatusCode::OK);
        let token = session_token(&signed_in).expect("sign in should set session");

        let signed_out = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/signOut")
                    .header(COOKIE, format!("session={}", token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(signed_out.status(), StatusCode::OK);
        let cookies = set_cookies(&signed_out);
        assert_eq!(cookies.len(), 1);
        assert!(cookies[0].contains("Max-Age=0"));
    }

    #[tokio::test]
    async fn test_sign_out_without_session_is_noop() {
        let app = test_app(false).await;

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/signOut")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(set_cookies(&response).is_empty());
    }

    #[tokio::test]
    async fn test_google_routes_unavailable_without_config() {
        let app = test_app(false).await;

        let response = app.oneshot(get("/signup/google", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_google_start_redirects_with_state_cookie() {
        let app = test_app(true).await;

        let response = app.oneshot(get("/signup/google", None)).await.unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let location = response.headers()[LOCATION].to_str().unwrap().to_string();
        assert!(location.contains("accounts.google.com"));
        assert!(location.contains("scope=email%20profile"));

        let state_cookie = set_cookies(&response)
            .into_iter()
            .find(|c| c.starts_with("oauth_state="))
            .expect("state cookie should be set");
        let state_value = state_cookie
            .split(';')
            .next()
            .and_then(|kv| kv.strip_prefix("oauth_state="))
            .unwrap();
        assert!(location.contains(&format!("state={}", state_value)));
    }

    #[tokio::test]
    async fn test_google_callback_error_redirects_to_failure() {
        let app = test_app(true).await;

        let response = app
            .oneshot(get("/signup/google/callback?error=access_denied", None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[LOCATION], "/auth/google/failure");
        assert!(clears_oauth_state(&response));
    }

    #[tokio::test]
    async fn test_google_callback_rejects_state_mismatch() {
        let app = test_app(true).await;

        let response = app
            .oneshot(get(
                "/signup/google/callback?code=abc&state=forged",
                Some("oauth_state=expected"),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(clears_oauth_state(&response));
        assert!(session_token(&response).is_none());
    }

    #[tokio::test]
    async fn test_google_callback_without_code_clears_state() {
        let app = test_app(true).await;

        let response = app
            .oneshot(get(
                "/signup/google/callback?state=matching",
                Some("oauth_state=matching"),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(clears_oauth_state(&response));
        let body = json_body(response).await;
        assert_eq!(body["error"], "No authorization code provided");
    }

    #[tokio::test]
    async fn test_google_diagnostic_routes() {
        let app = test_app(true).await;

        let success = app
            .clone()
            .oneshot(get("/auth/google/success", None))
            .await
            .unwrap();
        assert_eq!(text_body(success).await, "No user data found.");

        let failure = app
            .oneshot(get("/auth/google/failure", None))
            .await
            .unwrap();
        assert_eq!(text_body(failure).await, "Google Authentication Failed.");
    }
}
