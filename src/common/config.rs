// src/common/config.rs
//! Runtime configuration loaded from the environment

use std::env;
use std::ops::RangeInclusive;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

const DEFAULT_JWT_SECRET: &str = "replace_with_strong_secret";
const DEFAULT_TOKEN_TTL_MINUTES: i64 = 1440;
/// One year
const MAX_TOKEN_TTL_MINUTES: i64 = 525_600;

/// Google OAuth client credentials
#[derive(Debug, Clone)]
pub struct GoogleOAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub callback_url: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub port: u16,
    pub jwt_secret: String,
    pub token_ttl: chrono::Duration,
    pub session_cookie_name: String,
    pub cookie_secure: bool,
    /// `None` when either the client id or the secret is missing
    pub google: Option<GoogleOAuthConfig>,
    pub reconcile_timeout: Duration,
    pub cors_origins: Vec<String>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://signup_api.db".to_string());

        let jwt_secret = match env::var("JWT_SECRET") {
            Ok(secret) if !secret.trim().is_empty() => secret,
            _ => {
                warn!("JWT_SECRET not set, using insecure placeholder secret");
                DEFAULT_JWT_SECRET.to_string()
            }
        };

        let token_ttl_minutes = parse_in_range(
            "TOKEN_TTL_MINUTES",
            DEFAULT_TOKEN_TTL_MINUTES,
            1..=MAX_TOKEN_TTL_MINUTES,
        );
        let reconcile_timeout_secs: u64 = parse_or("RECONCILE_TIMEOUT_SECS", 10);

        let callback_url = env::var("GOOGLE_CALLBACK_URL")
            .unwrap_or_else(|_| "http://localhost:8080/signup/google/callback".to_string());
        let google = match (env::var("GOOGLE_CLIENT_ID"), env::var("GOOGLE_CLIENT_SECRET")) {
            (Ok(client_id), Ok(client_secret))
                if !client_id.is_empty() && !client_secret.is_empty() =>
            {
                Some(GoogleOAuthConfig {
                    client_id,
                    client_secret,
                    callback_url,
                })
            }
            _ => None,
        };

        let cors_origins = env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:3000,http://localhost:5173".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Self {
            database_url,
            port: parse_or("PORT", 8080),
            jwt_secret,
            token_ttl: chrono::Duration::minutes(token_ttl_minutes),
            session_cookie_name: env::var("SESSION_COOKIE_NAME")
                .unwrap_or_else(|_| "session".to_string()),
            cookie_secure: env::var("COOKIE_SECURE")
                .map(|v| v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            google,
            reconcile_timeout: Duration::from_secs(reconcile_timeout_secs),
            cors_origins,
        }
    }
}

/// Reads `key` and parses it, falling back to `default` when absent or malformed
fn parse_or<T>(key: &str, default: T) -> T
where
    T: FromStr + Copy + std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(key = %key, value = %raw, default = %default, "Invalid value, using default");
            default
        }),
        Err(_) => default,
    }
}

/// Like [`parse_or`], but values outside `range` also fall back to `default`
fn parse_in_range<T>(key: &str, default: T, range: RangeInclusive<T>) -> T
where
    T: FromStr + Copy + PartialOrd + std::fmt::Display,
{
    let value = parse_or(key, default);
    if range.contains(&value) {
        value
    } else {
        warn!(
            key = %key,
            value = %value,
            min = %range.start(),
            max = %range.end(),
            default = %default,
            "Value out of range, using default"
        );
        default
    }
}
