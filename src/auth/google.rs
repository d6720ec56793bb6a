//! Google OAuth2 strategy
//!
//! Built once at startup from [`GoogleOAuthConfig`] and handed to the router
//! through `AppState`. Covers the three legs of the authorization-code flow:
//! the consent redirect, the code exchange and the userinfo lookup.

use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, error, warn};

use super::models::ExternalProfile;
use crate::common::{safe_email_log, ApiError};
use crate::common::config::GoogleOAuthConfig;

const AUTHORIZATION_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";
const USERINFO_ENDPOINT: &str = "https://www.googleapis.com/oauth2/v3/userinfo";
const SCOPES: &[&str] = &["email", "profile"];

#[derive(Debug, Error)]
pub enum GoogleError {
    #[error("Google OAuth not configured")]
    NotConfigured,

    #[error("OAuth flow failed: {0}")]
    OAuthFailed(String),

    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<GoogleError> for ApiError {
    fn from(e: GoogleError) -> Self {
        match e {
            GoogleError::NotConfigured => {
                ApiError::ServiceUnavailable("Google sign-in is not configured".to_string())
            }
            GoogleError::OAuthFailed(_) => {
                ApiError::Unauthorized("Google authentication failed".to_string())
            }
            GoogleError::RequestFailed(_) => {
                ApiError::ServiceUnavailable("Google is unreachable".to_string())
            }
            GoogleError::SerializationError(msg) => ApiError::InternalServer(msg),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub scope: Option<String>,
}

/// Subset of the OpenID userinfo document we consume
#[derive(Debug, Deserialize)]
pub struct GoogleUserInfo {
    pub sub: Option<String>,
    pub email: Option<String>,
    pub email_verified: Option<bool>,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
}

impl GoogleUserInfo {
    /// An address Google reports as unverified is not usable as an identity
    pub fn into_profile(self) -> ExternalProfile {
        let email = match (self.email, self.email_verified) {
            (Some(email), Some(false)) => {
                warn!(email = %safe_email_log(&email), "Ignoring unverified Google email");
                None
            }
            (email, _) => email,
        };

        ExternalProfile {
            email,
            given_name: self.given_name,
            family_name: self.family_name,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GoogleStrategy {
    client_id: String,
    client_secret: String,
    callback_url: String,
    client: Client,
}

impl GoogleStrategy {
    pub fn new(config: &GoogleOAuthConfig) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            callback_url: config.callback_url.clone(),
            client,
        }
    }

    /// Consent-screen URL requesting the `email` and `profile` scopes
    pub fn authorization_url(&self, state: &str) -> String {
        let scope_param = SCOPES.join(" ");

        let auth_url = format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&state={}",
            AUTHORIZATION_ENDPOINT,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.callback_url),
            urlencoding::encode(&scope_param),
            urlencoding::encode(state)
        );

        debug!("Generated Google OAuth authorization URL with scopes: {}", scope_param);
        auth_url
    }

    /// Exchanges an authorization code for an access token
    pub async fn exchange_code(&self, code: &str) -> Result<TokenResponse, GoogleError> {
        let params = [
            ("code", code),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("redirect_uri", self.callback_url.as_str()),
            ("grant_type", "authorization_code"),
        ];

        debug!("Exchanging authorization code for tokens");

        let response = self
            .client
            .post(TOKEN_ENDPOINT)
            .form(&params)
            .send()
            .await
            .map_err(|e| GoogleError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            error!(status = %status, error = %error_text, "Token exchange failed");
            return Err(GoogleError::OAuthFailed(format!(
                "HTTP {}: {}",
                status, error_text
            )));
        }

        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| GoogleError::SerializationError(e.to_string()))
    }

    /// Fetches the signed-in user's profile
    pub async fn fetch_profile(&self, access_token: &str) -> Result<ExternalProfile, GoogleError> {
        let response = self
            .client
            .get(USERINFO_ENDPOINT)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| GoogleError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            error!(status = %status, "Userinfo request failed");
            return Err(GoogleError::OAuthFailed(format!(
                "userinfo returned HTTP {}",
                status
            )));
        }

        let info = response
            .json::<GoogleUserInfo>()
            .await
            .map_err(|e| GoogleError::SerializationError(e.to_string()))?;

        debug!(sub = ?info.sub, has_email = info.email.is_some(), "Fetched Google profile");
        Ok(info.into_profile())
    }

    /// Runs the code exchange and profile lookup back to back
    pub async fn authenticate(&self, code: &str) -> Result<ExternalProfile, GoogleError> {
        let tokens = self.exchange_code(code).await?;
        debug!(scope = ?tokens.scope, "Google granted scopes");
        self.fetch_profile(&tokens.access_token).await
    }
}
