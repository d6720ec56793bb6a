//! Authentication data models

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;

/// Identity source of a user record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Local email + password credentials
    App,
    Google,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::App => "app",
            Provider::Google => "google",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "app" => Ok(Provider::App),
            "google" => Ok(Provider::Google),
            other => Err(format!("unknown provider '{}'", other)),
        }
    }
}

/// Row shape of the `users` table
#[derive(FromRow, Debug)]
pub struct UserRow {
    pub id: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
    pub password_hash: Option<String>,
    pub provider: String,
    pub is_verified: bool,
    pub last_login_at: Option<String>,
    pub created_at: String,
}

/// User database model, including secret fields
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
    pub password_hash: Option<String>,
    pub provider: Provider,
    pub is_verified: bool,
    pub last_login_at: Option<String>,
    pub created_at: String,
}

impl TryFrom<UserRow> for User {
    type Error = sqlx::Error;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let provider = row
            .provider
            .parse::<Provider>()
            .map_err(|e| sqlx::Error::Decode(e.into()))?;

        Ok(User {
            id: row.id,
            email: row.email,
            first_name: row.first_name,
            last_name: row.last_name,
            phone_number: row.phone_number,
            password_hash: row.password_hash,
            provider,
            is_verified: row.is_verified,
            last_login_at: row.last_login_at,
            created_at: row.created_at,
        })
    }
}

/// Projection of [`User`] without secrets; the only shape placed in tokens
/// or returned to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SafeUser {
    pub id: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub provider: Provider,
    pub is_verified: bool,
}

impl From<&User> for SafeUser {
    fn from(user: &User) -> Self {
        SafeUser {
            id: user.id.clone(),
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            provider: user.provider,
            is_verified: user.is_verified,
        }
    }
}

impl From<User> for SafeUser {
    fn from(user: User) -> Self {
        SafeUser::from(&user)
    }
}

/// JWT claims structure
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Claims {
    pub user: SafeUser,
    pub iat: usize,
    pub exp: usize,
}

/// Profile handed back by an OAuth provider; never persisted as-is
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExternalProfile {
    pub email: Option<String>,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
}

/// Insert payload for an account created through an external provider
#[derive(Debug, Clone, PartialEq)]
pub struct NewUserPayload {
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub provider: Provider,
}

/// Insert payload for a local (email + password) account
#[derive(Debug, Clone)]
pub struct NewLocalUser {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: String,
    pub password_hash: String,
}

/// POST /signUp body
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct SignUpRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub phone_number: String,
}

/// POST /signIn body
#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

/// Query parameters Google appends to the callback URL
#[derive(Deserialize, Debug, Default)]
pub struct OAuthCallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}
