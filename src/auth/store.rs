//! User persistence
//!
//! The reconciliation core talks to storage only through [`UserStore`];
//! [`SqliteUserStore`] is the production implementation.

use async_trait::async_trait;
use sqlx::SqlitePool;
use tracing::{debug, error};

use super::models::{NewLocalUser, NewUserPayload, Provider, SafeUser, User, UserRow};
use crate::common::{generate_user_id, normalize_email, safe_email_log};

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Looks up a user by email, case-insensitively
    async fn select_user(&self, email: &str) -> Result<Option<User>, sqlx::Error>;

    /// Creates an account for an external provider; the provider has
    /// already proven email ownership so the record starts verified
    async fn insert_external_user(&self, payload: &NewUserPayload)
        -> Result<SafeUser, sqlx::Error>;

    /// Creates an unverified local (`app`) account
    async fn insert_local_user(&self, payload: &NewLocalUser) -> Result<SafeUser, sqlx::Error>;

    /// Stamps the last-login time and returns the refreshed projection
    async fn update_login(&self, email: &str) -> Result<SafeUser, sqlx::Error>;
}

#[derive(Debug, Clone)]
pub struct SqliteUserStore {
    pool: SqlitePool,
}

impl SqliteUserStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    #[cfg(test)]
    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn fetch_by_id(&self, id: &str) -> Result<User, sqlx::Error> {
        let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        User::try_from(row)
    }
}

#[async_trait]
impl UserStore for SqliteUserStore {
    async fn select_user(&self, email: &str) -> Result<Option<User>, sqlx::Error> {
        let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE email = ?")
            .bind(normalize_email(email))
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                error!(error = %e, email = %safe_email_log(email), "Database error during user lookup");
                e
            })?;

        row.map(User::try_from).transpose()
    }

    async fn insert_external_user(
        &self,
        payload: &NewUserPayload,
    ) -> Result<SafeUser, sqlx::Error> {
        let id = generate_user_id();

        sqlx::query(
            "INSERT INTO users (id, email, first_name, last_name, provider, is_verified, last_login_at) VALUES (?, ?, ?, ?, ?, 1, datetime('now'))",
        )
        .bind(&id)
        .bind(normalize_email(&payload.email))
        .bind(payload.first_name.as_deref())
        .bind(payload.last_name.as_deref())
        .bind(payload.provider.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!(
                error = %e,
                email = %safe_email_log(&payload.email),
                provider = %payload.provider,
                "Database error inserting external user"
            );
            e
        })?;

        debug!(user_id = %id, provider = %payload.provider, "Inserted external user");
        Ok(self.fetch_by_id(&id).await?.into())
    }

    async fn insert_local_user(&self, payload: &NewLocalUser) -> Result<SafeUser, sqlx::Error> {
        let id = generate_user_id();

        sqlx::query(
            "INSERT INTO users (id, email, first_name, last_name, phone_number, password_hash, provider, is_verified) VALUES (?, ?, ?, ?, ?, ?, ?, 0)",
        )
        .bind(&id)
        .bind(normalize_email(&payload.email))
        .bind(&payload.first_name)
        .bind(&payload.last_name)
        .bind(&payload.phone_number)
        .bind(&payload.password_hash)
        .bind(Provider::App.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!(error = %e, email = %safe_email_log(&payload.email), "Database error inserting local user");
            e
        })?;

        debug!(user_id = %id, "Inserted local user");
        Ok(self.fetch_by_id(&id).await?.into())
    }

    async fn update_login(&self, email: &str) -> Result<SafeUser, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE users SET last_login_at = datetime('now'), updated_at = datetime('now') WHERE email = ?",
        )
        .bind(normalize_email(email))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(sqlx::Error::RowNotFound);
        }

        let user = self
            .select_user(email)
            .await?
            .ok_or(sqlx::Error::RowNotFound)?;
        Ok(user.into())
    }
}

/// Returns true when `err` is a unique-constraint violation
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db.is_unique_violation(),
        _ => false,
    }
}
