use chrono::{Duration, Utc};
use shared::{AuthResponse, LoginRequest, RegisterRequest, UserProfile};
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{NewUser, UserRow};
use crate::services::credentials::{self, StoreError};
use crate::services::password::{self, PasswordError, PasswordHasher};
use crate::services::tokens::{TokenError, TokenService, TokenType};

/// Lifetime of a stored refresh token row, independent of the `exp` claim
/// signed into the token itself. Both are checked on refresh.
pub const REFRESH_TOKEN_STORE_TTL_DAYS: i64 = 30;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{message}")]
    Validation {
        code: &'static str,
        field: &'static str,
        message: &'static str,
    },
    #[error("Email already registered")]
    EmailTaken,
    #[error("Username already taken")]
    UsernameTaken,
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Invalid refresh token")]
    InvalidToken,
    #[error("Invalid token type")]
    WrongTokenType,
    #[error("Refresh token not found")]
    TokenNotFound,
    #[error("Refresh token has been revoked")]
    TokenRevoked,
    #[error("Refresh token has expired")]
    TokenExpired,
    #[error("User not found")]
    UserNotFound,
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
    #[error("Token error: {0}")]
    TokenError(#[from] TokenError),
    #[error(transparent)]
    PasswordError(#[from] PasswordError),
    #[error("Password task failed: {0}")]
    TaskError(#[from] tokio::task::JoinError),
}

impl From<StoreError> for AuthError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::EmailTaken => AuthError::EmailTaken,
            StoreError::UsernameTaken => AuthError::UsernameTaken,
            StoreError::DatabaseError(e) => AuthError::DatabaseError(e),
        }
    }
}

/// Registration, login, rotation and logout. Every operation runs as a single
/// transaction against the store; mutual exclusion between concurrent callers
/// comes from the store's isolation and unique indices, not from in-process locks.
#[derive(Clone)]
pub struct AuthService {
    pool: SqlitePool,
    tokens: TokenService,
    hasher: PasswordHasher,
}

impl AuthService {
    pub fn new(pool: SqlitePool, tokens: TokenService, hasher: PasswordHasher) -> Self {
        Self { pool, tokens, hasher }
    }

    pub async fn register(&self, request: &RegisterRequest) -> Result<AuthResponse, AuthError> {
        validate_registration(request)?;

        // Cheap rejection before paying for bcrypt; repeated under the write lock below
        {
            let mut conn = self.pool.acquire().await?;
            ensure_available(&mut conn, request).await?;
        }

        let password_hash = self.hash_password(request.password.clone()).await?;

        let mut tx = self.begin_write().await?;
        ensure_available(&mut tx, request).await?;

        let user = credentials::insert_user(
            &mut tx,
            &NewUser {
                email: request.email.clone(),
                username: request.username.clone(),
                password_hash,
                display_name: request.display_name.clone(),
            },
        )
        .await?;

        let response = self.issue_session(&mut tx, &user).await?;
        tx.commit().await?;

        log::info!("Registered user {} ({})", user.id, user.username);
        Ok(response)
    }

    /// Unknown email and wrong password are deliberately indistinguishable.
    /// Earlier sessions stay valid; several devices may be logged in at once.
    pub async fn login(&self, request: &LoginRequest) -> Result<AuthResponse, AuthError> {
        if !password::is_valid_email(&request.email) {
            return Err(invalid_email());
        }

        let user = {
            let mut conn = self.pool.acquire().await?;
            credentials::find_user_by_email(&mut conn, &request.email)
                .await?
                .ok_or(AuthError::InvalidCredentials)?
        };

        if !self
            .verify_password(request.password.clone(), user.password_hash.clone())
            .await?
        {
            return Err(AuthError::InvalidCredentials);
        }

        let mut tx = self.begin_write().await?;
        credentials::touch_last_login(&mut tx, &user.id, Utc::now()).await?;

        let response = self.issue_session(&mut tx, &user).await?;
        tx.commit().await?;

        log::info!("User {} logged in", user.id);
        Ok(response)
    }

    /// Exchange a refresh token for a new pair, revoking the one presented.
    pub async fn refresh(&self, refresh_token: &str) -> Result<AuthResponse, AuthError> {
        match self.tokens.token_type(refresh_token) {
            Ok(TokenType::Refresh) => {}
            Ok(TokenType::Access) => return Err(AuthError::WrongTokenType),
            Err(e) => {
                log::debug!(
                    "Rejected refresh token: {} (expired: {})",
                    e,
                    self.tokens.is_expired(refresh_token)
                );
                return Err(AuthError::InvalidToken);
            }
        }

        let mut tx = self.begin_write().await?;

        let stored = credentials::find_refresh_token(&mut tx, refresh_token)
            .await?
            .ok_or(AuthError::TokenNotFound)?;

        if stored.is_revoked {
            log::warn!("Revoked refresh token presented for user {}", stored.user_id);
            return Err(AuthError::TokenRevoked);
        }
        if stored.is_expired_at(Utc::now()) {
            return Err(AuthError::TokenExpired);
        }

        let user = credentials::find_user_by_id(&mut tx, &stored.user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        // Another request rotated this token between our read and this write
        if credentials::revoke_refresh_token(&mut tx, refresh_token).await? == 0 {
            return Err(AuthError::TokenRevoked);
        }

        let response = self.issue_session(&mut tx, &user).await?;
        tx.commit().await?;

        log::info!("Rotated refresh token for user {}", user.id);
        Ok(response)
    }

    /// Revoking an unknown or already revoked token is not an error.
    pub async fn logout(&self, refresh_token: &str) -> Result<(), AuthError> {
        let mut conn = self.pool.acquire().await?;

        if credentials::revoke_refresh_token(&mut conn, refresh_token).await? == 0 {
            log::debug!("Logout with unknown or already revoked refresh token");
        } else {
            log::info!("Refresh token revoked on logout");
        }

        Ok(())
    }

    pub async fn get_user(&self, user_id: &Uuid) -> Result<Option<UserProfile>, AuthError> {
        let mut conn = self.pool.acquire().await?;
        let user = credentials::find_user_by_id(&mut conn, &user_id.to_string()).await?;

        Ok(user.and_then(|u| u.to_profile()))
    }

    /// Take SQLite's write lock up front. A deferred transaction that reads
    /// and then writes fails with `SQLITE_BUSY` instead of waiting when another
    /// writer got there first.
    async fn begin_write(&self) -> Result<Transaction<'static, Sqlite>, sqlx::Error> {
        self.pool.begin_with("BEGIN IMMEDIATE").await
    }

    async fn issue_session(
        &self,
        conn: &mut SqliteConnection,
        user: &UserRow,
    ) -> Result<AuthResponse, AuthError> {
        let profile = user.to_profile().ok_or(AuthError::UserNotFound)?;

        let access_token = self.tokens.issue_access_token(&profile.id, &user.email)?;
        let refresh_token = self.tokens.issue_refresh_token(&profile.id)?;

        credentials::insert_refresh_token(
            conn,
            &user.id,
            &refresh_token,
            Utc::now() + Duration::days(REFRESH_TOKEN_STORE_TTL_DAYS),
        )
        .await?;

        Ok(AuthResponse {
            access_token,
            refresh_token,
            user: profile,
        })
    }

    async fn hash_password(&self, password: String) -> Result<String, AuthError> {
        let hasher = self.hasher;
        Ok(tokio::task::spawn_blocking(move || hasher.hash(&password)).await??)
    }

    async fn verify_password(&self, password: String, hash: String) -> Result<bool, AuthError> {
        let hasher = self.hasher;
        Ok(tokio::task::spawn_blocking(move || hasher.verify(&password, &hash)).await?)
    }
}

async fn ensure_available(
    conn: &mut SqliteConnection,
    request: &RegisterRequest,
) -> Result<(), AuthError> {
    if credentials::email_exists(conn, &request.email).await? {
        return Err(AuthError::EmailTaken);
    }
    if credentials::username_exists(conn, &request.username).await? {
        return Err(AuthError::UsernameTaken);
    }
    Ok(())
}

fn invalid_email() -> AuthError {
    AuthError::Validation {
        code: "INVALID_EMAIL",
        field: "email",
        message: "Invalid email format",
    }
}

fn validate_registration(request: &RegisterRequest) -> Result<(), AuthError> {
    if !password::is_valid_email(&request.email) {
        return Err(invalid_email());
    }
    if let Some(message) = password::validate_username(&request.username) {
        return Err(AuthError::Validation {
            code: "INVALID_USERNAME",
            field: "username",
            message,
        });
    }
    if let Some(message) = password::validate_password_strength(&request.password) {
        return Err(AuthError::Validation {
            code: "WEAK_PASSWORD",
            field: "password",
            message,
        });
    }
    if let Some(message) = password::validate_display_name(&request.display_name) {
        return Err(AuthError::Validation {
            code: "INVALID_DISPLAY_NAME",
            field: "displayName",
            message,
        });
    }
    Ok(())
}

#[cfg(test)]
pub async fn test_service() -> AuthService {
    use crate::services::tokens::test_settings;

    AuthService::new(
        crate::db::test_pool().await,
        TokenService::new(&test_settings()),
        PasswordHasher::new(4),
    )
}

#[cfg(test)]
pub fn register_request(email: &str, username: &str) -> RegisterRequest {
    RegisterRequest {
        email: email.to_string(),
        password: "Picnic2024".to_string(),
        username: username.to_string(),
        display_name: "Picnic Fan".to_string(),
    }
}
