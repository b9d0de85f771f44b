use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{NewUser, RefreshTokenRow, UserRow};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Email already registered")]
    EmailTaken,
    #[error("Username already taken")]
    UsernameTaken,
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

pub async fn find_user_by_email(
    conn: &mut SqliteConnection,
    email: &str,
) -> Result<Option<UserRow>, StoreError> {
    let user = sqlx::query_as("SELECT * FROM users WHERE email = ?")
        .bind(email)
        .fetch_optional(conn)
        .await?;

    Ok(user)
}

pub async fn find_user_by_id(
    conn: &mut SqliteConnection,
    user_id: &str,
) -> Result<Option<UserRow>, StoreError> {
    let user = sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(conn)
        .await?;

    Ok(user)
}

pub async fn email_exists(conn: &mut SqliteConnection, email: &str) -> Result<bool, StoreError> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE email = ?")
        .bind(email)
        .fetch_one(conn)
        .await?;

    Ok(count > 0)
}

pub async fn username_exists(conn: &mut SqliteConnection, username: &str) -> Result<bool, StoreError> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE username = ?")
        .bind(username)
        .fetch_one(conn)
        .await?;

    Ok(count > 0)
}

/// Insert a new account. A lost race on the unique email/username indices is
/// reported as the matching conflict rather than a raw database error.
pub async fn insert_user(conn: &mut SqliteConnection, user: &NewUser) -> Result<UserRow, StoreError> {
    let id = Uuid::new_v4().to_string();
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO users (id, email, username, password_hash, display_name, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&user.email)
    .bind(&user.username)
    .bind(&user.password_hash)
    .bind(&user.display_name)
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await;

    match result {
        Ok(_) => {}
        Err(sqlx::Error::Database(e)) if e.message().contains("UNIQUE constraint failed: users.email") => {
            return Err(StoreError::EmailTaken);
        }
        Err(sqlx::Error::Database(e)) if e.message().contains("UNIQUE constraint failed: users.username") => {
            return Err(StoreError::UsernameTaken);
        }
        Err(e) => return Err(StoreError::DatabaseError(e)),
    }

    let row = sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(&id)
        .fetch_one(conn)
        .await?;

    Ok(row)
}

pub async fn touch_last_login(
    conn: &mut SqliteConnection,
    user_id: &str,
    at: DateTime<Utc>,
) -> Result<(), StoreError> {
    sqlx::query("UPDATE users SET last_login_at = ? WHERE id = ?")
        .bind(at)
        .bind(user_id)
        .execute(conn)
        .await?;

    Ok(())
}

pub async fn insert_refresh_token(
    conn: &mut SqliteConnection,
    user_id: &str,
    token: &str,
    expires_at: DateTime<Utc>,
) -> Result<RefreshTokenRow, StoreError> {
    let row = RefreshTokenRow {
        id: Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        token: token.to_string(),
        expires_at,
        created_at: Utc::now(),
        is_revoked: false,
    };

    sqlx::query(
        r#"
        INSERT INTO refresh_tokens (id, user_id, token, expires_at, created_at, is_revoked)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&row.id)
    .bind(&row.user_id)
    .bind(&row.token)
    .bind(row.expires_at)
    .bind(row.created_at)
    .bind(row.is_revoked)
    .execute(conn)
    .await?;

    Ok(row)
}

pub async fn find_refresh_token(
    conn: &mut SqliteConnection,
    token: &str,
) -> Result<Option<RefreshTokenRow>, StoreError> {
    let row = sqlx::query_as("SELECT * FROM refresh_tokens WHERE token = ?")
        .bind(token)
        .fetch_optional(conn)
        .await?;

    Ok(row)
}

/// Flip the revoked flag on a still-active row. Returns the number of rows
/// changed, so 0 means the token was unknown or already revoked.
pub async fn revoke_refresh_token(conn: &mut SqliteConnection, token: &str) -> Result<u64, StoreError> {
    let result = sqlx::query("UPDATE refresh_tokens SET is_revoked = 1 WHERE token = ? AND is_revoked = 0")
        .bind(token)
        .execute(conn)
        .await?;

    Ok(result.rows_affected())
}
