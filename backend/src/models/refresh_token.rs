use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Database model for refresh tokens. Rows are only ever revoked, never deleted.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct RefreshTokenRow {
    pub id: String,
    pub user_id: String,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub is_revoked: bool,
}

impl RefreshTokenRow {
    /// Store-side expiry, independent of the `exp` claim inside the token.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use uuid::Uuid;

    fn row(expires_at: DateTime<Utc>) -> RefreshTokenRow {
        RefreshTokenRow {
            id: Uuid::new_v4().to_string(),
            user_id: Uuid::new_v4().to_string(),
            token: "signed.refresh.token".to_string(),
            expires_at,
            created_at: Utc::now(),
            is_revoked: false,
        }
    }

    #[test]
    fn test_refresh_token_row_expiry() {
        let now = Utc::now();

        assert!(!row(now + Duration::days(30)).is_expired_at(now));
        assert!(row(now - Duration::seconds(1)).is_expired_at(now));
    }

    #[test]
    fn test_refresh_token_row_expiry_boundary() {
        let now = Utc::now();
        // No leeway: a row expiring exactly now is still usable
        assert!(!row(now).is_expired_at(now));
    }
}
