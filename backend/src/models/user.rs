use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Database model for users
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct UserRow {
    pub id: String,
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub display_name: String,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub header_image_url: Option<String>,
    pub location: Option<String>,
    pub website: Option<String>,
    pub is_verified: bool,
    pub is_private: bool,
    pub email_verified: bool,
    pub follower_count: i64,
    pub following_count: i64,
    pub post_count: i64,
    pub like_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl UserRow {
    /// Ids are written by this service as UUID strings; a row that fails to
    /// parse yields `None`.
    pub fn user_id(&self) -> Option<Uuid> {
        Uuid::parse_str(&self.id).ok()
    }

    pub fn to_profile(&self) -> Option<shared::UserProfile> {
        Some(shared::UserProfile {
            id: self.user_id()?,
            email: self.email.clone(),
            username: self.username.clone(),
            display_name: self.display_name.clone(),
            bio: self.bio.clone(),
            avatar_url: self.avatar_url.clone(),
            header_image_url: self.header_image_url.clone(),
            location: self.location.clone(),
            website: self.website.clone(),
            is_verified: self.is_verified,
            is_private: self.is_private,
            follower_count: self.follower_count,
            following_count: self.following_count,
            post_count: self.post_count,
            like_count: self.like_count,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Fields supplied at registration; everything else takes its column default.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub display_name: String,
}
