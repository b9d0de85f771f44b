use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9+_.-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").expect("valid email regex")
});

static USERNAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_]{3,30}$").expect("valid username regex"));

pub const MAX_DISPLAY_NAME_LEN: usize = 100;

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("Password hashing error: {0}")]
    Hashing(#[from] bcrypt::BcryptError),
}

/// bcrypt hasher with a fixed work factor. The salt is generated per call and
/// embedded in the returned hash string.
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    cost: u32,
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    pub fn hash(&self, password: &str) -> Result<String, PasswordError> {
        Ok(bcrypt::hash(password, self.cost)?)
    }

    /// Never fails: a malformed hash simply does not verify.
    pub fn verify(&self, password: &str, hash: &str) -> bool {
        bcrypt::verify(password, hash).unwrap_or(false)
    }
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new(bcrypt::DEFAULT_COST)
    }
}

/// Returns the first rule the password breaks, or `None` if it is acceptable.
pub fn validate_password_strength(password: &str) -> Option<&'static str> {
    if password.chars().count() < 8 {
        Some("Password must be at least 8 characters long")
    } else if !password.chars().any(char::is_uppercase) {
        Some("Password must contain at least one uppercase letter")
    } else if !password.chars().any(char::is_lowercase) {
        Some("Password must contain at least one lowercase letter")
    } else if !password.chars().any(char::is_numeric) {
        Some("Password must contain at least one number")
    } else {
        None
    }
}

pub fn validate_username(username: &str) -> Option<&'static str> {
    let len = username.chars().count();
    if len < 3 {
        Some("Username must be at least 3 characters long")
    } else if len > 30 {
        Some("Username must be at most 30 characters long")
    } else if !USERNAME_REGEX.is_match(username) {
        Some("Username can only contain letters, numbers, and underscores")
    } else {
        None
    }
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_REGEX.is_match(email)
}

pub fn validate_display_name(display_name: &str) -> Option<&'static str> {
    if display_name.trim().is_empty() || display_name.chars().count() > MAX_DISPLAY_NAME_LEN {
        Some("Display name must be between 1 and 100 characters")
    } else {
        None
    }
}
