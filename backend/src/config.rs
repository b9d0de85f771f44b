use std::env;
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} must be a number, got {value:?}")]
    InvalidNumber { name: &'static str, value: String },
}

/// Signing and lifetime settings for issued tokens
#[derive(Debug, Clone)]
pub struct JwtSettings {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub realm: String,
    pub access_token_expiration_ms: i64,
    pub refresh_token_expiration_ms: i64,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub database_max_connections: u32,
    pub jwt: JwtSettings,
    pub bcrypt_cost: u32,
    pub cors_origins: Vec<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: parse_var("PORT", 8080)?,
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:picnic.db?mode=rwc".to_string()),
            database_max_connections: parse_var("DATABASE_MAX_CONNECTIONS", 10)?,
            jwt: JwtSettings {
                secret: env::var("JWT_SECRET")
                    .unwrap_or_else(|_| "development-secret-key-change-in-production".to_string()),
                issuer: env::var("JWT_ISSUER").unwrap_or_else(|_| "picnic-server".to_string()),
                audience: env::var("JWT_AUDIENCE").unwrap_or_else(|_| "picnic-app".to_string()),
                realm: env::var("JWT_REALM").unwrap_or_else(|_| "picnic".to_string()),
                access_token_expiration_ms: parse_var("JWT_ACCESS_TOKEN_EXPIRATION_MS", 60 * 60 * 1000)?,
                refresh_token_expiration_ms: parse_var(
                    "JWT_REFRESH_TOKEN_EXPIRATION_MS",
                    30 * 24 * 60 * 60 * 1000,
                )?,
            },
            bcrypt_cost: parse_var("BCRYPT_COST", bcrypt::DEFAULT_COST)?,
            cors_origins: env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "http://localhost:8080,http://127.0.0.1:8080".to_string())
                .split(',')
                .map(|origin| origin.trim().trim_end_matches('/').to_string())
                .filter(|origin| !origin.is_empty())
                .collect(),
        })
    }

    /// Origins match whole, scheme and port included.
    pub fn allows_origin(&self, origin: &str) -> bool {
        let origin = origin.trim_end_matches('/');
        self.cors_origins.iter().any(|allowed| allowed == origin)
    }
}

fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidNumber { name, value }),
        Err(_) => Ok(default),
    }
}
