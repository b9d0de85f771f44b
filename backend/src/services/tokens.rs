use std::fmt;

use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::JwtSettings;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Token has expired")]
    Expired,
    #[error("Invalid token: {0}")]
    InvalidSignature(#[source] jsonwebtoken::errors::Error),
    #[error("Failed to sign token: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

impl TokenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Access => "access",
            TokenType::Refresh => "refresh",
        }
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decoded payload of an access or refresh token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: String,
    /// Only present on access tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(rename = "type")]
    pub token_type: TokenType,
    pub iss: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
    /// Random per token, so two tokens minted in the same second never collide
    pub jti: String,
}

impl TokenClaims {
    pub fn user_id(&self) -> Option<Uuid> {
        Uuid::parse_str(&self.sub).ok()
    }
}

/// Mints and verifies HS256 tokens. Verification is pure computation and the
/// service is cheap to clone, so it can be shared freely between workers.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    issuer: String,
    audience: String,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenService {
    pub fn new(settings: &JwtSettings) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[settings.issuer.as_str()]);
        validation.set_audience(&[settings.audience.as_str()]);
        validation.set_required_spec_claims(&["exp", "sub", "iss", "aud"]);
        // Exact expiry boundary, no clock-skew allowance
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(settings.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(settings.secret.as_bytes()),
            validation,
            issuer: settings.issuer.clone(),
            audience: settings.audience.clone(),
            access_ttl: Duration::milliseconds(settings.access_token_expiration_ms),
            refresh_ttl: Duration::milliseconds(settings.refresh_token_expiration_ms),
        }
    }

    pub fn issue_access_token(&self, user_id: &Uuid, email: &str) -> Result<String, TokenError> {
        self.issue(user_id, Some(email), TokenType::Access, self.access_ttl)
    }

    /// The caller is responsible for persisting the returned token.
    pub fn issue_refresh_token(&self, user_id: &Uuid) -> Result<String, TokenError> {
        self.issue(user_id, None, TokenType::Refresh, self.refresh_ttl)
    }

    fn issue(
        &self,
        user_id: &Uuid,
        email: Option<&str>,
        token_type: TokenType,
        ttl: Duration,
    ) -> Result<String, TokenError> {
        let now = Utc::now();
        let claims = TokenClaims {
            sub: user_id.to_string(),
            email: email.map(str::to_string),
            token_type,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(TokenError::Signing)
    }

    /// Check signature, issuer, audience and expiry, returning the claims.
    pub fn verify(&self, token: &str) -> Result<TokenClaims, TokenError> {
        decode::<TokenClaims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::InvalidSignature(e),
            })
    }

    pub fn token_type(&self, token: &str) -> Result<TokenType, TokenError> {
        self.verify(token).map(|claims| claims.token_type)
    }

    /// Diagnostic expiry check that does not rely on `verify`. Anything that
    /// cannot be decoded is reported as expired.
    pub fn is_expired(&self, token: &str) -> bool {
        let mut validation = self.validation.clone();
        validation.validate_exp = false;

        match decode::<TokenClaims>(token, &self.decoding_key, &validation) {
            Ok(data) => data.claims.exp.saturating_mul(1000) < Utc::now().timestamp_millis(),
            Err(_) => true,
        }
    }
}

#[cfg(test)]
pub fn test_settings() -> JwtSettings {
    JwtSettings {
        secret: "test-secret".to_string(),
        issuer: "picnic-server".to_string(),
        audience: "picnic-app".to_string(),
        realm: "picnic".to_string(),
        access_token_expiration_ms: 15 * 60 * 1000,
        refresh_token_expiration_ms: 30 * 24 * 60 * 60 * 1000,
    }
}
