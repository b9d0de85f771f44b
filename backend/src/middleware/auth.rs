use actix_web::HttpRequest;
use uuid::Uuid;

use crate::services::tokens::{TokenService, TokenType};

/// Extract the caller's user ID from a bearer access token. Refresh tokens are
/// not accepted here even though they carry a valid signature.
pub fn extract_user_id(req: &HttpRequest, tokens: &TokenService) -> Result<Uuid, AuthMiddlewareError> {
    let auth_header = req
        .headers()
        .get("Authorization")
        .ok_or(AuthMiddlewareError::MissingToken)?;

    let auth_str = auth_header
        .to_str()
        .map_err(|_| AuthMiddlewareError::InvalidToken)?;

    let token = auth_str
        .strip_prefix("Bearer ")
        .ok_or(AuthMiddlewareError::InvalidToken)?;

    let claims = tokens
        .verify(token)
        .map_err(|_| AuthMiddlewareError::InvalidToken)?;

    if claims.token_type != TokenType::Access {
        return Err(AuthMiddlewareError::WrongTokenType);
    }

    claims.user_id().ok_or(AuthMiddlewareError::InvalidToken)
}

#[derive(Debug)]
pub enum AuthMiddlewareError {
    MissingToken,
    InvalidToken,
    WrongTokenType,
}

impl std::fmt::Display for AuthMiddlewareError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthMiddlewareError::MissingToken => write!(f, "Missing authorization token"),
            AuthMiddlewareError::InvalidToken => write!(f, "Token is not valid or has expired"),
            AuthMiddlewareError::WrongTokenType => write!(f, "An access token is required"),
        }
    }
}

impl std::error::Error for AuthMiddlewareError {}
