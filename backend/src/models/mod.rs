use crate::config::Config;
use crate::services::auth::AuthService;
use crate::services::tokens::TokenService;

pub mod refresh_token;
pub mod user;

pub use refresh_token::*;
pub use user::*;

/// Application state shared across all handlers
pub struct AppState {
    pub config: Config,
    pub tokens: TokenService,
    pub auth: AuthService,
}
