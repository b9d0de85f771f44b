use actix_web::error::{InternalError, JsonPayloadError};
use actix_web::{web, HttpRequest, HttpResponse};
use shared::ErrorResponse;

pub mod auth;
pub mod health;
pub mod users;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(json_error_handler))
        .configure(health::configure)
        .service(
            web::scope("/api")
                .configure(auth::configure)
                .configure(users::configure),
        );
}

/// Malformed or mistyped bodies get the standard error shape instead of
/// actix's plain-text default.
fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    let response = HttpResponse::BadRequest().json(ErrorResponse::new("BAD_REQUEST", err.to_string()));
    InternalError::from_response(err, response).into()
}

#[cfg(test)]
pub async fn test_state() -> web::Data<crate::models::AppState> {
    use crate::config::Config;
    use crate::services::auth::test_service;
    use crate::services::tokens::{test_settings, TokenService};

    let jwt = test_settings();
    web::Data::new(crate::models::AppState {
        tokens: TokenService::new(&jwt),
        auth: test_service().await,
        config: Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            database_url: "sqlite::memory:".to_string(),
            database_max_connections: 1,
            jwt,
            bcrypt_cost: 4,
            cors_origins: Vec::new(),
        },
    })
}
