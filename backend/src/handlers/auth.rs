use actix_web::{web, HttpResponse, Result};
use shared::{ErrorResponse, LoginRequest, MessageResponse, RefreshTokenRequest, RegisterRequest};

use crate::models::AppState;
use crate::services::auth::AuthError;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/auth")
            .route("/register", web::post().to(register))
            .route("/login", web::post().to(login))
            .route("/refresh", web::post().to(refresh))
            .route("/logout", web::post().to(logout))
    );
}

async fn register(
    state: web::Data<AppState>,
    body: web::Json<RegisterRequest>,
) -> Result<HttpResponse> {
    match state.auth.register(&body.into_inner()).await {
        Ok(response) => Ok(HttpResponse::Created().json(response)),
        Err(e) => Ok(error_response(&e, "REGISTRATION_FAILED")),
    }
}

async fn login(
    state: web::Data<AppState>,
    body: web::Json<LoginRequest>,
) -> Result<HttpResponse> {
    match state.auth.login(&body.into_inner()).await {
        Ok(response) => Ok(HttpResponse::Ok().json(response)),
        Err(e) => Ok(error_response(&e, "INTERNAL_ERROR")),
    }
}

async fn refresh(
    state: web::Data<AppState>,
    body: web::Json<RefreshTokenRequest>,
) -> Result<HttpResponse> {
    match state.auth.refresh(&body.refresh_token).await {
        Ok(response) => Ok(HttpResponse::Ok().json(response)),
        Err(e) => Ok(error_response(&e, "INTERNAL_ERROR")),
    }
}

async fn logout(
    state: web::Data<AppState>,
    body: web::Json<RefreshTokenRequest>,
) -> Result<HttpResponse> {
    match state.auth.logout(&body.refresh_token).await {
        Ok(()) => Ok(HttpResponse::Ok().json(MessageResponse {
            message: "Logged out successfully".to_string(),
        })),
        Err(e) => Ok(error_response(&e, "LOGOUT_FAILED")),
    }
}

/// One status and code per failure kind. `internal_code` labels failures that
/// are not the caller's fault.
fn error_response(error: &AuthError, internal_code: &str) -> HttpResponse {
    match error {
        AuthError::Validation { code, field, message } => HttpResponse::BadRequest()
            .json(ErrorResponse::new(*code, *message).with_detail("field", *field)),
        AuthError::EmailTaken => {
            HttpResponse::Conflict().json(ErrorResponse::new("EMAIL_EXISTS", error.to_string()))
        }
        AuthError::UsernameTaken => {
            HttpResponse::Conflict().json(ErrorResponse::new("USERNAME_EXISTS", error.to_string()))
        }
        AuthError::InvalidCredentials => HttpResponse::Unauthorized()
            .json(ErrorResponse::new("INVALID_CREDENTIALS", error.to_string())),
        AuthError::InvalidToken
        | AuthError::WrongTokenType
        | AuthError::TokenNotFound
        | AuthError::TokenRevoked
        | AuthError::TokenExpired => {
            HttpResponse::Unauthorized().json(ErrorResponse::new("INVALID_TOKEN", error.to_string()))
        }
        AuthError::UserNotFound
        | AuthError::DatabaseError(_)
        | AuthError::TokenError(_)
        | AuthError::PasswordError(_)
        | AuthError::TaskError(_) => {
            log::error!("Auth request failed: {:?}", error);
            HttpResponse::InternalServerError().json(ErrorResponse::new(internal_code, error.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::{configure_routes, test_state};
    use actix_web::http::header::ContentType;
    use actix_web::http::StatusCode;
    use actix_web::{test, App};
    use serde_json::{json, Value};

    fn register_body(email: &str, username: &str) -> Value {
        json!({
            "email": email,
            "password": "Picnic2024",
            "username": username,
            "displayName": "Picnic Fan",
        })
    }

    #[actix_web::test]
    async fn test_register_and_login() {
        let app = test::init_service(App::new().app_data(test_state().await).configure(configure_routes)).await;

        let req = test::TestRequest::post()
            .uri("/api/auth/register")
            .set_json(register_body("ann@example.com", "ann"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);

        let body: Value = test::read_body_json(resp).await;
        assert!(body["accessToken"].is_string());
        assert!(body["refreshToken"].is_string());
        assert_eq!(body["user"]["username"], "ann");
        assert_eq!(body["user"]["displayName"], "Picnic Fan");

        let req = test::TestRequest::post()
            .uri("/api/auth/login")
            .set_json(json!({ "email": "ann@example.com", "password": "Picnic2024" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["user"]["email"], "ann@example.com");
    }

    #[actix_web::test]
    async fn test_register_conflicts() {
        let app = test::init_service(App::new().app_data(test_state().await).configure(configure_routes)).await;

        let req = test::TestRequest::post()
            .uri("/api/auth/register")
            .set_json(register_body("ann@example.com", "ann"))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);

        let req = test::TestRequest::post()
            .uri("/api/auth/register")
            .set_json(register_body("ann@example.com", "annie"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["code"], "EMAIL_EXISTS");

        let req = test::TestRequest::post()
            .uri("/api/auth/register")
            .set_json(register_body("annie@example.com", "ann"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["code"], "USERNAME_EXISTS");
    }

    #[actix_web::test]
    async fn test_register_weak_password() {
        let app = test::init_service(App::new().app_data(test_state().await).configure(configure_routes)).await;

        let mut payload = register_body("ann@example.com", "ann");
        payload["password"] = json!("short");
        let req = test::TestRequest::post()
            .uri("/api/auth/register")
            .set_json(payload)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["code"], "WEAK_PASSWORD");
        assert_eq!(body["message"], "Password must be at least 8 characters long");
        assert_eq!(body["details"]["field"], "password");
    }

    #[actix_web::test]
    async fn test_login_invalid_credentials() {
        let app = test::init_service(App::new().app_data(test_state().await).configure(configure_routes)).await;

        let req = test::TestRequest::post()
            .uri("/api/auth/login")
            .set_json(json!({ "email": "nobody@example.com", "password": "Picnic2024" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["code"], "INVALID_CREDENTIALS");
        assert_eq!(body["message"], "Invalid email or password");
    }

    #[actix_web::test]
    async fn test_refresh_rotation_and_logout() {
        let state = test_state().await;
        let registered = state
            .auth
            .register(&crate::services::auth::register_request("ann@example.com", "ann"))
            .await
            .unwrap();
        let app = test::init_service(App::new().app_data(state).configure(configure_routes)).await;

        let req = test::TestRequest::post()
            .uri("/api/auth/refresh")
            .set_json(json!({ "refreshToken": registered.refresh_token }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let rotated: Value = test::read_body_json(resp).await;
        let new_refresh = rotated["refreshToken"].as_str().unwrap().to_string();
        assert_ne!(new_refresh, registered.refresh_token);

        // Replaying the rotated token is refused
        let req = test::TestRequest::post()
            .uri("/api/auth/refresh")
            .set_json(json!({ "refreshToken": registered.refresh_token }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["code"], "INVALID_TOKEN");
        assert_eq!(body["message"], "Refresh token has been revoked");

        for _ in 0..2 {
            let req = test::TestRequest::post()
                .uri("/api/auth/logout")
                .set_json(json!({ "refreshToken": new_refresh }))
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::OK);
            let body: Value = test::read_body_json(resp).await;
            assert_eq!(body["message"], "Logged out successfully");
        }
    }

    #[actix_web::test]
    async fn test_refresh_with_access_token() {
        let state = test_state().await;
        let registered = state
            .auth
            .register(&crate::services::auth::register_request("ann@example.com", "ann"))
            .await
            .unwrap();
        let app = test::init_service(App::new().app_data(state).configure(configure_routes)).await;

        let req = test::TestRequest::post()
            .uri("/api/auth/refresh")
            .set_json(json!({ "refreshToken": registered.access_token }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["code"], "INVALID_TOKEN");
        assert_eq!(body["message"], "Invalid token type");
    }

    #[actix_web::test]
    async fn test_malformed_body() {
        let app = test::init_service(App::new().app_data(test_state().await).configure(configure_routes)).await;

        let req = test::TestRequest::post()
            .uri("/api/auth/login")
            .insert_header(ContentType::json())
            .set_payload("{not json")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["code"], "BAD_REQUEST");
    }

    #[actix_web::test]
    async fn test_internal_errors_use_operation_code() {
        let resp = error_response(&AuthError::UserNotFound, "LOGOUT_FAILED");
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let resp = error_response(&AuthError::TokenExpired, "INTERNAL_ERROR");
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let resp = error_response(&AuthError::UserNotFound, "REGISTRATION_FAILED");
        let body: Value = test::read_body_json(test::TestRequest::default().to_srv_response(resp)).await;
        assert_eq!(body["code"], "REGISTRATION_FAILED");
    }
}
