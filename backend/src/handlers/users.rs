use actix_web::{web, HttpRequest, HttpResponse, Result};
use shared::ErrorResponse;

use crate::middleware::auth::{extract_user_id, AuthMiddlewareError};
use crate::models::AppState;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/users").route("/me", web::get().to(get_current_user)));
}

fn unauthorized(realm: &str, error: &AuthMiddlewareError) -> HttpResponse {
    HttpResponse::Unauthorized()
        .insert_header(("WWW-Authenticate", format!("Bearer realm=\"{}\"", realm)))
        .json(ErrorResponse::new("UNAUTHORIZED", error.to_string()))
}

async fn get_current_user(state: web::Data<AppState>, req: HttpRequest) -> Result<HttpResponse> {
    let user_id = match extract_user_id(&req, &state.tokens) {
        Ok(id) => id,
        Err(e) => return Ok(unauthorized(&state.config.jwt.realm, &e)),
    };

    match state.auth.get_user(&user_id).await {
        Ok(Some(user)) => Ok(HttpResponse::Ok().json(user)),
        Ok(None) => Ok(HttpResponse::NotFound().json(ErrorResponse::new("NOT_FOUND", "User not found"))),
        Err(e) => {
            log::error!("Error fetching user: {:?}", e);
            Ok(HttpResponse::InternalServerError()
                .json(ErrorResponse::new("INTERNAL_ERROR", "Failed to fetch user")))
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::handlers::{configure_routes, test_state};
    use crate::services::auth::register_request;
    use actix_web::http::StatusCode;
    use actix_web::{test, App};
    use serde_json::Value;
    use uuid::Uuid;

    #[actix_web::test]
    async fn test_me_with_access_token() {
        let state = test_state().await;
        let registered = state
            .auth
            .register(&register_request("ann@example.com", "ann"))
            .await
            .unwrap();
        let app = test::init_service(App::new().app_data(state).configure(configure_routes)).await;

        let req = test::TestRequest::get()
            .uri("/api/users/me")
            .insert_header(("Authorization", format!("Bearer {}", registered.access_token)))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["id"], registered.user.id.to_string());
        assert_eq!(body["username"], "ann");
    }

    #[actix_web::test]
    async fn test_me_rejects_refresh_token() {
        let state = test_state().await;
        let registered = state
            .auth
            .register(&register_request("ann@example.com", "ann"))
            .await
            .unwrap();
        let app = test::init_service(App::new().app_data(state).configure(configure_routes)).await;

        let req = test::TestRequest::get()
            .uri("/api/users/me")
            .insert_header(("Authorization", format!("Bearer {}", registered.refresh_token)))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            resp.headers().get("WWW-Authenticate").unwrap(),
            "Bearer realm=\"picnic\""
        );
    }

    #[actix_web::test]
    async fn test_me_without_token() {
        let app = test::init_service(App::new().app_data(test_state().await).configure(configure_routes)).await;

        let req = test::TestRequest::get().uri("/api/users/me").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["code"], "UNAUTHORIZED");
    }

    #[actix_web::test]
    async fn test_me_for_missing_account() {
        let state = test_state().await;
        let token = state
            .tokens
            .issue_access_token(&Uuid::new_v4(), "ghost@example.com")
            .unwrap();
        let app = test::init_service(App::new().app_data(state).configure(configure_routes)).await;

        let req = test::TestRequest::get()
            .uri("/api/users/me")
            .insert_header(("Authorization", format!("Bearer {}", token)))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
