use actix_web::{web, HttpResponse};
use chrono::Utc;
use shared::HealthResponse;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(index))
        .route("/health", web::get().to(health));
}

async fn index() -> HttpResponse {
    HttpResponse::Ok().body("Picnic API is running!")
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().timestamp_millis(),
    })
}
