use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};

mod config;
mod db;
mod handlers;
mod middleware;
mod models;
mod services;

use config::Config;
use services::auth::AuthService;
use services::password::PasswordHasher;
use services::tokens::TokenService;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize logger
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let config = Config::from_env().map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;

    log::info!("Starting server at {}:{}", config.host, config.port);

    let pool = db::connect(&config)
        .await
        .map_err(|e| std::io::Error::other(format!("Failed to open database: {e}")))?;

    log::info!(
        "Database ready (max {} connections)",
        config.database_max_connections
    );

    // Services are built once here and injected; nothing is process-global
    let tokens = TokenService::new(&config.jwt);
    let auth = AuthService::new(pool, tokens.clone(), PasswordHasher::new(config.bcrypt_cost));

    let app_state = web::Data::new(models::AppState {
        config: config.clone(),
        tokens,
        auth,
    });

    HttpServer::new(move || {
        let state = app_state.clone();
        let cors = Cors::default()
            .allowed_origin_fn(move |origin, _req_head| {
                origin
                    .to_str()
                    .map(|origin| state.config.allows_origin(origin))
                    .unwrap_or(false)
            })
            .allowed_methods(vec!["GET", "POST", "OPTIONS"])
            .allowed_headers(vec!["Authorization", "Content-Type"])
            .max_age(3600);

        App::new()
            .app_data(app_state.clone())
            .wrap(Logger::default())
            .wrap(cors)
            .configure(handlers::configure_routes)
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await
}
