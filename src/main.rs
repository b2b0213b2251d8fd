use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use dm_relay::{AppError, AppState, Settings};
use dotenv::dotenv;
use std::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn cors(settings: &Settings) -> Cors {
    if !settings.cors.enabled {
        // CORS disabled - use most restrictive settings
        return Cors::default();
    }

    Cors::default()
        .allowed_origin(&settings.cors.allowed_origin)
        .allowed_methods(vec!["GET", "POST"])
        .allowed_headers(vec!["Authorization", "Content-Type"])
        .max_age(settings.cors.max_age as usize)
}

#[actix_web::main]
async fn main() -> dm_relay::Result<()> {
    // Load environment variables
    dotenv().ok();

    // Load configuration
    let config = Settings::new()?;

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    info!("Configuration loaded successfully ({} environment)", config.environment);

    // Initialize application state
    let state = AppState::new(config.clone()).await?;
    let data = web::Data::new(state.clone());

    // Create and bind TCP listener
    let listener = TcpListener::bind(format!("{}:{}", config.server.host, config.server.port))?;
    info!(
        "Relay listening on http://{}:{} (websocket at /ws)",
        config.server.host, config.server.port
    );

    let settings = config.clone();
    HttpServer::new(move || {
        App::new()
            .wrap(cors(&settings))
            .app_data(data.clone())
            .configure(dm_relay::routes)
    })
    .listen(listener)?
    .workers(config.server.workers as usize)
    .run()
    .await
    .map_err(|e| AppError::InternalError(e.to_string()))?;

    info!("Server stopped, shutting down");
    state.shutdown().await
}
