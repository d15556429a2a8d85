use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use roommatch_algo::config::Settings;
use roommatch_algo::routes::{self, AppState};
use roommatch_algo::services::JsonFileSource;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenv::dotenv().ok();

    // Load configuration
    let settings = Settings::load().map_err(|e| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, format!("Configuration error: {}", e))
    })?;

    // Initialize logging; LOG_LEVEL / LOG_FORMAT override the config file
    let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| settings.logging.level.clone());
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| settings.logging.format.clone());

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_level(true);

    if log_format == "pretty" {
        subscriber.pretty().init();
    } else {
        subscriber.json().init();
    }

    info!("Starting RoomMatch compatibility service...");

    let source = Arc::new(JsonFileSource::new(settings.residents.path.clone()));
    info!(
        "Resident source: {} (cache TTL: {}s)",
        settings.residents.path.display(),
        settings.residents.cache_ttl_secs
    );

    let host = settings.server.host.clone();
    let port = settings.server.port;
    let workers = settings.server.workers.unwrap_or(4);

    let app_state = AppState::new(settings, source);

    // A missing or unreadable model leaves the service up but untrained
    match app_state.store.restore_into(&app_state.cell) {
        Ok(true) => info!("Model restored from {}", app_state.store.dir().display()),
        Ok(false) => warn!("No model found; POST /api/v1/model/train to train one"),
        Err(e) => error!("Failed to load model from {}: {}", app_state.store.dir().display(), e),
    }

    info!("Starting HTTP server on {}:{}", host, port);

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .app_data(web::JsonConfig::default().error_handler(routes::json_payload_error))
            .app_data(web::QueryConfig::default().error_handler(routes::query_payload_error))
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .configure(routes::configure_routes)
    })
    .workers(workers)
    .bind((host, port))?
    .run()
    .await
}
