use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use foodshare::config::{LoggingSettings, Settings};
use foodshare::core::Matcher;
use foodshare::routes::{self, AppState, SearchLimits};
use foodshare::services::{CacheManager, PostgresClient};
use std::io;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Initialize logging; LOG_LEVEL and LOG_FORMAT override the config file
fn init_tracing(logging: &LoggingSettings) {
    let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| logging.level.clone());
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| logging.format.clone());

    let filter = EnvFilter::try_new(&log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true);

    if log_format == "pretty" {
        subscriber.pretty().init();
    } else {
        subscriber.json().init();
    }
}

async fn build_cache(settings: &Settings) -> CacheManager {
    let ttl_secs = settings.cache.ttl_secs.unwrap_or(300);
    let l1_size = settings.cache.l1_cache_size.unwrap_or(1000);

    let redis_url = settings
        .cache
        .redis_url
        .as_deref()
        .filter(|url| !url.is_empty());

    let Some(redis_url) = redis_url else {
        info!("No Redis configured, using in-process cache only");
        return CacheManager::in_memory(l1_size, ttl_secs);
    };

    match CacheManager::new(redis_url, l1_size, ttl_secs).await {
        Ok(cache) => {
            info!("Cache manager initialized (L1: {} entries, TTL: {}s)", l1_size, ttl_secs);
            cache
        }
        Err(e) => {
            warn!("Failed to connect to Redis ({}), running with in-process cache only", e);
            CacheManager::in_memory(l1_size, ttl_secs)
        }
    }
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    // Load .env file if present
    dotenv::dotenv().ok();

    // FOODSHARE_CONFIG points at an explicit file instead of config/
    let settings = match std::env::var("FOODSHARE_CONFIG") {
        Ok(path) if !path.is_empty() => Settings::load_from(path),
        _ => Settings::load(),
    };
    let logging = settings
        .as_ref()
        .map(|s| s.logging.clone())
        .unwrap_or_default();
    init_tracing(&logging);

    info!("Starting FoodShare matching service...");

    let settings = settings.map_err(|e| {
        error!("Failed to load configuration: {}", e);
        io::Error::new(io::ErrorKind::InvalidInput, e.to_string())
    })?;

    info!("Configuration loaded successfully");

    let cache = Arc::new(build_cache(&settings).await);

    let postgres = Arc::new(
        PostgresClient::from_settings(
            &settings.database.url,
            settings.database.max_connections,
            settings.database.min_connections,
            settings.database.acquire_timeout_secs,
            settings.database.idle_timeout_secs,
        )
        .await
        .map_err(|e| {
            error!("Failed to connect to PostgreSQL: {}", e);
            io::Error::new(io::ErrorKind::ConnectionRefused, e.to_string())
        })?,
    );

    info!("PostgreSQL client initialized, migrations applied");

    let weights = settings.scoring_weights();
    let matcher = Matcher::new(weights, settings.matching.radius_km);

    info!(
        "Matcher initialized with weights: {:?}, radius: {} km",
        weights,
        matcher.radius_km()
    );

    let app_state = AppState {
        postgres,
        cache,
        matcher,
        limits: SearchLimits::from(&settings.matching),
    };

    let host = settings.server.host.clone();
    let port = settings.server.port;
    let workers = settings.server.workers.unwrap_or(4);

    info!("Starting HTTP server on {}:{}", host, port);

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .configure(routes::configure_app)
    })
    .workers(workers)
    .bind((host, port))?
    .run()
    .await
}
