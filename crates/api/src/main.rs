use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use thumbforge_api::config::ServerConfig;
use thumbforge_api::router::build_app_router;
use thumbforge_api::state::{AppState, Providers, Stores};
use thumbforge_core::references::ReferenceCollector;
use thumbforge_db::stores::{PgEntitlementStore, PgResultStore, PgSessionStore};
use thumbforge_providers::{GeminiGenerator, HttpImageFetcher, YouTubeSearch};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    init_tracing();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = thumbforge_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    thumbforge_db::health_check(&pool)
        .await
        .expect("Database health check failed");

    thumbforge_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    let stores = Stores {
        entitlements: Arc::new(PgEntitlementStore::new(pool.clone())),
        sessions: Arc::new(PgSessionStore::new(pool.clone())),
        results: Arc::new(PgResultStore::new(pool.clone())),
    };

    // --- Providers ---
    let http = reqwest::Client::new();
    let generation = &config.generation;
    let generator = GeminiGenerator::with_client(
        http.clone(),
        generation.gemini_api_key.clone(),
        generation.gemini_model.clone(),
    );
    tracing::info!(model = %generator.model(), "Image generator configured");

    let references = match &generation.youtube_api_key {
        Some(key) => {
            tracing::info!(
                max_references = generation.max_references,
                min_views = generation.min_reference_views,
                "Reference search enabled"
            );
            Some(Arc::new(ReferenceCollector::new(
                Arc::new(YouTubeSearch::with_client(http.clone(), key.clone())),
                Arc::new(HttpImageFetcher::with_client(
                    http.clone(),
                    thumbforge_providers::fetch::DEFAULT_MAX_IMAGE_BYTES,
                )),
                generation.reference_settings(),
            )))
        }
        None => {
            tracing::warn!("YOUTUBE_API_KEY not set, generating without reference thumbnails");
            None
        }
    };
    let providers = Providers {
        generator: Arc::new(generator),
        references,
    };

    tokio::fs::create_dir_all(&config.scratch_dir)
        .await
        .expect("Failed to create scratch directory");

    // --- App state & router ---
    let addr = SocketAddr::new(
        config.host.parse().expect("HOST must be a valid IP address"),
        config.port,
    );
    let state = AppState::new(config, Some(pool), stores, providers);
    let app = build_app_router(state);

    // --- Start server ---
    tracing::info!(%addr, "Starting server");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    tracing::info!("Server shut down");
}

/// `LOG_FORMAT=json` switches to structured JSON lines; anything else uses
/// the human-readable formatter.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "thumbforge_api=debug,thumbforge_core=debug,tower_http=debug".into());
    let json = std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received Ctrl+C, shutting down"),
        () = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
