use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use kozosseg_server::{
    api, config, db, jobs, mail,
    rate_limit::RateLimiter,
    state::AppState,
    storage::LocalFileStorage,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kozosseg_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load settings
    let settings = config::Settings::new().expect("Failed to load settings");

    // Initialize database
    let db = db::Database::new(&settings.database.path)
        .expect("Failed to create database");

    db.initialize()
        .expect("Failed to initialize database schema");

    if settings.database.seed_test_data {
        db.seed_test_data()
            .expect("Failed to seed test data");
        tracing::info!("Test data seeded successfully");
    }

    tracing::info!("Database initialized successfully");

    // Side services
    let mailer = mail::sender_from_settings(&settings.mail)
        .expect("Failed to configure mail transport");
    let storage = Arc::new(LocalFileStorage::new(&settings.storage.root));
    tracing::info!("Storing uploads under {}", settings.storage.root);

    // Create application state
    let state = AppState::new(db, &settings, mailer, storage);

    // Run initial session cleanup on startup
    tracing::info!("Running initial session cleanup...");
    match state.session_manager.cleanup_expired_sessions() {
        Ok(count) => {
            if count > 0 {
                tracing::info!("Cleaned up {} expired sessions on startup", count);
            } else {
                tracing::info!("No expired sessions to clean up");
            }
        }
        Err(e) => {
            tracing::error!("Failed to cleanup expired sessions on startup: {}", e);
        }
    }

    // Background jobs
    jobs::spawn_session_cleanup(
        state.clone(),
        Duration::from_secs(settings.jobs.session_cleanup_interval_secs),
    );
    jobs::spawn_birthday_job(
        state.clone(),
        Duration::from_secs(settings.jobs.birthday_interval_secs),
    );

    let rate_limiter = RateLimiter::new(
        settings.rate_limit.max_requests,
        settings.rate_limit.window_secs,
    );

    let app = api::router(state, rate_limiter);

    // Start server
    let addr: SocketAddr = format!("{}:{}", settings.server.host, settings.server.port)
        .parse()
        .expect("Failed to parse server address");
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    // peer addresses key the rate limiter for anonymous clients
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .expect("Server error");
}
