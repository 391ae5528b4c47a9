use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use resume_api::activity::{ActivityRepository, InMemoryActivityRepository, PgActivityRepository};
use resume_api::config::Config;
use resume_api::db::create_pool;
use resume_api::live::PushHub;
use resume_api::routes::build_router;
use resume_api::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails fast on malformed env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "resume_api={0},api={0},tower_http={0}",
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Resume API v{}", env!("CARGO_PKG_VERSION"));

    // Activity log storage: Postgres if configured, otherwise in-process
    let activity: Arc<dyn ActivityRepository> = match &config.database_url {
        Some(url) => Arc::new(PgActivityRepository::new(create_pool(url).await?)),
        None => {
            info!("DATABASE_URL not set; activity log kept in memory");
            Arc::new(InMemoryActivityRepository::new())
        }
    };

    let hub = PushHub::new(config.push_buffer);
    info!(capacity = config.push_buffer, "Live-update hub initialized");

    let state = AppState { activity, hub };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
