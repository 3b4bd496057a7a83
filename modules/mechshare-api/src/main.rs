use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use tracing::info;
use tracing_subscriber::EnvFilter;

use mechshare_api::{build_router, AppState, JwtService, PgSubjectGateway};
use mechshare_common::Config;
use mechshare_events::{
    DedupPolicy, EventStore, InteractionRecorder, PgEventStore, PgLikeStore, StatsAggregator,
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    let config = Config::from_env()?;

    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(&config.database_url)
        .await?;
    info!("Connected to database");

    sqlx::migrate!("../../migrations").run(&pool).await?;
    info!("Migrations complete");

    let window = chrono::Duration::from_std(config.dedup_window)?;
    let events: Arc<dyn EventStore> = Arc::new(PgEventStore::new(pool.clone()));

    let state = Arc::new(AppState {
        recorder: InteractionRecorder::new(events.clone(), DedupPolicy::new(window)),
        stats: StatsAggregator::new(events),
        likes: Arc::new(PgLikeStore::new(pool.clone())),
        subjects: Arc::new(PgSubjectGateway::new(pool)),
        jwt: JwtService::new(&config.jwt_secret, config.jwt_issuer.clone()),
        upload_dir: PathBuf::from(&config.upload_dir),
        max_batch_ids: config.max_batch_ids,
    });

    let app = build_router(state, &config.allowed_origins);

    let addr = format!("{}:{}", config.web_host, config.web_port);
    info!(
        window_secs = config.dedup_window.as_secs(),
        "Mechshare API starting on {addr}"
    );

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
