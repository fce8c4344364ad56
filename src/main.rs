//! Quill - social blogging backend

use anyhow::Result;
use std::path::Path;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use quill::{
    api::{self, AppState},
    cache::create_cache,
    config::{Config, DatabaseDriver},
    db::{self, Repositories},
};

/// How often expired sessions and stale rate limit entries are swept
const MAINTENANCE_INTERVAL: Duration = Duration::from_secs(300);

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quill=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Quill...");

    let config = Config::load_with_env(Path::new("config.yml"))?;
    tracing::info!("Configuration loaded");

    let (repos, pool) = match config.database.driver {
        DatabaseDriver::Memory => {
            tracing::warn!("Using the in-memory store; data is lost on restart");
            (Repositories::memory(), None)
        }
        driver => {
            let pool = db::create_pool(&config.database).await?;
            tracing::info!("Database connected: {:?}", driver);
            db::migrations::run_migrations(&pool).await?;
            tracing::info!("Database migrations completed");
            (Repositories::sqlx(pool.clone()), Some(pool))
        }
    };

    let cache = create_cache(&config.cache);
    tracing::info!("Cache initialized");

    let state = AppState::new(repos, pool, cache, config.auth.session_days);

    {
        let users = state.user_service.clone();
        let limiter = state.rate_limiter.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(MAINTENANCE_INTERVAL);
            loop {
                interval.tick().await;
                match users.cleanup_expired_sessions().await {
                    Ok(0) => {}
                    Ok(removed) => tracing::info!(removed, "Expired sessions removed"),
                    Err(e) => tracing::warn!("Session cleanup failed: {}", e),
                }
                limiter.cleanup().await;
            }
        });
    }

    let app = api::build_router(state, &config.server.cors_origin);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
