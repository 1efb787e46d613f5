//! # TaskFlow API Server
//!
//! REST API for TaskFlow: authentication, task management, user
//! administration and audit trails.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p taskflow-api
//! ```

use std::net::SocketAddr;
use taskflow_api::{
    app::{build_router, AppState, RateLimiters},
    config::Config,
};
use taskflow_shared::{
    db::{migrations, pool},
    notify::build_mailer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "taskflow_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        "TaskFlow API Server v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    let config = Config::from_env()?;

    let db = pool::create_pool(config.database.clone()).await?;
    migrations::run_migrations(&db).await?;

    let mailer = build_mailer(&config.email)?;
    tracing::info!(provider = ?config.email.provider, "Email transport ready");

    let rate_limiters = match &config.redis_url {
        Some(url) => {
            let client = redis::Client::open(url.as_str())?;
            let connection = redis::aio::ConnectionManager::new(client).await?;
            tracing::info!("Rate limiting backed by Redis");
            RateLimiters::redis(connection)
        }
        None => {
            tracing::info!("Rate limiting in process (REDIS_URL not set)");
            RateLimiters::in_memory()
        }
    };

    let bind_address = config.bind_address();
    let state = AppState::new(db.clone(), config, mailer).with_rate_limiters(rate_limiters);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    tracing::info!("Server listening on http://{}", bind_address);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    pool::close_pool(db).await;
    tracing::info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, draining connections...");
}
