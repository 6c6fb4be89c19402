mod api;
mod middleware;
mod scheduler;

use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use crate::api::{build_app, AppState, SnapshotCache};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Arc::new(tariffboard_core::load_app_config()?);
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = tariffboard_db::PoolConfig::from_app_config(&config);
    let pool = tariffboard_db::connect_pool(&config.database_url, pool_config).await?;

    if !tariffboard_db::schema_is_present(&pool).await? {
        tracing::warn!("schema missing or incomplete, rebuilding (drops existing tables)");
        tariffboard_db::reset_schema(&pool).await?;
    }

    let collectors = tariffboard_pipeline::clients_from_config(&config)?;
    let orchestrator = Arc::new(tariffboard_pipeline::Orchestrator::new(
        pool.clone(),
        collectors,
        config.snapshot_path(),
    ));

    let _scheduler = scheduler::build_scheduler(Arc::clone(&orchestrator)).await?;

    let state = AppState {
        pool,
        orchestrator,
        snapshots: SnapshotCache::new(
            config.snapshot_path(),
            Duration::from_secs(config.cache_ttl_secs),
        ),
    };
    let app = build_app(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, env = %config.env, "server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl-c");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
