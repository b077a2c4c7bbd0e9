use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use hookflow::api::{self, ApiState};
use hookflow::config::Config;
use hookflow::db;
use hookflow::jobs::engine::DeliveryEngine;
use hookflow::jobs::store::{JobStore, PgJobStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cfg = Config::from_env()?;

    info!(
        listen_addr = %cfg.listen_addr,
        workers = cfg.workers,
        max_retries = cfg.max_retries,
        tick_ms = cfg.tick_ms,
        migrate_on_startup = cfg.migrate_on_startup,
        "hookflow starting"
    );

    let pool = db::make_pool(&cfg.database_url).await?;
    if cfg.migrate_on_startup {
        db::run_migrations(&pool).await?;
        info!("migrations completed");
    }

    let store: Arc<dyn JobStore> = Arc::new(PgJobStore::new(pool));
    let engine = Arc::new(DeliveryEngine::new(Arc::clone(&store), cfg.engine()));

    // Fatal if the pending-job load fails: the engine cannot operate
    // without a consistent starting state.
    engine.start().await?;

    let app = api::router(ApiState {
        store,
        engine,
    });

    let listener = tokio::net::TcpListener::bind(&cfg.listen_addr).await?;
    info!(addr = %cfg.listen_addr, "api listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    // In-flight delivery attempts finish naturally; there is no drain.
    let _ = tokio::signal::ctrl_c().await;
}
