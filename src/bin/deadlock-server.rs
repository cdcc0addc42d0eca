//! Deadlock Simulator Server
//!
//! Serves the simulation API over HTTP with Axum

use anyhow::Context;
use deadlock_sim_core::api::{build_router, ApiState};
use deadlock_sim_core::AppConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("loading configuration")?;

    init_tracing(&config);

    let workers = if config.server.workers == 0 {
        num_cpus::get()
    } else {
        config.server.workers
    };

    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(workers)
        .enable_all()
        .build()
        .context("building tokio runtime")?
        .block_on(serve(config))
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "deadlock_server={level},deadlock_sim_core={level},tower_http=info",
            level = config.logging.level
        )
        .into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    if config.logging.format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn serve(config: AppConfig) -> anyhow::Result<()> {
    let addr = config.bind_addr()?;
    let environment = config.environment;
    let effective = serde_json::to_string(&config)?;
    let app = build_router(ApiState::new(config));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;

    tracing::info!(?environment, "Deadlock simulator listening on {}", addr);
    tracing::debug!(config = %effective, "effective configuration");

    axum::serve(listener, app).await?;

    Ok(())
}
