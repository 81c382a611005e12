//! Substats Server Binary
//!
//! Subscription analytics dashboard endpoints and weekly reports

use std::net::SocketAddr;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use substats_common::{Clock, VERSION};
use substats_server::{build_state, config::ServerConfig, router, scheduler::spawn_weekly_reports};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    info!("Starting Substats Server v{}", VERSION);

    let config = ServerConfig::load()?;
    info!("Loaded configuration: {:?}", config);

    let state = build_state(&config).await?;
    for notice in state.service.notices() {
        info!("{}", notice);
    }

    let scheduler = config
        .report
        .weekly_enabled
        .then(|| spawn_weekly_reports(state.service.clone(), Clock::System));

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let app = router(state);

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for shutdown signal: {}", e);
        }
        info!("Received shutdown signal");
    };

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Substats server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    if let Some(scheduler) = scheduler {
        scheduler.abort();
    }
    info!("Shutting down Substats server");
    Ok(())
}
