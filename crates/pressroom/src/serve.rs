//! Long-running mode: poller plus HTTP control surface.

use std::sync::Arc;

use miette::Result;
use tracing::info;

use pressroom_scheduler::SqliteStore;
use pressroom_web::create_router;

use crate::app::{SchedulerArgs, build_scheduler};

pub async fn run(store: Arc<SqliteStore>, args: &SchedulerArgs, host: &str, port: u16) -> Result<()> {
    let scheduler = build_scheduler(store, args);
    let router = create_router(scheduler.clone());

    let listener = tokio::net::TcpListener::bind(format!("{}:{}", host, port))
        .await
        .map_err(|e| miette::miette!("failed to bind {}:{}: {}", host, port, e))?;

    scheduler.start().await;
    info!("control surface listening on http://{}:{}", host, port);

    let served = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    // Wait for in-flight attempts so nothing is left claimed.
    scheduler.stop().await;

    served.map_err(|e| miette::miette!("HTTP server error: {}", e))
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c().await.ok();
    info!("received shutdown signal");
}
