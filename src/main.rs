//! Courtside scheduler daemon wiring the store, the notification outbox, and
//! the background loops.

use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use courtside_core::config::AppConfig;
use courtside_core::dao::game_store::memory::MemoryGameStore;
use courtside_core::notify::LogGateway;
use courtside_core::notify::outbox::NotificationOutbox;
use courtside_core::services::scheduler::Scheduler;
use courtside_core::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let store = Arc::new(MemoryGameStore::new());
    let (outbox, outbox_worker) =
        NotificationOutbox::start(config.outbox_capacity, Arc::new(LogGateway));
    let state = AppState::new(config, store, outbox);

    let scheduler = Scheduler::start(state.clone());
    info!("scheduler daemon running");

    shutdown_signal().await;
    info!("shutdown signal received");

    scheduler.stop().await;
    // The dispatch worker drains and exits once the last producer handle in
    // the shared state is gone.
    drop(state);
    outbox_worker.await.context("joining notification worker")?;

    Ok(())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the daemon down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut term = signal(SignalKind::terminate()).expect("install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
