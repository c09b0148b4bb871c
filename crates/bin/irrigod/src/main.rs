//! # irrigod: irrigo daemon
//!
//! Composition root that wires all adapters together and starts the server.
//!
//! ## Responsibilities
//! - Parse configuration (`irrigo.toml` or `IRRIGO_CONFIG`, env vars)
//! - Initialize the `SQLite` connection pool and run migrations
//! - Build the virtual hardware from the stored rooms
//! - Construct the irrigation engine, injecting adapters via port traits
//! - Build the axum router, injecting the engine
//! - Bind to a TCP port and serve
//! - Handle graceful shutdown (SIGTERM/SIGINT), stopping every active run
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer: no domain logic belongs here.

mod config;

use std::sync::Arc;

use irrigo_adapter_http_axum::state::AppState;
use irrigo_adapter_storage_sqlite_sqlx::SqliteStorage;
use irrigo_adapter_virtual::VirtualHardware;
use irrigo_app::diagnostics::Diagnostics;
use irrigo_app::engine::IrrigationEngine;
use irrigo_app::ports::{Clock, LogNotifier, RoomRepository, SystemClock};
use irrigo_app::timer::TokioTimerService;
use irrigo_domain::entity::EntityState;
use tracing_subscriber::EnvFilter;

use crate::config::Config;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.log))
        .init();

    // Database
    let db = config.database().build().await?;
    let storage = SqliteStorage::new(db.pool().clone());

    // Hardware
    let rooms = storage.get_all().await?;
    let hardware = Arc::new(VirtualHardware::from_rooms(&rooms));
    for entity in &config.hardware.switches {
        hardware.add(entity.clone(), EntityState::Off);
    }
    for entity in &config.hardware.unavailable {
        if !hardware.set_state(entity, EntityState::Unavailable) {
            tracing::warn!(%entity, "unavailable entity is not simulated");
        }
    }
    tracing::info!(entities = hardware.len(), "virtual hardware ready");

    // Engine
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let timers = Arc::new(TokioTimerService::new(Arc::clone(&clock)));
    let diagnostics = Arc::new(Diagnostics::new(config.error_history_capacity));
    let engine = IrrigationEngine::new(
        storage,
        hardware,
        LogNotifier,
        clock,
        timers,
        diagnostics,
        config.engine(),
    );
    engine.setup().await?;

    // HTTP
    let app = irrigo_adapter_http_axum::router::build(AppState::new(Arc::clone(&engine)));

    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    tracing::info!(bind = %config.bind, "irrigod listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    engine.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "unable to listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "unable to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("shutdown requested");
}
