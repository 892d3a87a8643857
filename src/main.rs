// Copyright (c) Verse Social Team
// SPDX-License-Identifier: Apache-2.0

use anyhow::Result;
use dotenv::dotenv;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use verse_social::api::{self, AppState};
use verse_social::config::{Config, StorageBackend};
use verse_social::db::init_database;
use verse_social::store::{MemoryStore, PgStore, SocialStore};

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "info,verse_social=debug".into()),
    );
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

async fn shutdown_signal() {
    match signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received, initiating graceful shutdown"),
        Err(e) => error!("Failed to listen for shutdown signal: {}", e),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file if present
    dotenv().ok();
    init_tracing();

    let config = Config::from_env()?;
    info!("Initialized configuration");

    let store: Arc<dyn SocialStore> = match config.storage.backend {
        StorageBackend::Postgres => {
            let db = Arc::new(init_database(&config.database).await?);
            info!("Connected to database");
            Arc::new(PgStore::new(db))
        }
        StorageBackend::Memory => {
            info!("Using in-memory store; data is lost on exit");
            Arc::new(MemoryStore::new())
        }
    };

    let state = AppState::new(store, &config)?;
    if let Err(e) = api::start_api_server(state, &config, shutdown_signal()).await {
        error!("API server error: {}", e);
        return Err(e);
    }

    info!("Verse Social shutdown complete");
    Ok(())
}
