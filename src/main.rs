//! Locator query server

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};

use locator::{config::ServerArgs, logging, server, services, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = ServerArgs::parse();
    logging::init(&args.log);

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("Listen: {}", args.listen);
    info!("Request timeout: {} ms", args.request_timeout_ms);

    let storage = match services::open_storage(&args.storage).await {
        Ok(storage) => storage,
        Err(e) => {
            error!("Failed to open storage: {}", e);
            std::process::exit(1);
        }
    };

    let geocoder = match services::geocode_client(&args.geocode, storage.geocode_cache).await {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to start geocoder: {}", e);
            std::process::exit(1);
        }
    };

    let state = Arc::new(AppState::new(
        storage.locations,
        geocoder,
        args.request_timeout(),
    ));

    server::run(state, args.listen).await?;
    Ok(())
}
