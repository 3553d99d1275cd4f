use log::{error, info, warn};
use std::net::SocketAddr;
use std::sync::Arc;

use rusty_rooms::config::ServerConfig;
use rusty_rooms::core::hub::Hub;
use rusty_rooms::core::server::ServerState;
use rusty_rooms::routes::routes;
use rusty_rooms::storage::{FsDocumentStore, SharedDocumentStore};

#[tokio::main]
async fn main() {
    // Initialize env before logging so RUST_LOG can come from .env
    let dotenv_result = dotenvy::dotenv();

    // Initialize logging
    env_logger::init();

    match dotenv_result {
        Ok(path) => info!("Environment variables loaded from {}", path.display()),
        Err(e) => warn!("Failed to load .env file: {}", e),
    };

    // Load config from .env
    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    info!(
        "Configuration: host={}, port={}, storage={}, static={}",
        config.host,
        config.port,
        config.storage_dir.display(),
        config.static_dir.display()
    );
    info!(
        "Relay limits: queue={} frames, max frame={} bytes, idle timeout={:?}, retention={:?}",
        config.outbound_queue_capacity,
        config.max_frame_size,
        config.idle_timeout,
        config.room_retention
    );
    if config.origin_policy.is_allow_any() {
        warn!("Accepting room connections from any origin. Set RUSTY_ROOMS_ALLOWED_ORIGINS to restrict them.");
    }

    // Build the server address
    let addr: SocketAddr = match format!("{}:{}", config.host, config.port).parse() {
        Ok(addr) => addr,
        Err(e) => {
            error!("Failed to parse server address: {}", e);
            std::process::exit(1);
        }
    };

    // Start the room hub and the shared state
    let (hub, _hub_task) = Hub::spawn(config.room_retention);
    let documents: SharedDocumentStore = Arc::new(FsDocumentStore::new(config.storage_dir.clone()));
    let tls_paths = match (config.enable_tls, &config.tls_cert_path, &config.tls_key_path) {
        (true, Some(cert), Some(key)) => Some((cert.clone(), key.clone())),
        _ => None,
    };
    let state = Arc::new(ServerState::new(hub, documents, config));

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Shutdown signal received");
    };

    // Start the server
    match tls_paths {
        Some((cert, key)) => {
            let (bound, server) = warp::serve(routes(state))
                .tls()
                .cert_path(cert)
                .key_path(key)
                .bind_with_graceful_shutdown(addr, shutdown);
            info!("Starting Rusty Rooms server on https://{}", bound);
            server.await;
        }
        None => match warp::serve(routes(state)).try_bind_with_graceful_shutdown(addr, shutdown) {
            Ok((bound, server)) => {
                info!("Starting Rusty Rooms server on http://{}", bound);
                server.await;
            }
            Err(e) => {
                error!("Failed to bind {}: {}", addr, e);
                std::process::exit(1);
            }
        },
    }

    info!("Server stopped");
}
