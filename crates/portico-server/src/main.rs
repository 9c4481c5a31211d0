//! Portico server entry point.
//!
//! Wires the in-memory storage, the local password connector, and the HTTP
//! router together. Deployments with durable storage swap the backend at
//! this seam.

#![forbid(unsafe_code)]

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::oneshot;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use portico_server::password::StoredPasswordConnector;
use portico_server::{AppState, RegisteredConnector, ServerConfig, create_router, gc, keys};
use portico_storage::{MemoryStorage, Storage};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env()?;
    tracing::info!("portico starting, issuer {}", config.issuer);

    let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
    keys::ensure_signing_keys(storage.as_ref()).await?;

    let mut connectors = HashMap::new();
    connectors.insert(
        "local".to_string(),
        RegisteredConnector {
            display_name: "Email & password".to_string(),
            connector: Arc::new(StoredPasswordConnector::new(storage.clone())),
        },
    );

    let gc_interval = std::time::Duration::from_secs(config.gc_interval);
    let addr = format!("{}:{}", config.host, config.port);

    let state = AppState::new(config, storage.clone(), connectors);
    let app = create_router(state);

    let (gc_shutdown, gc_shutdown_rx) = oneshot::channel();
    let gc_task = tokio::spawn(gc::run(storage, gc_interval, gc_shutdown_rx));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("listening on {addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    let _ = gc_shutdown.send(());
    let _ = gc_task.await;
    Ok(())
}
