use anyhow::Context;
use std::sync::Arc;
use switchyard::admin::{ADMIN_MODULE_ID, AdminModule};
use switchyard::config::{ConfigStore, Environment, JsonFileStore, MemoryStore};
use switchyard::lifecycle::{Bootstrap, shutdown_signal};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "switchyard=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("switchyard v{} starting", env!("CARGO_PKG_VERSION"));

    // 1. Persistent store
    let store: Arc<dyn ConfigStore> = match std::env::var("SWITCHYARD_STATE_FILE") {
        Ok(path) => Arc::new(
            JsonFileStore::open(&path).with_context(|| format!("opening state file {path}"))?,
        ),
        Err(_) => {
            tracing::warn!("SWITCHYARD_STATE_FILE not set, module state is kept in memory");
            Arc::new(MemoryStore::new())
        }
    };

    // 2. Environment seeding
    let bootstrap = Bootstrap::new(store).module(ADMIN_MODULE_ID, AdminModule::new);
    let environment = Environment::from_env()?;
    if bootstrap.seed_environment(&environment)? {
        tracing::info!("Fresh deployment, configuration seeded");
    }

    // 3. Serve
    let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let addr = format!("{}:{}", host, port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    axum::serve(listener, switchyard::http::app(bootstrap))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}
