// src/main.rs

use std::{net::SocketAddr, sync::Arc};

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use vidtube::{
    config::Config,
    media::LocalMediaStorage,
    routes,
    state::{AppState, SharedStore},
    store::{memory::MemoryStore, postgres::PgStore},
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration from environment (.env included)
    let config = Config::from_env()?;

    let file_appender = tracing_appender::rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::new(&config.rust_log);
    let stdout_layer = fmt::layer().with_writer(std::io::stdout).with_target(false);
    let file_layer = fmt::layer().with_writer(non_blocking).with_ansi(false);

    // Initialize Tracing (Logging)
    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    let store: SharedStore = match &config.database_url {
        Some(url) => {
            let store = PgStore::connect(url).await?;
            tracing::info!("Database connected, migrations applied.");
            Arc::new(store)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using the in-memory store. Data is lost on exit.");
            Arc::new(MemoryStore::new())
        }
    };

    tokio::fs::create_dir_all(&config.upload_dir).await?;
    let media = Arc::new(LocalMediaStorage::new(
        config.upload_dir.clone(),
        config.public_base_url.clone(),
    ));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));

    let state = AppState {
        store,
        media,
        config,
    };

    // Create the Axum application router
    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
