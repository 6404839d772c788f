//! Boss Run Back binary entrypoint wiring the REST surface, storage supervisor, and tracing.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod dao;
mod dto;
mod error;
mod routes;
mod services;
mod state;

use config::AppConfig;
use dao::{run_store::RunStore, storage::StorageError};
use services::storage_supervisor;
use state::{AppState, SharedState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let app_state = AppState::new(config);

    spawn_store_supervisor(app_state.clone());

    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Launch the storage supervisor against the backend selected by `STORE_BACKEND`.
///
/// Defaults to MongoDB; `STORE_BACKEND=memory` runs with the volatile in-process
/// store, which is only suitable for local development.
fn spawn_store_supervisor(state: SharedState) {
    let backend = env::var("STORE_BACKEND").unwrap_or_else(|_| "mongo".into());

    match backend.as_str() {
        #[cfg(feature = "memory-store")]
        "memory" => {
            info!("using in-memory run store; runs will not survive a restart");
            tokio::spawn(storage_supervisor::run(state, connect_memory));
        }
        _ => {
            let uri =
                env::var("MONGO_URI").unwrap_or_else(|_| "mongodb://localhost:27017".into());
            let db_name = env::var("MONGO_DB").ok();
            tokio::spawn(storage_supervisor::run(state, move || {
                connect_mongo(uri.clone(), db_name.clone())
            }));
        }
    }
}

#[cfg(feature = "mongo-store")]
async fn connect_mongo(
    uri: String,
    db_name: Option<String>,
) -> Result<Arc<dyn RunStore>, StorageError> {
    use dao::run_store::mongodb::{MongoConfig, MongoRunStore};

    let config = MongoConfig::from_uri(&uri, db_name.as_deref())
        .await
        .map_err(StorageError::from)?;
    let store = MongoRunStore::connect(config)
        .await
        .map_err(StorageError::from)?;
    Ok(Arc::new(store) as Arc<dyn RunStore>)
}

#[cfg(not(feature = "mongo-store"))]
async fn connect_mongo(
    _uri: String,
    _db_name: Option<String>,
) -> Result<Arc<dyn RunStore>, StorageError> {
    panic!("built without the `mongo-store` feature; set STORE_BACKEND=memory")
}

#[cfg(feature = "memory-store")]
async fn connect_memory() -> Result<Arc<dyn RunStore>, StorageError> {
    use dao::run_store::memory::MemoryRunStore;

    Ok(Arc::new(MemoryRunStore::new()) as Arc<dyn RunStore>)
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
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
