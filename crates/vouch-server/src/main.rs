mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::{Method, header::{AUTHORIZATION, CONTENT_TYPE}};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use vouch_api::cleanup;
use vouch_api::objects::FsObjectStore;
use vouch_api::scratch::{MemoryScratch, ScratchStore, SqliteScratch};
use vouch_api::{AppStateInner, router};
use vouch_db::Database;

use crate::config::{Config, ScratchBackend};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vouch=debug,vouch_api=debug,vouch_drafts=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    // Init database and object storage
    let db = Arc::new(Database::open(&config.db_path)?);
    let objects = Arc::new(FsObjectStore::new(config.object_dir.clone(), config.public_url.clone()).await?);

    let scratch: Arc<dyn ScratchStore> = match config.scratch_backend {
        ScratchBackend::Memory => Arc::new(MemoryScratch::new()),
        ScratchBackend::Sqlite => Arc::new(SqliteScratch::new(db.clone())),
    };
    info!("Temp storage backend: {:?}", config.scratch_backend);

    let state = AppStateInner::new(db, objects, scratch, config.jwt_secret, config.admin_token);

    // Background cleanup task (runs every hour by default)
    tokio::spawn(cleanup::run_cleanup_loop(state.clone(), config.cleanup_interval_secs));

    // Cookies ride along, so the origin must be echoed rather than `*`
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
        .allow_credentials(true);

    let app = router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Vouch server listening on {}", addr);
    info!("Public object URL: {}/objects", config.public_url);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
