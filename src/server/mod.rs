//! HTTP API for the typesetting service
//!
//! JSON endpoints under `/api`, generated artifacts under `/uploads` and the
//! front-end build for everything else.

mod handlers;
pub mod types;

use crate::pipeline::TypesetPipeline;
use axum::extract::DefaultBodyLimit;
use axum::routing::{any, get, post};
use axum::Router;
use log::{info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

pub use handlers::{api_not_found, convert_to_word, health_check, typeset, upload, INTENT_FIELD, UPLOAD_FIELD};
pub use types::*;

/// Server state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<TypesetPipeline>,
}

impl AppState {
    pub fn new(pipeline: TypesetPipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
        }
    }
}

/// Build the router with all endpoints
pub fn build_router(state: AppState) -> Router {
    let config = state.pipeline.config();
    let uploads = ServeDir::new(state.pipeline.store().root());
    let static_dir = &config.server.static_dir;
    let front_end = ServeDir::new(static_dir).fallback(ServeFile::new(static_dir.join("index.html")));

    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/upload", post(upload))
        .route("/api/typeset", post(typeset))
        .route("/api/convert-to-word", post(convert_to_word))
        .route("/api", any(api_not_found))
        .route("/api/{*rest}", any(api_not_found))
        .nest_service(crate::storage::PUBLIC_PREFIX, uploads)
        .fallback_service(front_end)
        .layer(DefaultBodyLimit::max(config.server.max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve on an already bound listener. Used directly by tests binding port 0.
pub async fn serve(listener: TcpListener, state: AppState) -> std::io::Result<()> {
    state.pipeline.store().ensure_root().await.map_err(std::io::Error::other)?;

    let config = state.pipeline.config();
    if !config.has_api_key() {
        warn!(
            "{} is not set (environment or .env); typeset requests will be rejected until it is configured",
            config.llm.api_key_env
        );
    }

    if let Some(retention) = config.storage.retention_secs {
        state.pipeline.store().spawn_sweeper(
            Duration::from_secs(retention),
            Duration::from_secs(config.storage.sweep_interval_secs.max(1)),
        );
    }

    let app = build_router(state);
    axum::serve(listener, app).await
}

/// Start the API server
pub async fn start_server(addr: &str, state: AppState) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("Quick typeset server listening on {}", listener.local_addr()?);
    info!("Artifacts served from {}", state.pipeline.store().root().display());
    serve(listener, state).await
}
