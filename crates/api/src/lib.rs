//! `api` crate — the read-only dashboard HTTP service.
//!
//! Exposes a single route:
//!   GET  /   dashboard: job counts, worker table, 20 most recent jobs

pub mod dashboard;

use std::sync::Arc;

use axum::{routing::get, Router};
use engine::QueueEngine;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<QueueEngine>,
}

pub async fn serve(bind: &str, engine: Arc<QueueEngine>) -> Result<(), std::io::Error> {
    let state = AppState { engine };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/", get(dashboard::home))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!("Dashboard listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await
}
