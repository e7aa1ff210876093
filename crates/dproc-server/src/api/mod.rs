pub mod response;

use std::net::SocketAddr;

use axum::{http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tower_http::compression::CompressionLayer;

use crate::config::Config;
use crate::features::{self, FeatureState};
use crate::middleware::{cors_layer, tracing_layer};

/// Bind, serve and stop accepting requests once `shutdown` fires.
pub async fn serve(config: &Config, app: Router, shutdown: CancellationToken) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    Ok(())
}

pub fn create_router(state: FeatureState, config: &Config) -> Router {
    let api_v1 = features::router(state);

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .nest("/api/v1", api_v1)
        .layer(CompressionLayer::new())
        .layer(cors_layer(&config.cors))
        .layer(tracing_layer())
}

async fn root() -> impl IntoResponse {
    Json(json!({
        "name": "dproc server",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running"
    }))
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
