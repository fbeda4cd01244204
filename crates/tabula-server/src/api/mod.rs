pub mod response;

use crate::config::Config;
use crate::db;
use crate::features::{self, datasets::DatasetsState, FeatureState};
use crate::ingest::IngestionCoordinator;
use crate::middleware;
use crate::presence::{routes::presence_routes, PresenceHub};
use crate::retrieval::RetrievalService;
use crate::stores::Stores;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tower_http::compression::CompressionLayer;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub stores: Stores,
    pub coordinator: Arc<IngestionCoordinator>,
    pub retrieval: RetrievalService,
    pub presence: Arc<PresenceHub>,
}

impl AppState {
    pub fn new(stores: Stores) -> Self {
        Self::with_coordinator(stores.clone(), IngestionCoordinator::new(stores))
    }

    /// Use a pre-configured coordinator, e.g. one with a custom table namer
    pub fn with_coordinator(stores: Stores, coordinator: IngestionCoordinator) -> Self {
        Self {
            retrieval: RetrievalService::new(stores.clone()),
            coordinator: Arc::new(coordinator),
            presence: Arc::new(PresenceHub::new()),
            stores,
        }
    }
}

/// Create the application router with all routes and middleware
pub fn create_router(state: AppState, config: &Config) -> Router {
    let feature_state = FeatureState {
        datasets: DatasetsState {
            coordinator: state.coordinator.clone(),
            retrieval: state.retrieval.clone(),
            catalog: state.stores.catalog.clone(),
            upload_dir: config.upload.dir.clone(),
        },
        max_upload_bytes: config.upload.max_bytes,
    };

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .with_state(state.clone())
        .nest("/api/v1", features::router(feature_state))
        .nest("/ws", presence_routes().with_state(state.presence.clone()))
        // Apply layers from innermost to outermost
        .layer(CompressionLayer::new())
        .layer(middleware::tracing_layer())
        .layer(middleware::cors_layer(&config.cors))
}

async fn root() -> impl IntoResponse {
    Json(json!({
        "name": "Tabula Server",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running"
    }))
}

/// Health check handler; both stores must answer
async fn health(State(state): State<AppState>) -> Response {
    let rows = db::health_check(&state.stores.rows).await;
    let catalog = state.stores.catalog.ping().await;

    let status = |ok: bool| if ok { "connected" } else { "unavailable" };
    let healthy = rows.is_ok() && catalog.is_ok();

    if let Err(e) = &rows {
        tracing::error!("Relational store health check failed: {}", e);
    }
    if let Err(e) = &catalog {
        tracing::error!("Document store health check failed: {}", e);
    }

    let code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        code,
        Json(json!({
            "status": if healthy { "healthy" } else { "degraded" },
            "rows_store": status(rows.is_ok()),
            "document_store": status(catalog.is_ok()),
        })),
    )
        .into_response()
}
