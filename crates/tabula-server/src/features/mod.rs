//! Feature modules implementing the Tabula API
//!
//! Each feature is a vertical slice with its own commands, queries, and
//! routes:
//! - `commands/` - write operations
//! - `queries/` - read operations
//! - `routes.rs` - HTTP route definitions and error mapping
//!
//! # Features
//!
//! - **datasets**: CSV upload and ingestion, listing, and row retrieval

pub mod datasets;

use axum::Router;

use datasets::DatasetsState;

/// Shared state for all feature routes
#[derive(Clone)]
pub struct FeatureState {
    pub datasets: DatasetsState,
    /// Request body cap applied to uploads
    pub max_upload_bytes: usize,
}

/// Creates the versioned API router
///
/// - `/datasets` - upload, list, retrieve
pub fn router(state: FeatureState) -> Router<()> {
    Router::new().nest(
        "/datasets",
        datasets::datasets_routes(state.max_upload_bytes).with_state(state.datasets),
    )
}
