//! Datasets: upload, list, and retrieve

pub mod commands;
pub mod queries;
pub mod requester;
pub mod routes;

use std::path::PathBuf;
use std::sync::Arc;

use crate::catalog::DatasetCatalog;
use crate::ingest::IngestionCoordinator;
use crate::retrieval::RetrievalService;

pub use requester::Requester;
pub use routes::datasets_routes;

/// State shared by the dataset handlers
#[derive(Clone)]
pub struct DatasetsState {
    pub coordinator: Arc<IngestionCoordinator>,
    pub retrieval: RetrievalService,
    pub catalog: Arc<dyn DatasetCatalog>,
    /// Where uploads are staged during ingestion
    pub upload_dir: PathBuf,
}
