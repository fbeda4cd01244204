use std::sync::Arc;
use uuid::Uuid;

use crate::catalog::{CatalogError, DatasetCatalog, DatasetRecord};
use crate::error::ErrorKind;

#[derive(Debug, Clone, Copy)]
pub struct ListDatasetsQuery {
    pub owner_id: Uuid,
}

#[derive(Debug, thiserror::Error)]
pub enum ListDatasetsError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

impl ListDatasetsError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ListDatasetsError::Catalog(CatalogError::NotFound(_)) => ErrorKind::NotFound,
            ListDatasetsError::Catalog(CatalogError::Store(_)) => ErrorKind::StoreUnavailable,
        }
    }
}

/// All of the owner's datasets, newest first
#[tracing::instrument(skip(catalog))]
pub async fn handle(
    catalog: Arc<dyn DatasetCatalog>,
    query: ListDatasetsQuery,
) -> Result<Vec<DatasetRecord>, ListDatasetsError> {
    Ok(catalog.list_for_owner(query.owner_id).await?)
}
