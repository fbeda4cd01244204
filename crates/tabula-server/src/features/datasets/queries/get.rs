use uuid::Uuid;

use crate::retrieval::{DatasetPage, RetrievalService, RetrieveError};

#[derive(Debug, Clone, Copy)]
pub struct GetDatasetQuery {
    pub id: Uuid,
}

/// Dataset metadata plus its first page of rows
#[tracing::instrument(skip(retrieval))]
pub async fn handle(
    retrieval: &RetrievalService,
    query: GetDatasetQuery,
) -> Result<DatasetPage, RetrieveError> {
    retrieval.retrieve(query.id).await
}
