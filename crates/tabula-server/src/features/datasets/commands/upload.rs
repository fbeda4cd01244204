use std::sync::Arc;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::catalog::DatasetRecord;
use crate::error::ErrorKind;
use crate::ingest::{IngestError, IngestRequest, IngestionCoordinator, StagedUpload};

#[derive(Debug)]
pub struct UploadDatasetCommand {
    pub owner_id: Uuid,
    pub upload: StagedUpload,
}

#[derive(Debug, thiserror::Error)]
pub enum UploadDatasetError {
    #[error(transparent)]
    Ingest(#[from] IngestError),
    #[error("Ingestion task failed: {0}")]
    Task(#[from] JoinError),
}

impl UploadDatasetError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            UploadDatasetError::Ingest(e) => e.kind(),
            UploadDatasetError::Task(_) => ErrorKind::Internal,
        }
    }
}

/// Run ingestion on its own task
///
/// If the caller's future is dropped (client disconnect), the drop guard
/// cancels the token and the coordinator stops at its next state boundary.
#[tracing::instrument(skip(coordinator, command), fields(owner_id = %command.owner_id))]
pub async fn handle(
    coordinator: Arc<IngestionCoordinator>,
    command: UploadDatasetCommand,
) -> Result<DatasetRecord, UploadDatasetError> {
    let cancel = CancellationToken::new();
    let _cancel_on_drop = cancel.clone().drop_guard();

    let request = IngestRequest {
        owner_id: command.owner_id,
        upload: command.upload,
    };

    let task = tokio::spawn(async move { coordinator.ingest(request, &cancel).await });

    Ok(task.await??)
}
