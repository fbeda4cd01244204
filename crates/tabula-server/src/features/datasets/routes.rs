use crate::api::response::{ApiResponse, ErrorResponse};
use crate::error::ErrorKind;
use crate::ingest::{validate_upload, StagedUpload, UploadError};
use crate::retrieval::RetrieveError;
use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;

use super::{
    commands::{self, UploadDatasetCommand, UploadDatasetError},
    queries::{self, GetDatasetQuery, ListDatasetsError, ListDatasetsQuery},
    requester::Requester,
    DatasetsState,
};

/// Multipart field carrying the file
const FILE_FIELD: &str = "file";

pub fn datasets_routes(max_upload_bytes: usize) -> Router<DatasetsState> {
    Router::new()
        .route("/", get(list_datasets))
        .route(
            "/upload",
            post(upload_dataset).layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .route("/:id", get(get_dataset))
}

#[tracing::instrument(skip(state, multipart), fields(owner_id = %owner_id))]
async fn upload_dataset(
    State(state): State<DatasetsState>,
    Requester(owner_id): Requester,
    mut multipart: Multipart,
) -> Result<Response, DatasetApiError> {
    let mut staged = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| UploadError::Body(Box::new(e)))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let original_name = field.file_name().unwrap_or_default().to_string();
        validate_upload(&original_name, field.content_type())?;

        staged = Some(StagedUpload::stage(&state.upload_dir, original_name, field).await?);
        break;
    }

    let upload = staged.ok_or(UploadError::NoFile)?;
    let record = commands::upload::handle(
        state.coordinator.clone(),
        UploadDatasetCommand { owner_id, upload },
    )
    .await?;

    Ok(ApiResponse::created(record))
}

#[tracing::instrument(skip(state), fields(owner_id = %owner_id))]
async fn list_datasets(
    State(state): State<DatasetsState>,
    Requester(owner_id): Requester,
) -> Result<Response, DatasetApiError> {
    let datasets =
        queries::list::handle(state.catalog.clone(), ListDatasetsQuery { owner_id }).await?;

    Ok(ApiResponse::success(datasets).into_response())
}

#[tracing::instrument(skip(state, _requester))]
async fn get_dataset(
    State(state): State<DatasetsState>,
    _requester: Requester,
    Path(id): Path<String>,
) -> Result<Response, DatasetApiError> {
    // An id that is not a UUID cannot name a dataset
    let id = Uuid::parse_str(&id).map_err(|_| DatasetApiError::UnknownId)?;

    let page = queries::get::handle(&state.retrieval, GetDatasetQuery { id }).await?;

    Ok(ApiResponse::success(page).into_response())
}

#[derive(Debug, thiserror::Error)]
enum DatasetApiError {
    #[error(transparent)]
    Upload(#[from] UploadError),
    #[error(transparent)]
    Ingest(#[from] UploadDatasetError),
    #[error(transparent)]
    List(#[from] ListDatasetsError),
    #[error(transparent)]
    Get(#[from] RetrieveError),
    #[error("Dataset id is not a UUID")]
    UnknownId,
}

impl DatasetApiError {
    fn kind(&self) -> ErrorKind {
        match self {
            DatasetApiError::Upload(UploadError::Io(_)) => ErrorKind::Internal,
            DatasetApiError::Upload(_) => ErrorKind::InvalidUpload,
            DatasetApiError::Ingest(e) => e.kind(),
            DatasetApiError::List(e) => e.kind(),
            DatasetApiError::Get(e) => e.kind(),
            DatasetApiError::UnknownId => ErrorKind::NotFound,
        }
    }
}

impl IntoResponse for DatasetApiError {
    fn into_response(self) -> Response {
        let kind = self.kind();

        if kind.status().is_server_error() {
            tracing::error!(code = kind.code(), error = %self, "Dataset request failed");
        } else {
            tracing::debug!(code = kind.code(), error = %self, "Dataset request rejected");
        }

        match self {
            // Validation messages are safe and useful to show as-is
            DatasetApiError::Upload(ref e @ (UploadError::NoFile | UploadError::InvalidFileType { .. })) => {
                let error = ErrorResponse::new(kind.code(), e.to_string());
                (kind.status(), Json(error)).into_response()
            },
            _ => kind.into_response(),
        }
    }
}
