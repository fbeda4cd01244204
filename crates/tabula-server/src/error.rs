//! Error kinds surfaced to API clients
//!
//! Component errors carry full diagnostic detail and are logged where they
//! are handled. Clients only ever see the kind: a stable code, a status and a
//! generic message.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::api::response::ErrorResponse;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Malformed or empty source file
    Parse,
    /// No columns derivable from the header
    Schema,
    /// Backing-table creation failed or collided
    Provision,
    /// Row write failed or row count did not verify
    Load,
    /// Dataset record could not be written
    Registration,
    /// Unknown dataset identity
    NotFound,
    /// Dataset record exists but its backing table is missing or unreadable
    DataUnavailable,
    /// Upload rejected before ingestion started
    InvalidUpload,
    /// No usable requester identity
    Unauthorized,
    /// A store could not be reached outside the ingestion pipeline
    StoreUnavailable,
    /// Ingestion abandoned because the client went away
    Cancelled,
    Internal,
}

impl ErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::Parse => "PARSE_ERROR",
            ErrorKind::Schema => "SCHEMA_ERROR",
            ErrorKind::Provision => "PROVISION_ERROR",
            ErrorKind::Load => "LOAD_ERROR",
            ErrorKind::Registration => "REGISTRATION_ERROR",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::DataUnavailable => "DATA_UNAVAILABLE",
            ErrorKind::InvalidUpload => "VALIDATION_ERROR",
            ErrorKind::Unauthorized => "UNAUTHORIZED",
            ErrorKind::StoreUnavailable => "STORE_UNAVAILABLE",
            ErrorKind::Cancelled => "CANCELLED",
            ErrorKind::Internal => "INTERNAL_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ErrorKind::Parse | ErrorKind::Schema => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::InvalidUpload => StatusCode::BAD_REQUEST,
            ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::DataUnavailable | ErrorKind::StoreUnavailable => {
                StatusCode::SERVICE_UNAVAILABLE
            },
            ErrorKind::Provision
            | ErrorKind::Load
            | ErrorKind::Registration
            | ErrorKind::Cancelled
            | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-facing message; never includes store error text
    pub fn message(&self) -> &'static str {
        match self {
            ErrorKind::Parse => "The uploaded file could not be parsed",
            ErrorKind::Schema => "No columns could be derived from the file header",
            ErrorKind::Provision => "Storage for the dataset could not be created",
            ErrorKind::Load => "The dataset rows could not be stored",
            ErrorKind::Registration => "The dataset could not be registered",
            ErrorKind::NotFound => "Dataset not found",
            ErrorKind::DataUnavailable => "The dataset's data is currently unavailable",
            ErrorKind::InvalidUpload => "Invalid upload",
            ErrorKind::Unauthorized => "A valid user identity is required",
            ErrorKind::StoreUnavailable => "A backing store is unavailable",
            ErrorKind::Cancelled => "The upload was cancelled",
            ErrorKind::Internal => "An internal error occurred",
        }
    }
}

impl IntoResponse for ErrorKind {
    fn into_response(self) -> Response {
        let body = ErrorResponse::new(self.code(), self.message());
        (self.status(), Json(body)).into_response()
    }
}
