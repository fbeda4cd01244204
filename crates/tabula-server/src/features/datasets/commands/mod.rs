pub mod upload;

pub use upload::{UploadDatasetCommand, UploadDatasetError};
