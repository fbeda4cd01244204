//! Upload ingestion pipeline
//!
//! - [`upload`]: validation and staging of the uploaded file
//! - [`parser`]: streaming delimited-text parser
//! - [`schema`]: column set derived from the header row
//! - [`naming`]: backing-table names
//! - [`provisioner`]: backing-table creation
//! - [`loader`]: ordered, verified bulk insert
//! - [`coordinator`]: the per-upload state machine tying them together
//! - [`orphans`]: detection of tables and records left inconsistent by failures

pub mod coordinator;
pub mod loader;
pub mod naming;
pub mod orphans;
pub mod parser;
pub mod provisioner;
pub mod schema;
pub mod upload;

pub use coordinator::{IngestError, IngestRequest, IngestionCoordinator, IngestionState};
pub use naming::{FixedTableNamer, TableNamer, TimestampTableNamer};
pub use orphans::{find_orphan_tables, OrphanReport};
pub use upload::{validate_upload, StagedUpload, UploadError};
