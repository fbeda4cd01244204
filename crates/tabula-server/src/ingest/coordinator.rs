//! Ingestion coordinator
//!
//! Runs one upload through the pipeline as a strict state machine:
//!
//! ```text
//! Received -> Parsed -> SchemaInferred -> TableProvisioned -> RowsLoaded -> MetadataRegistered
//!     \__________\______________\_________________\________________\____-> Failed
//! ```
//!
//! The two stores share no transaction. Rows are always committed before the
//! dataset record is written, so the only possible inconsistency is a backing
//! table with no record. Such orphans are logged and left in place; they are
//! recognisable by their `data_<millis>_<n>` name and the missing record.
//! Nothing is retried. The staged upload is deleted on every exit path.

use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::loader::{load_rows, LoadError};
use super::naming::{TableNamer, TimestampTableNamer};
use super::parser::{ParseError, ParsedRecord, RecordStream};
use super::provisioner::{provision_table, ProvisionError};
use super::schema::{infer_schema, SchemaError};
use super::upload::StagedUpload;
use crate::catalog::{DatasetRecord, NewDataset, RegistrationError};
use crate::error::ErrorKind;
use crate::stores::Stores;

/// Records parsed between cancellation checks
const CANCEL_CHECK_INTERVAL: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestionState {
    Received,
    Parsed,
    SchemaInferred,
    TableProvisioned,
    RowsLoaded,
    MetadataRegistered,
    Failed,
}

impl IngestionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            IngestionState::Received => "received",
            IngestionState::Parsed => "parsed",
            IngestionState::SchemaInferred => "schema_inferred",
            IngestionState::TableProvisioned => "table_provisioned",
            IngestionState::RowsLoaded => "rows_loaded",
            IngestionState::MetadataRegistered => "metadata_registered",
            IngestionState::Failed => "failed",
        }
    }

    /// The only state reachable on success
    pub fn next(&self) -> Option<Self> {
        match self {
            IngestionState::Received => Some(IngestionState::Parsed),
            IngestionState::Parsed => Some(IngestionState::SchemaInferred),
            IngestionState::SchemaInferred => Some(IngestionState::TableProvisioned),
            IngestionState::TableProvisioned => Some(IngestionState::RowsLoaded),
            IngestionState::RowsLoaded => Some(IngestionState::MetadataRegistered),
            IngestionState::MetadataRegistered | IngestionState::Failed => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            IngestionState::MetadataRegistered | IngestionState::Failed
        )
    }

    /// Whether failing after this state leaves a table without a record
    pub fn leaves_orphan(&self) -> bool {
        matches!(
            self,
            IngestionState::TableProvisioned | IngestionState::RowsLoaded
        )
    }
}

impl std::fmt::Display for IngestionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Provision(#[from] ProvisionError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Registration(#[from] RegistrationError),

    #[error("Ingestion cancelled after reaching '{0}'")]
    Cancelled(IngestionState),

    #[error("Failed to read staged upload: {0}")]
    Io(#[from] std::io::Error),
}

impl IngestError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            IngestError::Parse(_) => ErrorKind::Parse,
            IngestError::Schema(_) => ErrorKind::Schema,
            IngestError::Provision(_) => ErrorKind::Provision,
            IngestError::Load(_) => ErrorKind::Load,
            IngestError::Registration(_) => ErrorKind::Registration,
            IngestError::Cancelled(_) => ErrorKind::Cancelled,
            IngestError::Io(_) => ErrorKind::Internal,
        }
    }
}

/// One upload to ingest on behalf of `owner_id`
#[derive(Debug)]
pub struct IngestRequest {
    pub owner_id: Uuid,
    pub upload: StagedUpload,
}

/// Progress of a single run, used for transitions and failure logging
struct Run<'a> {
    upload_id: Uuid,
    state: IngestionState,
    table_name: Option<String>,
    cancel: &'a CancellationToken,
}

impl<'a> Run<'a> {
    fn new(cancel: &'a CancellationToken) -> Self {
        Self {
            upload_id: Uuid::new_v4(),
            state: IngestionState::Received,
            table_name: None,
            cancel,
        }
    }

    fn check_cancelled(&self) -> Result<(), IngestError> {
        if self.cancel.is_cancelled() {
            return Err(IngestError::Cancelled(self.state));
        }
        Ok(())
    }

    /// Move to the successor state
    ///
    /// Cancellation is honoured on every transition except the final one:
    /// once the record is written the upload has succeeded.
    fn advance(&mut self, next: IngestionState) -> Result<(), IngestError> {
        debug_assert_eq!(self.state.next(), Some(next));
        if !next.is_terminal() {
            self.check_cancelled()?;
        }
        self.state = next;
        tracing::debug!(
            upload_id = %self.upload_id,
            state = %next,
            table_name = self.table_name.as_deref().unwrap_or(""),
            "Ingestion state advanced"
        );
        Ok(())
    }

    /// Backing table created by this run that no dataset record points at
    ///
    /// Keyed on the table having been created, not on the state reached: a
    /// cancel can land between provisioning and the `TableProvisioned`
    /// transition.
    fn orphaned_table(&self) -> Option<&str> {
        match self.state {
            IngestionState::MetadataRegistered => None,
            _ => self.table_name.as_deref(),
        }
    }

    fn fail(&mut self, err: &IngestError) {
        let reached = self.state;
        self.state = IngestionState::Failed;

        match self.orphaned_table() {
            Some(table_name) => tracing::warn!(
                upload_id = %self.upload_id,
                state = %reached,
                %table_name,
                error = %err,
                "Ingestion failed; backing table left without a dataset record"
            ),
            None => tracing::warn!(
                upload_id = %self.upload_id,
                state = %reached,
                error = %err,
                "Ingestion failed"
            ),
        }
    }
}

/// Sequences parser, schema inference, provisioning, loading and registration
#[derive(Clone)]
pub struct IngestionCoordinator {
    stores: Stores,
    namer: Arc<dyn TableNamer>,
}

impl IngestionCoordinator {
    pub fn new(stores: Stores) -> Self {
        Self {
            stores,
            namer: Arc::new(TimestampTableNamer),
        }
    }

    /// Replace the backing-table namer
    pub fn with_namer(mut self, namer: Arc<dyn TableNamer>) -> Self {
        self.namer = namer;
        self
    }

    /// Ingest one staged upload, returning the new dataset record
    #[tracing::instrument(
        skip(self, request, cancel),
        fields(owner_id = %request.owner_id, original_name = %request.upload.original_name())
    )]
    pub async fn ingest(
        &self,
        request: IngestRequest,
        cancel: &CancellationToken,
    ) -> Result<DatasetRecord, IngestError> {
        let IngestRequest { owner_id, upload } = request;
        let mut run = Run::new(cancel);

        let result = self.run_pipeline(&mut run, owner_id, &upload).await;

        match &result {
            Ok(record) => tracing::info!(
                upload_id = %run.upload_id,
                dataset_id = %record.id,
                table_name = %record.table_name,
                row_count = record.row_count,
                "Dataset ingested"
            ),
            Err(err) => run.fail(err),
        }

        // Staged file is removed here whatever the outcome
        drop(upload);

        result
    }

    async fn run_pipeline(
        &self,
        run: &mut Run<'_>,
        owner_id: Uuid,
        upload: &StagedUpload,
    ) -> Result<DatasetRecord, IngestError> {
        run.check_cancelled()?;

        let (headers, records) = self.parse(run, upload).await?;
        run.advance(IngestionState::Parsed)?;

        let schema = infer_schema(&headers)?;
        run.advance(IngestionState::SchemaInferred)?;

        let table_name = self.namer.next_name();
        run.check_cancelled()?;
        provision_table(&self.stores.rows, &table_name, &schema).await?;
        run.table_name = Some(table_name.clone());
        run.advance(IngestionState::TableProvisioned)?;

        let summary = load_rows(&self.stores.rows, &table_name, &schema, &records).await?;
        run.advance(IngestionState::RowsLoaded)?;

        let record = self
            .stores
            .catalog
            .register(NewDataset {
                owner_id,
                filename: upload.filename().to_string(),
                original_name: upload.original_name().to_string(),
                table_name,
                row_count: summary.rows_loaded,
                size_bytes: upload.size_bytes() as i64,
                checksum: upload.checksum().to_string(),
            })
            .await?;
        run.advance(IngestionState::MetadataRegistered)?;

        Ok(record)
    }

    /// Read the whole staged file into memory
    async fn parse(
        &self,
        run: &Run<'_>,
        upload: &StagedUpload,
    ) -> Result<(Vec<String>, Vec<ParsedRecord>), IngestError> {
        if upload.is_empty() {
            return Err(ParseError::EmptySource.into());
        }

        let mut stream = RecordStream::open(upload.open().await?).await?;
        let headers = stream.headers().to_vec();

        let mut records = Vec::new();
        while let Some(record) = stream.next_record().await? {
            records.push(record);
            if records.len() % CANCEL_CHECK_INTERVAL == 0 {
                run.check_cancelled()?;
            }
        }

        Ok((headers, records))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_states_advance_sequentially() {
        let mut state = IngestionState::Received;
        let mut visited = vec![state];
        while let Some(next) = state.next() {
            state = next;
            visited.push(state);
        }

        assert_eq!(
            visited,
            vec![
                IngestionState::Received,
                IngestionState::Parsed,
                IngestionState::SchemaInferred,
                IngestionState::TableProvisioned,
                IngestionState::RowsLoaded,
                IngestionState::MetadataRegistered,
            ]
        );
        assert!(state.is_terminal());
    }

    #[test]
    fn test_failed_is_terminal() {
        assert!(IngestionState::Failed.is_terminal());
        assert_eq!(IngestionState::Failed.next(), None);
    }

    #[test]
    fn test_orphan_states() {
        assert!(!IngestionState::Received.leaves_orphan());
        assert!(!IngestionState::Parsed.leaves_orphan());
        assert!(!IngestionState::SchemaInferred.leaves_orphan());
        assert!(IngestionState::TableProvisioned.leaves_orphan());
        assert!(IngestionState::RowsLoaded.leaves_orphan());
        assert!(!IngestionState::MetadataRegistered.leaves_orphan());
    }

    #[test]
    fn test_advance_refuses_after_cancel() {
        let token = CancellationToken::new();
        let mut run = Run::new(&token);
        run.advance(IngestionState::Parsed).unwrap();

        token.cancel();
        let err = run.advance(IngestionState::SchemaInferred).unwrap_err();
        assert!(matches!(
            err,
            IngestError::Cancelled(IngestionState::Parsed)
        ));
        assert_eq!(run.state, IngestionState::Parsed);
    }

    #[test]
    fn test_final_transition_ignores_cancel() {
        let token = CancellationToken::new();
        let mut run = Run::new(&token);
        run.state = IngestionState::RowsLoaded;

        token.cancel();
        assert!(run.advance(IngestionState::MetadataRegistered).is_ok());
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            IngestError::from(ParseError::EmptySource).kind(),
            ErrorKind::Parse
        );
        assert_eq!(
            IngestError::from(SchemaError::NoColumns).kind(),
            ErrorKind::Schema
        );
        assert_eq!(
            IngestError::from(ProvisionError::Collision("data_1_1".into())).kind(),
            ErrorKind::Provision
        );
        assert_eq!(
            IngestError::Cancelled(IngestionState::RowsLoaded).kind(),
            ErrorKind::Cancelled
        );
    }

    #[test]
    fn test_fail_marks_state_failed() {
        let token = CancellationToken::new();
        let mut run = Run::new(&token);
        run.state = IngestionState::TableProvisioned;
        run.table_name = Some("data_1_1".to_string());

        run.fail(&IngestError::Cancelled(IngestionState::TableProvisioned));
        assert_eq!(run.state, IngestionState::Failed);
        assert_eq!(run.orphaned_table(), Some("data_1_1"));
    }

    #[test]
    fn test_cancel_after_provisioning_reports_orphan() {
        let token = CancellationToken::new();
        let mut run = Run::new(&token);
        run.state = IngestionState::SchemaInferred;
        run.table_name = Some("data_1_1".to_string());

        token.cancel();
        let err = run.advance(IngestionState::TableProvisioned).unwrap_err();
        assert!(matches!(
            err,
            IngestError::Cancelled(IngestionState::SchemaInferred)
        ));

        run.fail(&err);
        assert_eq!(run.state, IngestionState::Failed);
        assert_eq!(run.orphaned_table(), Some("data_1_1"));
    }

    #[test]
    fn test_failure_before_provisioning_has_no_orphan() {
        let token = CancellationToken::new();
        let mut run = Run::new(&token);
        run.state = IngestionState::SchemaInferred;

        run.fail(&IngestError::from(SchemaError::NoColumns));
        assert_eq!(run.orphaned_table(), None);
    }
}
