//! Dataset retrieval
//!
//! Resolves the dataset record, then reads at most [`MAX_ROWS_PER_PAGE`] rows
//! from its backing table ordered by `row_ordinal`. The cap is fixed.

use serde::Serialize;
use serde_json::{Map, Value};
use sqlx::{postgres::PgRow, Column, Row};
use thiserror::Error;
use uuid::Uuid;

use crate::catalog::{CatalogError, DatasetRecord};
use crate::db::{has_sqlstate, quote_identifier, UNDEFINED_TABLE};
use crate::error::ErrorKind;
use crate::ingest::schema::ROW_ORDINAL_COLUMN;
use crate::stores::Stores;

pub const MAX_ROWS_PER_PAGE: i64 = 1000;

#[derive(Debug, Error)]
pub enum RetrieveError {
    #[error("Dataset '{0}' not found")]
    NotFound(Uuid),

    #[error("Backing table '{0}' does not exist")]
    MissingTable(String),

    #[error("Backing table '{table_name}' could not be read: {source}")]
    UnreadableTable {
        table_name: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Document store read failed: {0}")]
    Catalog(#[source] sqlx::Error),
}

impl RetrieveError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RetrieveError::NotFound(_) => ErrorKind::NotFound,
            RetrieveError::MissingTable(_) | RetrieveError::UnreadableTable { .. } => {
                ErrorKind::DataUnavailable
            },
            RetrieveError::Catalog(_) => ErrorKind::StoreUnavailable,
        }
    }
}

impl From<CatalogError> for RetrieveError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::NotFound(id) => RetrieveError::NotFound(id),
            CatalogError::Store(e) => RetrieveError::Catalog(e),
        }
    }
}

/// Metadata plus the first page of rows
#[derive(Debug, Clone, Serialize)]
pub struct DatasetPage {
    pub metadata: DatasetRecord,
    /// Rows keyed by original column name, in `row_ordinal` order
    pub data: Vec<Map<String, Value>>,
}

#[derive(Clone)]
pub struct RetrievalService {
    stores: Stores,
}

impl RetrievalService {
    pub fn new(stores: Stores) -> Self {
        Self { stores }
    }

    #[tracing::instrument(skip(self))]
    pub async fn retrieve(&self, id: Uuid) -> Result<DatasetPage, RetrieveError> {
        let metadata = self.stores.catalog.get(id).await?;
        let data = self.fetch_rows(&metadata.table_name).await?;

        tracing::debug!(rows = data.len(), table_name = %metadata.table_name, "Dataset rows read");

        Ok(DatasetPage { metadata, data })
    }

    async fn fetch_rows(&self, table_name: &str) -> Result<Vec<Map<String, Value>>, RetrieveError> {
        let sql = format!(
            "SELECT * FROM {} ORDER BY {} LIMIT $1",
            quote_identifier(table_name),
            quote_identifier(ROW_ORDINAL_COLUMN)
        );

        let unreadable = |source| RetrieveError::UnreadableTable {
            table_name: table_name.to_string(),
            source,
        };

        let rows = sqlx::query(&sql)
            .bind(MAX_ROWS_PER_PAGE)
            .fetch_all(&self.stores.rows)
            .await
            .map_err(|e| {
                if has_sqlstate(&e, UNDEFINED_TABLE) {
                    RetrieveError::MissingTable(table_name.to_string())
                } else {
                    unreadable(e)
                }
            })?;

        rows.iter()
            .map(row_to_json)
            .collect::<Result<_, _>>()
            .map_err(unreadable)
    }
}

/// Decode a backing-table row: `row_ordinal` as a number, everything else text
fn row_to_json(row: &PgRow) -> Result<Map<String, Value>, sqlx::Error> {
    let mut object = Map::with_capacity(row.len());

    for column in row.columns() {
        let name = column.name();
        let value = if name == ROW_ORDINAL_COLUMN {
            Value::from(row.try_get::<i64, _>(column.ordinal())?)
        } else {
            row.try_get::<Option<String>, _>(column.ordinal())?
                .map_or(Value::Null, Value::String)
        };
        object.insert(name.to_string(), value);
    }

    Ok(object)
}
