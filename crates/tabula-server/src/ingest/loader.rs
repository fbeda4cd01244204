//! Bulk row loading
//!
//! All rows go in through one transaction using chunked multi-row `INSERT`s.
//! Each row's `row_ordinal` is its 1-based position in the parsed sequence.
//! Before commit the table's row count is checked against the expected count;
//! a mismatch rolls the whole load back.

use sqlx::{PgPool, Postgres, QueryBuilder};
use thiserror::Error;

use super::parser::ParsedRecord;
use super::schema::TableSchema;
use crate::db::quote_identifier;

/// Postgres caps bind parameters per statement at 65535
const MAX_BIND_PARAMS: usize = 65_535;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Record {ordinal} has field '{column}' that is not in the table schema")]
    UnknownColumn { ordinal: i64, column: String },

    #[error("Expected {expected} rows in '{table_name}' after insert, found {actual}")]
    CountMismatch {
        table_name: String,
        expected: i64,
        actual: i64,
    },

    #[error("Failed writing rows to '{table_name}': {source}")]
    Store {
        table_name: String,
        #[source]
        source: sqlx::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadSummary {
    pub rows_loaded: i64,
    /// Values past the end of the header row that had no column to go to
    pub dropped_fields: usize,
}

/// Rows per `INSERT` so a statement never exceeds the bind limit
pub fn rows_per_statement(schema: &TableSchema) -> usize {
    (MAX_BIND_PARAMS / schema.columns().len()).max(1)
}

/// Check every record maps onto the schema and count dropped extras
fn check_records(schema: &TableSchema, records: &[ParsedRecord]) -> Result<usize, LoadError> {
    let mut dropped = 0;
    for (ordinal, record) in (1_i64..).zip(records) {
        if let Some(column) = record.fields.keys().find(|k| !schema.has_source(k)) {
            return Err(LoadError::UnknownColumn {
                ordinal,
                column: column.clone(),
            });
        }
        dropped += record.unmapped.len();
    }
    Ok(dropped)
}

/// Insert every record into `table_name`, all or nothing
#[tracing::instrument(skip(pool, schema, records), fields(rows = records.len()))]
pub async fn load_rows(
    pool: &PgPool,
    table_name: &str,
    schema: &TableSchema,
    records: &[ParsedRecord],
) -> Result<LoadSummary, LoadError> {
    let dropped_fields = check_records(schema, records)?;
    if dropped_fields > 0 {
        tracing::warn!(dropped_fields, "Dropping values beyond the header row");
    }

    let store_err = |source| LoadError::Store {
        table_name: table_name.to_string(),
        source,
    };

    let column_list = schema
        .columns()
        .iter()
        .map(|c| quote_identifier(&c.name))
        .collect::<Vec<_>>()
        .join(", ");
    let insert_prefix = format!(
        "INSERT INTO {} ({}) ",
        quote_identifier(table_name),
        column_list
    );

    let mut tx = pool.begin().await.map_err(store_err)?;

    let chunk_size = rows_per_statement(schema);
    let mut next_ordinal: i64 = 1;

    for chunk in records.chunks(chunk_size) {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(&insert_prefix);
        let ordinals = next_ordinal..;
        builder.push_values(chunk.iter().zip(ordinals), |mut row, (record, ordinal)| {
            row.push_bind(ordinal);
            for column in schema.data_columns() {
                // Absent fields from short rows are stored as NULL
                let value = column
                    .source
                    .as_deref()
                    .and_then(|source| record.get(source))
                    .map(str::to_string);
                row.push_bind(value);
            }
        });

        builder.build().execute(&mut *tx).await.map_err(store_err)?;
        next_ordinal += chunk.len() as i64;
    }

    let expected = records.len() as i64;
    let actual: i64 = sqlx::query_scalar(&format!(
        "SELECT COUNT(*) FROM {}",
        quote_identifier(table_name)
    ))
    .fetch_one(&mut *tx)
    .await
    .map_err(store_err)?;

    if actual != expected {
        // Dropping `tx` rolls back
        return Err(LoadError::CountMismatch {
            table_name: table_name.to_string(),
            expected,
            actual,
        });
    }

    tx.commit().await.map_err(store_err)?;

    tracing::debug!(rows_loaded = expected, "Rows committed");

    Ok(LoadSummary {
        rows_loaded: expected,
        dropped_fields,
    })
}
