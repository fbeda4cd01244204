//! Backing-table creation
//!
//! One table per upload. The provisioner never reuses an existing table: any
//! table already present under the generated name is a collision.

use sqlx::PgPool;
use thiserror::Error;

use super::schema::{TableSchema, MAX_IDENTIFIER_BYTES};
use crate::db::{has_sqlstate, quote_identifier, DUPLICATE_TABLE};

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("Backing table '{0}' already exists")]
    Collision(String),

    #[error("Invalid backing table name '{0}'")]
    InvalidName(String),

    #[error("Failed to create backing table '{table_name}': {source}")]
    Store {
        table_name: String,
        #[source]
        source: sqlx::Error,
    },
}

/// Build the `CREATE TABLE` statement for a schema
///
/// No `IF NOT EXISTS`: a concurrent create must surface as a collision.
pub fn create_table_sql(table_name: &str, schema: &TableSchema) -> String {
    let columns: Vec<String> = schema
        .columns()
        .iter()
        .enumerate()
        .map(|(idx, column)| {
            let key = if idx == 0 { " PRIMARY KEY" } else { "" };
            format!(
                "{} {}{}",
                quote_identifier(&column.name),
                column.column_type.sql_type(),
                key
            )
        })
        .collect();

    format!(
        "CREATE TABLE {} ({})",
        quote_identifier(table_name),
        columns.join(", ")
    )
}

/// Whether a table with this name is visible in the current schema
pub async fn table_exists(pool: &PgPool, table_name: &str) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar(
        r#"
        SELECT EXISTS (
            SELECT 1
            FROM information_schema.tables
            WHERE table_schema = current_schema()
              AND table_name = $1
        )
        "#,
    )
    .bind(table_name)
    .fetch_one(pool)
    .await
}

/// Create an empty backing table for `schema`
#[tracing::instrument(skip(pool, schema), fields(columns = schema.columns().len()))]
pub async fn provision_table(
    pool: &PgPool,
    table_name: &str,
    schema: &TableSchema,
) -> Result<(), ProvisionError> {
    if table_name.is_empty() || table_name.len() > MAX_IDENTIFIER_BYTES {
        return Err(ProvisionError::InvalidName(table_name.to_string()));
    }

    let store_err = |source| ProvisionError::Store {
        table_name: table_name.to_string(),
        source,
    };

    if table_exists(pool, table_name).await.map_err(store_err)? {
        return Err(ProvisionError::Collision(table_name.to_string()));
    }

    sqlx::query(&create_table_sql(table_name, schema))
        .execute(pool)
        .await
        .map_err(|e| {
            if has_sqlstate(&e, DUPLICATE_TABLE) {
                ProvisionError::Collision(table_name.to_string())
            } else {
                store_err(e)
            }
        })?;

    tracing::debug!("Backing table created");

    Ok(())
}
