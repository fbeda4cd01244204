//! Cross-store orphan detection
//!
//! A backing table with no dataset record, or a record whose table is gone.
//! Detection only; nothing here drops tables or deletes records.

use serde::Serialize;
use sqlx::PgPool;
use std::collections::HashSet;
use thiserror::Error;

use super::naming::is_backing_table_name;
use crate::catalog::CatalogError;
use crate::stores::Stores;

#[derive(Debug, Error)]
pub enum OrphanScanError {
    #[error("Failed to list backing tables: {0}")]
    Rows(#[from] sqlx::Error),

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct OrphanReport {
    /// Backing tables that no dataset record points to
    pub orphan_tables: Vec<String>,
    /// Table names referenced by records but missing from the relational store
    pub dangling_records: Vec<String>,
}

impl OrphanReport {
    pub fn is_clean(&self) -> bool {
        self.orphan_tables.is_empty() && self.dangling_records.is_empty()
    }
}

/// Compare what exists against what is registered
pub fn reconcile(existing: &HashSet<String>, registered: &HashSet<String>) -> OrphanReport {
    let mut orphan_tables: Vec<String> = existing
        .iter()
        .filter(|name| is_backing_table_name(name) && !registered.contains(*name))
        .cloned()
        .collect();
    let mut dangling_records: Vec<String> = registered.difference(existing).cloned().collect();

    orphan_tables.sort();
    dangling_records.sort();

    OrphanReport {
        orphan_tables,
        dangling_records,
    }
}

/// Names of all tables in the current schema matching the backing-table pattern
pub async fn backing_tables(pool: &PgPool) -> Result<HashSet<String>, sqlx::Error> {
    let names: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT table_name::text
        FROM information_schema.tables
        WHERE table_schema = current_schema()
          AND table_name LIKE 'data\_%'
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(names
        .into_iter()
        .filter(|name| is_backing_table_name(name))
        .collect())
}

/// Scan both stores for orphans
#[tracing::instrument(skip(stores))]
pub async fn find_orphan_tables(stores: &Stores) -> Result<OrphanReport, OrphanScanError> {
    let existing = backing_tables(&stores.rows).await?;
    let registered = stores.catalog.table_names().await?;

    let report = reconcile(&existing, &registered);
    tracing::debug!(
        tables = existing.len(),
        records = registered.len(),
        orphan_tables = report.orphan_tables.len(),
        dangling_records = report.dangling_records.len(),
        "Orphan scan complete"
    );

    Ok(report)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn set(names: &[&str]) -> HashSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_reconcile_clean() {
        let names = set(&["data_1_1", "data_2_2"]);
        assert!(reconcile(&names, &names).is_clean());
    }

    #[test]
    fn test_reconcile_finds_both_directions() {
        let existing = set(&["data_1_1", "data_3_3", "data_2_2"]);
        let registered = set(&["data_1_1", "data_9_9"]);

        let report = reconcile(&existing, &registered);
        assert_eq!(report.orphan_tables, vec!["data_2_2", "data_3_3"]);
        assert_eq!(report.dangling_records, vec!["data_9_9"]);
        assert!(!report.is_clean());
    }

    #[test]
    fn test_reconcile_ignores_unrelated_tables() {
        let existing = set(&["dataset_documents", "data_1_1", "data_x_1"]);
        let registered = set(&["data_1_1"]);

        assert!(reconcile(&existing, &registered).is_clean());
    }
}
