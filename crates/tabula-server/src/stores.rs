//! Process-scoped store handles
//!
//! Built once at startup, cloned into the ingestion coordinator and the
//! retrieval service, and closed on shutdown.

use sqlx::PgPool;
use std::sync::Arc;

use crate::catalog::{DatasetCatalog, PgDocumentCatalog};
use crate::config::Config;
use crate::db::{self, DbResult};

#[derive(Clone)]
pub struct Stores {
    /// Relational store holding backing tables
    pub rows: PgPool,
    /// Document store holding dataset records
    pub catalog: Arc<dyn DatasetCatalog>,
}

impl Stores {
    pub fn new(rows: PgPool, catalog: Arc<dyn DatasetCatalog>) -> Self {
        Self { rows, catalog }
    }

    /// Open both pools and migrate the document store
    pub async fn connect(config: &Config) -> DbResult<Self> {
        let rows = db::create_pool(&config.database).await?;
        let catalog_pool = db::create_pool(&config.catalog).await?;

        let catalog = PgDocumentCatalog::new(catalog_pool);
        catalog.migrate().await?;
        tracing::info!("Document store migrations completed");

        Ok(Self::new(rows, Arc::new(catalog)))
    }

    pub async fn close(&self) {
        self.rows.close().await;
        self.catalog.close().await;
        tracing::info!("Store connections closed");
    }
}
