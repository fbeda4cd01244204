//! Tabula Server Library
//!
//! Ingests uploaded CSV files into per-upload relational tables and serves
//! the stored rows back for charting.
//!
//! # Overview
//!
//! - **Ingestion**: parse, infer a schema, create a backing table, bulk load,
//!   then register a dataset record ([`ingest`])
//! - **Retrieval**: ordered, capped reads of a dataset's rows ([`retrieval`])
//! - **Catalog**: dataset records in a document store ([`catalog`])
//! - **Presence**: WebSocket cursor fan-out per dataset room ([`presence`])
//!
//! # Stores
//!
//! Two independent stores are used. Backing tables live in the relational
//! store; dataset records live in the document store. They share no
//! transaction, so the pipeline always commits rows before it writes the
//! record, and [`ingest::orphans`] detects tables left without one.
//!
//! # Framework Stack
//!
//! - **Axum**: HTTP and WebSocket handling
//! - **SQLx**: PostgreSQL access for both stores
//! - **Tower**: Middleware and service abstractions
//!
//! # Example
//!
//! ```no_run
//! use tabula_server::{api, config::Config, stores::Stores};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     let stores = Stores::connect(&config).await?;
//!     let app = api::create_router(api::AppState::new(stores), &config);
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:5000").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod api;
pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod features;
pub mod ingest;
pub mod middleware;
pub mod presence;
pub mod retrieval;
pub mod stores;

// Re-export commonly used types
pub use error::ErrorKind;
