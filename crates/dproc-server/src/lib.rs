//! dproc server library
//!
//! Event-driven validation and output pipeline for ingested data files.
//!
//! # Overview
//!
//! - **Staging cache**: TTL key/value maps (`file-content`, `valid-records`)
//!   used to hand large payloads between stages
//! - **Validation**: per-data-source JSON Schema checks with field-level error detail
//! - **Metrics**: business aggregates and category counts over valid records
//! - **Orchestrator**: fetch, validate, calculate, stage and announce each file
//! - **Output**: per-destination reconstruction and delivery with retry,
//!   circuit breaking and dead-lettering
//! - **Invalid records**: correction and reprocessing over HTTP
//!
//! # Architecture
//!
//! The HTTP surface follows a CQRS layout: every write is a command and every
//! read a query, each with its own request type, error enum and `handle`
//! function under `features/`. The pipeline components are wired once in
//! [`pipeline::Pipeline`] and shared through `Arc`s.
//!
//! # Example
//!
//! ```no_run
//! use dproc_server::{config::Config, pipeline::Pipeline};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     let pipeline = Pipeline::build(&config).await?;
//!     let shutdown = pipeline.shutdown_token();
//!     let workers = pipeline.start();
//!     shutdown.cancel();
//!     workers.join().await;
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod api;
pub mod bus;
pub mod cache;
pub mod config;
pub mod cqrs;
pub mod datasource;
pub mod features;
pub mod metrics;
pub mod middleware;
pub mod orchestrator;
pub mod output;
pub mod pipeline;
pub mod store;
pub mod validation;
