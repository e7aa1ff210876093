//! dproc Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, logging, and error handling for the dproc pipeline.
//!
//! # Overview
//!
//! This crate is used by every dproc workspace member:
//!
//! - **Error Handling**: [`DprocError`] and the crate [`Result`] alias
//! - **Logging**: `tracing` subscriber setup driven by environment variables
//! - **Types**: pipeline events, metric definitions, output destinations and
//!   invalid-record entities shared between the converter and the server
//!
//! # Example
//!
//! ```no_run
//! use dproc_common::types::{ValidationRequestEvent, PayloadSource};
//!
//! fn describe(event: &ValidationRequestEvent) -> &'static str {
//!     match event.payload_source() {
//!         PayloadSource::Staged(_) => "staged",
//!         PayloadSource::Inline(_) => "inline",
//!         PayloadSource::Missing => "missing",
//!     }
//! }
//! ```

pub mod error;
pub mod logging;
pub mod path;
pub mod types;

// Re-export commonly used types
pub use error::{DprocError, Result};
pub use path::RecordPath;
