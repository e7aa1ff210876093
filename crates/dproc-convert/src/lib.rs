//! dproc Format Conversion Layer
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Stateless converters between tabular or structural file formats and a
//! normalized array of JSON records, in both directions.
//!
//! # Supported Formats
//!
//! - **CSV**: configurable delimiter and header row; cells are typed
//! - **XML**: repeated item elements under a root element
//! - **Excel**: first worksheet of an `.xlsx` workbook
//! - **JSON**: passthrough with record extraction
//!
//! Metadata captured while reading ([`FormatMetadata`]) is enough to
//! reconstruct output in the conventions of the original upload.
//!
//! # Example
//!
//! ```no_run
//! use dproc_convert::{ConverterRegistry, FormatMetadata};
//! use dproc_common::types::OutputFormat;
//!
//! fn main() -> anyhow::Result<()> {
//!     let registry = ConverterRegistry::with_defaults();
//!     let input = std::fs::read("orders.csv")?;
//!     let converted = registry.to_json("orders.csv", "text/csv", &input, &FormatMetadata::default())?;
//!
//!     let output = registry.reconstruct(&converted.records, &OutputFormat::Xml, &converted.metadata)?;
//!     std::fs::write("orders.xml", output.bytes)?;
//!     Ok(())
//! }
//! ```

pub mod delimited;
pub mod error;
pub mod excel;
pub mod format;
pub mod json;
pub mod metadata;
pub mod records;
pub mod registry;
pub mod value;
pub mod xml;

pub use error::{ConvertError, Result};
pub use format::SourceFormat;
pub use metadata::FormatMetadata;
pub use records::extract_records;
pub use registry::{Converted, ConverterRegistry, Reconstructed, Reconstructor, ToJsonConverter};
