//! Converter registry
//!
//! Readers and reconstructors are registered once at start-up and selected
//! by a `can_read` predicate or by target format.

use dproc_common::types::OutputFormat;
use serde_json::Value;
use tracing::{debug, warn};

use crate::delimited::{CsvConverter, CsvReconstructor};
use crate::error::{ConvertError, Result};
use crate::excel::{ExcelConverter, ExcelReconstructor};
use crate::format::SourceFormat;
use crate::json::{JsonConverter, JsonReconstructor};
use crate::metadata::FormatMetadata;
use crate::xml::{XmlConverter, XmlReconstructor};

/// Records read from a file plus the conventions needed to write them back.
#[derive(Debug, Clone, PartialEq)]
pub struct Converted {
    pub records: Vec<Value>,
    pub metadata: FormatMetadata,
}

/// Parses one source format into JSON records.
pub trait ToJsonConverter: Send + Sync {
    fn format(&self) -> SourceFormat;

    fn can_read(&self, file_name: &str, content_type: &str) -> bool {
        SourceFormat::detect(file_name, content_type) == Some(self.format())
    }

    /// `hints` carries reader settings such as the CSV delimiter.
    fn to_json(&self, input: &[u8], hints: &FormatMetadata) -> Result<Converted>;
}

/// Writes JSON records back out in one format.
pub trait Reconstructor: Send + Sync {
    fn format(&self) -> SourceFormat;

    fn reconstruct(&self, records: &[Value], metadata: &FormatMetadata) -> Result<Vec<u8>>;
}

/// Output of [`ConverterRegistry::reconstruct`].
#[derive(Debug, Clone, PartialEq)]
pub struct Reconstructed {
    pub bytes: Vec<u8>,
    pub format: SourceFormat,
    /// Set when the requested format had no reconstructor and JSON was used.
    pub degraded: bool,
}

#[derive(Default)]
pub struct ConverterRegistry {
    readers: Vec<Box<dyn ToJsonConverter>>,
    writers: Vec<Box<dyn Reconstructor>>,
}

impl ConverterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in JSON, CSV, XML and Excel implementations.
    pub fn with_defaults() -> Self {
        Self::new()
            .register_reader(JsonConverter)
            .register_reader(CsvConverter)
            .register_reader(XmlConverter)
            .register_reader(ExcelConverter)
            .register_writer(JsonReconstructor)
            .register_writer(CsvReconstructor)
            .register_writer(XmlReconstructor)
            .register_writer(ExcelReconstructor)
    }

    pub fn register_reader(mut self, reader: impl ToJsonConverter + 'static) -> Self {
        self.readers.push(Box::new(reader));
        self
    }

    pub fn register_writer(mut self, writer: impl Reconstructor + 'static) -> Self {
        self.writers.push(Box::new(writer));
        self
    }

    pub fn reader_for(&self, file_name: &str, content_type: &str) -> Option<&dyn ToJsonConverter> {
        self.readers
            .iter()
            .find(|r| r.can_read(file_name, content_type))
            .map(|r| r.as_ref())
    }

    pub fn writer_for(&self, format: SourceFormat) -> Option<&dyn Reconstructor> {
        self.writers
            .iter()
            .find(|w| w.format() == format)
            .map(|w| w.as_ref())
    }

    pub fn supported_formats(&self) -> Vec<SourceFormat> {
        self.readers.iter().map(|r| r.format()).collect()
    }

    /// Convert an uploaded file into JSON records.
    pub fn to_json(
        &self,
        file_name: &str,
        content_type: &str,
        input: &[u8],
        hints: &FormatMetadata,
    ) -> Result<Converted> {
        let reader = self.reader_for(file_name, content_type).ok_or_else(|| {
            ConvertError::Unsupported(format!("no reader for '{file_name}' ({content_type})"))
        })?;
        debug!(file = file_name, format = %reader.format(), bytes = input.len(), "Converting to JSON");
        reader.to_json(input, hints)
    }

    /// Resolve a requested output format against the metadata.
    ///
    /// `original` means the format recorded at ingestion, JSON when unknown.
    /// Returns `None` for names with no built-in format.
    pub fn resolve(target: &OutputFormat, metadata: &FormatMetadata) -> Option<SourceFormat> {
        match target {
            OutputFormat::Original => Some(metadata.original_format.unwrap_or(SourceFormat::Json)),
            OutputFormat::Json => Some(SourceFormat::Json),
            OutputFormat::Csv => Some(SourceFormat::Csv),
            OutputFormat::Xml => Some(SourceFormat::Xml),
            OutputFormat::Excel => Some(SourceFormat::Excel),
            OutputFormat::Other(_) => None,
        }
    }

    /// Write records in the requested format, degrading to a JSON array
    /// when no reconstructor exists for it.
    pub fn reconstruct(
        &self,
        records: &[Value],
        target: &OutputFormat,
        metadata: &FormatMetadata,
    ) -> Result<Reconstructed> {
        let writer = Self::resolve(target, metadata).and_then(|f| self.writer_for(f));

        match writer {
            Some(writer) => Ok(Reconstructed {
                bytes: writer.reconstruct(records, metadata)?,
                format: writer.format(),
                degraded: false,
            }),
            None => {
                warn!(requested = %target, "No reconstructor for output format, writing JSON");
                Ok(Reconstructed {
                    bytes: crate::json::write_array(records)?,
                    format: SourceFormat::Json,
                    degraded: true,
                })
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_reader_selection() {
        let registry = ConverterRegistry::with_defaults();
        assert_eq!(
            registry.reader_for("a.xml", "").map(|r| r.format()),
            Some(SourceFormat::Xml)
        );
        assert_eq!(
            registry.reader_for("upload.bin", "text/csv").map(|r| r.format()),
            Some(SourceFormat::Csv)
        );
        assert!(registry.reader_for("a.pdf", "application/pdf").is_none());
    }

    #[test]
    fn test_unsupported_input_is_an_error() {
        let registry = ConverterRegistry::with_defaults();
        let err = registry
            .to_json("a.pdf", "application/pdf", b"%PDF", &FormatMetadata::default())
            .unwrap_err();
        assert!(matches!(err, ConvertError::Unsupported(_)));
    }

    #[test]
    fn test_original_resolves_from_metadata() {
        let csv_meta = FormatMetadata::for_format(SourceFormat::Csv);
        assert_eq!(
            ConverterRegistry::resolve(&OutputFormat::Original, &csv_meta),
            Some(SourceFormat::Csv)
        );
        assert_eq!(
            ConverterRegistry::resolve(&OutputFormat::Original, &FormatMetadata::default()),
            Some(SourceFormat::Json)
        );
    }

    #[test]
    fn test_unknown_format_degrades_to_json() {
        let registry = ConverterRegistry::with_defaults();
        let records = vec![json!({"id": 1})];
        let out = registry
            .reconstruct(&records, &OutputFormat::Other("parquet".into()), &FormatMetadata::default())
            .unwrap();
        assert!(out.degraded);
        assert_eq!(out.format, SourceFormat::Json);
        let back: Vec<Value> = serde_json::from_slice(&out.bytes).unwrap();
        assert_eq!(back, records);
    }

    #[test]
    fn test_missing_writer_degrades_to_json() {
        let registry = ConverterRegistry::new().register_reader(JsonConverter);
        let out = registry
            .reconstruct(&[json!({"a": "b"})], &OutputFormat::Csv, &FormatMetadata::default())
            .unwrap();
        assert!(out.degraded);
        assert_eq!(out.format, SourceFormat::Json);
    }
}
