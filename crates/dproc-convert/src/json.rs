//! JSON passthrough

use serde_json::Value;

use crate::error::Result;
use crate::format::SourceFormat;
use crate::metadata::FormatMetadata;
use crate::records::parse_records;
use crate::registry::{Converted, Reconstructor, ToJsonConverter};

pub struct JsonConverter;

impl ToJsonConverter for JsonConverter {
    fn format(&self) -> SourceFormat {
        SourceFormat::Json
    }

    fn to_json(&self, input: &[u8], _hints: &FormatMetadata) -> Result<Converted> {
        let text = std::str::from_utf8(input)?;
        Ok(Converted {
            records: parse_records(text)?,
            metadata: FormatMetadata::for_format(SourceFormat::Json),
        })
    }
}

pub struct JsonReconstructor;

impl Reconstructor for JsonReconstructor {
    fn format(&self) -> SourceFormat {
        SourceFormat::Json
    }

    fn reconstruct(&self, records: &[Value], _metadata: &FormatMetadata) -> Result<Vec<u8>> {
        write_array(records)
    }
}

/// Indented JSON array of the records.
pub fn write_array(records: &[Value]) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec_pretty(records)?)
}
