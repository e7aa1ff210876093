//! CSV reading and writing

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{ConvertError, Result};
use crate::format::SourceFormat;
use crate::metadata::FormatMetadata;
use crate::registry::{Converted, Reconstructor, ToJsonConverter};
use crate::value::{infer_scalar, render_cell};

fn delimiter_byte(delimiter: char) -> Result<u8> {
    u8::try_from(delimiter)
        .ok()
        .filter(|b| b.is_ascii())
        .ok_or_else(|| ConvertError::Malformed(format!("delimiter '{delimiter}' is not ASCII")))
}

fn column_name(headers: &[String], index: usize) -> String {
    headers
        .get(index)
        .filter(|h| !h.is_empty())
        .cloned()
        .unwrap_or_else(|| format!("column{}", index + 1))
}

pub struct CsvConverter;

impl ToJsonConverter for CsvConverter {
    fn format(&self) -> SourceFormat {
        SourceFormat::Csv
    }

    fn to_json(&self, input: &[u8], hints: &FormatMetadata) -> Result<Converted> {
        let input = input.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(input);
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter_byte(hints.csv_delimiter)?)
            .has_headers(hints.csv_has_headers)
            .flexible(true)
            .from_reader(input);

        let headers: Vec<String> = if hints.csv_has_headers {
            reader
                .headers()?
                .iter()
                .map(|h| h.trim().to_string())
                .collect()
        } else {
            Vec::new()
        };

        let mut records = Vec::new();
        let mut widest = headers.len();
        for row in reader.records() {
            let row = row?;
            widest = widest.max(row.len());
            let mut record = Map::new();
            for (index, cell) in row.iter().enumerate() {
                record.insert(column_name(&headers, index), infer_scalar(cell));
            }
            records.push(Value::Object(record));
        }

        debug!(rows = records.len(), columns = widest, "Parsed CSV");

        let metadata = FormatMetadata {
            original_format: Some(SourceFormat::Csv),
            csv_delimiter: hints.csv_delimiter,
            csv_has_headers: hints.csv_has_headers,
            column_headers: (0..widest).map(|i| column_name(&headers, i)).collect(),
            ..FormatMetadata::default()
        };

        Ok(Converted { records, metadata })
    }
}

pub struct CsvReconstructor;

impl Reconstructor for CsvReconstructor {
    fn format(&self) -> SourceFormat {
        SourceFormat::Csv
    }

    /// Columns come from the first record's keys; other records' missing
    /// keys render as empty cells and extra keys are dropped.
    fn reconstruct(&self, records: &[Value], metadata: &FormatMetadata) -> Result<Vec<u8>> {
        let columns: Vec<String> = match records.first() {
            Some(Value::Object(first)) => first.keys().cloned().collect(),
            Some(_) => vec!["value".to_string()],
            None => return Ok(Vec::new()),
        };

        let mut writer = csv::WriterBuilder::new()
            .delimiter(delimiter_byte(metadata.csv_delimiter)?)
            .from_writer(Vec::new());

        if metadata.csv_has_headers {
            writer.write_record(&columns)?;
        }

        for record in records {
            let row: Vec<String> = match record {
                Value::Object(map) => columns.iter().map(|c| render_cell(map.get(c))).collect(),
                scalar => {
                    let mut row = vec![String::new(); columns.len()];
                    row[0] = render_cell(Some(scalar));
                    row
                }
            };
            writer.write_record(&row)?;
        }

        writer
            .into_inner()
            .map_err(|e| ConvertError::Io(e.into_error()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_typed_cells() {
        let input = b"id,amount,active,name\n1,10.5,true,Alice\n2,,FALSE,Bob\n";
        let converted = CsvConverter.to_json(input, &FormatMetadata::default()).unwrap();

        assert_eq!(
            converted.records,
            vec![
                json!({"id": 1, "amount": 10.5, "active": true, "name": "Alice"}),
                json!({"id": 2, "amount": "", "active": false, "name": "Bob"}),
            ]
        );
        assert_eq!(converted.metadata.column_headers, vec!["id", "amount", "active", "name"]);
    }

    #[test]
    fn test_custom_delimiter_and_no_header() {
        let hints = FormatMetadata::default().with_delimiter(';').with_headers(false);
        let converted = CsvConverter.to_json(b"a;1\nb;2\n", &hints).unwrap();

        assert_eq!(converted.records[1], json!({"column1": "b", "column2": 2}));
        assert_eq!(converted.metadata.csv_delimiter, ';');
        assert!(!converted.metadata.csv_has_headers);
    }

    #[test]
    fn test_byte_order_mark_is_ignored() {
        let converted = CsvConverter
            .to_json(b"\xEF\xBB\xBFid\n7\n", &FormatMetadata::default())
            .unwrap();
        assert_eq!(converted.records, vec![json!({"id": 7})]);
    }

    #[test]
    fn test_reconstruct_uses_first_record_columns() {
        let records = vec![
            json!({"id": 1, "name": "a"}),
            json!({"name": "b", "extra": true}),
        ];
        let bytes = CsvReconstructor
            .reconstruct(&records, &FormatMetadata::default())
            .unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), "id,name\n1,a\n,b\n");
    }

    #[test]
    fn test_reconstruct_quotes_and_delimiter() {
        let records = vec![json!({"note": "a;b", "n": null})];
        let meta = FormatMetadata::default().with_delimiter(';');
        let bytes = CsvReconstructor.reconstruct(&records, &meta).unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), "note;n\n\"a;b\";\n");
    }

    #[test]
    fn test_non_ascii_delimiter_is_rejected() {
        let meta = FormatMetadata::default().with_delimiter('§');
        assert!(CsvConverter.to_json(b"a", &meta).is_err());
    }
}
