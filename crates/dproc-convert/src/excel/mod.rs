//! Excel (`.xlsx`) reading and writing
//!
//! Workbooks are handled directly as zip packages of SpreadsheetML parts.
//! Only the first worksheet is read; output is a single-sheet workbook.

mod reader;
mod writer;

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{ConvertError, Result};
use crate::format::SourceFormat;
use crate::metadata::FormatMetadata;
use crate::registry::{Converted, Reconstructor, ToJsonConverter};

pub use reader::{read_first_sheet, Sheet};
pub use writer::write_workbook;

/// Spreadsheet column letters for a zero-based index: 0 → A, 26 → AA.
pub fn column_letters(mut index: usize) -> String {
    let mut letters = Vec::new();
    loop {
        letters.push(b'A' + (index % 26) as u8);
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    letters.reverse();
    String::from_utf8_lossy(&letters).into_owned()
}

/// Number of columns a worksheet may have (`A` through `XFD`).
pub const MAX_COLUMNS: usize = 16_384;

/// Zero-based column index of a cell reference such as `AB12`.
///
/// `Ok(None)` when the reference has no column letters; references past
/// column `XFD` are malformed.
pub fn column_index(cell_ref: &str) -> Result<Option<usize>> {
    let mut index = 0usize;
    let mut seen = false;
    for b in cell_ref.bytes().take_while(|b| b.is_ascii_alphabetic()) {
        seen = true;
        let digit = (b.to_ascii_uppercase() - b'A' + 1) as usize;
        index = index
            .checked_mul(26)
            .and_then(|i| i.checked_add(digit))
            .filter(|i| *i <= MAX_COLUMNS)
            .ok_or_else(|| ConvertError::Malformed(format!("cell reference {cell_ref} is past column XFD")))?;
    }
    Ok(seen.then(|| index - 1))
}

pub struct ExcelConverter;

impl ToJsonConverter for ExcelConverter {
    fn format(&self) -> SourceFormat {
        SourceFormat::Excel
    }

    /// The header row names the fields; blank cells become empty strings.
    fn to_json(&self, input: &[u8], _hints: &FormatMetadata) -> Result<Converted> {
        let sheet = read_first_sheet(input)?;
        let mut rows = sheet.rows.into_iter();

        let headers: Vec<String> = rows
            .next()
            .unwrap_or_default()
            .into_iter()
            .enumerate()
            .map(|(i, cell)| match cell {
                Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
                Some(Value::String(_)) | Some(Value::Null) | None => format!("column{}", i + 1),
                Some(other) => other.to_string(),
            })
            .collect();

        let records: Vec<Value> = rows
            .filter(|row| row.iter().any(|c| c.is_some()))
            .map(|row| {
                let mut record = Map::new();
                for (i, header) in headers.iter().enumerate() {
                    let cell = row.get(i).cloned().flatten();
                    record.insert(header.clone(), cell.unwrap_or_else(|| Value::String(String::new())));
                }
                Value::Object(record)
            })
            .collect();

        debug!(sheet = %sheet.name, rows = records.len(), "Parsed worksheet");

        let metadata = FormatMetadata {
            column_headers: headers,
            ..FormatMetadata::for_format(SourceFormat::Excel).with_sheet_name(sheet.name)
        };

        Ok(Converted { records, metadata })
    }
}

pub struct ExcelReconstructor;

impl Reconstructor for ExcelReconstructor {
    fn format(&self) -> SourceFormat {
        SourceFormat::Excel
    }

    fn reconstruct(&self, records: &[Value], metadata: &FormatMetadata) -> Result<Vec<u8>> {
        write_workbook(records, &metadata.excel_sheet_name)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_column_letters() {
        assert_eq!(column_letters(0), "A");
        assert_eq!(column_letters(25), "Z");
        assert_eq!(column_letters(26), "AA");
        assert_eq!(column_letters(701), "ZZ");
        assert_eq!(column_letters(702), "AAA");
    }

    #[test]
    fn test_column_index() {
        assert_eq!(column_index("A1").unwrap(), Some(0));
        assert_eq!(column_index("z9").unwrap(), Some(25));
        assert_eq!(column_index("AA10").unwrap(), Some(26));
        assert_eq!(column_index("XFD1").unwrap(), Some(MAX_COLUMNS - 1));
        assert_eq!(column_index("12").unwrap(), None);
        for i in [0, 5, 26, 300, 702] {
            assert_eq!(column_index(&column_letters(i)).unwrap(), Some(i));
        }
    }

    #[test]
    fn test_column_index_rejects_oversized_references() {
        for cell_ref in ["XFE1", "ZZZZZZ1", "AAAAAAAAAAAAAAAA1"] {
            assert!(matches!(column_index(cell_ref), Err(ConvertError::Malformed(_))));
        }
    }

    #[test]
    fn test_workbook_round_trip() {
        let records = vec![
            json!({"id": "A-1", "qty": 3, "price": 9.5, "paid": true}),
            json!({"id": "A-2", "qty": null, "price": 1.25, "paid": false}),
        ];
        let meta = FormatMetadata::default().with_sheet_name("Orders");
        let bytes = ExcelReconstructor.reconstruct(&records, &meta).unwrap();

        let converted = ExcelConverter.to_json(&bytes, &FormatMetadata::default()).unwrap();
        assert_eq!(converted.metadata.excel_sheet_name, "Orders");
        assert_eq!(converted.metadata.original_format, Some(SourceFormat::Excel));
        assert_eq!(converted.metadata.column_headers, vec!["id", "qty", "price", "paid"]);
        assert_eq!(
            converted.records,
            vec![
                json!({"id": "A-1", "qty": 3, "price": 9.5, "paid": true}),
                json!({"id": "A-2", "qty": "", "price": 1.25, "paid": false}),
            ]
        );
    }

    fn workbook_with_sheet(sheet_xml: &str) -> Vec<u8> {
        use std::io::{Cursor, Write};
        use zip::write::SimpleFileOptions;

        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        zip.start_file("xl/workbook.xml", options).unwrap();
        zip.write_all(br#"<workbook><sheets><sheet name="Data" sheetId="1"/></sheets></workbook>"#)
            .unwrap();
        zip.start_file("xl/worksheets/sheet1.xml", options).unwrap();
        zip.write_all(sheet_xml.as_bytes()).unwrap();
        zip.finish().unwrap().into_inner()
    }

    #[test]
    fn test_oversized_cell_reference_is_an_error() {
        let bytes = workbook_with_sheet(
            r#"<worksheet><sheetData><row r="1"><c r="AAAAAAAAAAAAAAAA1"><v>1</v></c></row></sheetData></worksheet>"#,
        );
        let err = ExcelConverter
            .to_json(&bytes, &FormatMetadata::default())
            .unwrap_err();
        assert!(matches!(err, ConvertError::Malformed(_)));

        let bytes = workbook_with_sheet(
            r#"<worksheet><sheetData><row r="1"><c r="ZZZZZZ1"><v>1</v></c></row></sheetData></worksheet>"#,
        );
        assert!(ExcelConverter.to_json(&bytes, &FormatMetadata::default()).is_err());
    }

    #[test]
    fn test_garbage_is_not_a_workbook() {
        assert!(ExcelConverter
            .to_json(b"id,qty\n1,2\n", &FormatMetadata::default())
            .is_err());
    }
}
