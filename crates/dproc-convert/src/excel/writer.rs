//! Single-sheet workbook writer

use std::io::{Cursor, Write};

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use serde_json::Value;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::column_letters;
use crate::error::{ConvertError, Result};
use crate::metadata::DEFAULT_SHEET_NAME;

const SPREADSHEET_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const RELATIONSHIPS_NS: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/></Types>"#;

const PACKAGE_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;

const WORKBOOK_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/></Relationships>"#;

/// Write records as an `.xlsx` workbook with one sheet.
///
/// The first row holds the first record's keys; strings are stored inline.
pub fn write_workbook(records: &[Value], sheet_name: &str) -> Result<Vec<u8>> {
    let parts: [(&str, Vec<u8>); 5] = [
        ("[Content_Types].xml", CONTENT_TYPES.as_bytes().to_vec()),
        ("_rels/.rels", PACKAGE_RELS.as_bytes().to_vec()),
        ("xl/workbook.xml", workbook_xml(&sheet_title(sheet_name))?),
        ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS.as_bytes().to_vec()),
        ("xl/worksheets/sheet1.xml", worksheet_xml(records)?),
    ];

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    for (name, body) in parts {
        zip.start_file(name, options)?;
        zip.write_all(&body)?;
    }
    Ok(zip.finish()?.into_inner())
}

/// Excel limits sheet titles to 31 characters and forbids `[]:*?/\`.
fn sheet_title(raw: &str) -> String {
    let title: String = raw
        .chars()
        .filter(|c| !matches!(c, '[' | ']' | ':' | '*' | '?' | '/' | '\\'))
        .take(31)
        .collect();
    if title.trim().is_empty() {
        DEFAULT_SHEET_NAME.to_string()
    } else {
        title
    }
}

fn new_writer() -> Result<Writer<Vec<u8>>> {
    let mut writer = Writer::new(Vec::new());
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))
        .map_err(ConvertError::xml)?;
    Ok(writer)
}

fn emit(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<()> {
    writer.write_event(event).map_err(ConvertError::xml)
}

fn workbook_xml(sheet_name: &str) -> Result<Vec<u8>> {
    let mut writer = new_writer()?;

    let mut workbook = BytesStart::new("workbook");
    workbook.push_attribute(("xmlns", SPREADSHEET_NS));
    workbook.push_attribute(("xmlns:r", RELATIONSHIPS_NS));
    emit(&mut writer, Event::Start(workbook))?;
    emit(&mut writer, Event::Start(BytesStart::new("sheets")))?;

    let mut sheet = BytesStart::new("sheet");
    sheet.push_attribute(("name", sheet_name));
    sheet.push_attribute(("sheetId", "1"));
    sheet.push_attribute(("r:id", "rId1"));
    emit(&mut writer, Event::Empty(sheet))?;

    emit(&mut writer, Event::End(BytesEnd::new("sheets")))?;
    emit(&mut writer, Event::End(BytesEnd::new("workbook")))?;
    Ok(writer.into_inner())
}

fn worksheet_xml(records: &[Value]) -> Result<Vec<u8>> {
    let columns: Vec<String> = match records.first() {
        Some(Value::Object(first)) => first.keys().cloned().collect(),
        Some(_) => vec!["value".to_string()],
        None => Vec::new(),
    };

    let mut writer = new_writer()?;
    let mut worksheet = BytesStart::new("worksheet");
    worksheet.push_attribute(("xmlns", SPREADSHEET_NS));
    emit(&mut writer, Event::Start(worksheet))?;
    emit(&mut writer, Event::Start(BytesStart::new("sheetData")))?;

    if !columns.is_empty() {
        let header: Vec<Value> = columns.iter().map(|c| Value::String(c.clone())).collect();
        write_row(&mut writer, 1, header.iter().map(Some))?;
    }

    for (index, record) in records.iter().enumerate() {
        let row_number = index + 2;
        match record {
            Value::Object(map) => write_row(&mut writer, row_number, columns.iter().map(|c| map.get(c)))?,
            scalar => write_row(&mut writer, row_number, std::iter::once(Some(scalar)))?,
        }
    }

    emit(&mut writer, Event::End(BytesEnd::new("sheetData")))?;
    emit(&mut writer, Event::End(BytesEnd::new("worksheet")))?;
    Ok(writer.into_inner())
}

fn write_row<'v>(
    writer: &mut Writer<Vec<u8>>,
    row_number: usize,
    cells: impl Iterator<Item = Option<&'v Value>>,
) -> Result<()> {
    let mut row = BytesStart::new("row");
    row.push_attribute(("r", row_number.to_string().as_str()));
    emit(writer, Event::Start(row))?;

    for (column, value) in cells.enumerate() {
        let reference = format!("{}{}", column_letters(column), row_number);
        match value {
            None | Some(Value::Null) => {}
            Some(Value::Bool(b)) => value_cell(writer, &reference, Some("b"), if *b { "1" } else { "0" })?,
            Some(Value::Number(n)) => value_cell(writer, &reference, None, &n.to_string())?,
            Some(Value::String(s)) => inline_cell(writer, &reference, s)?,
            Some(nested) => inline_cell(writer, &reference, &nested.to_string())?,
        }
    }

    emit(writer, Event::End(BytesEnd::new("row")))
}

fn value_cell(
    writer: &mut Writer<Vec<u8>>,
    reference: &str,
    kind: Option<&str>,
    value: &str,
) -> Result<()> {
    let mut cell = BytesStart::new("c");
    cell.push_attribute(("r", reference));
    if let Some(kind) = kind {
        cell.push_attribute(("t", kind));
    }
    emit(writer, Event::Start(cell))?;
    emit(writer, Event::Start(BytesStart::new("v")))?;
    emit(writer, Event::Text(BytesText::new(value)))?;
    emit(writer, Event::End(BytesEnd::new("v")))?;
    emit(writer, Event::End(BytesEnd::new("c")))
}

fn inline_cell(writer: &mut Writer<Vec<u8>>, reference: &str, text: &str) -> Result<()> {
    let mut cell = BytesStart::new("c");
    cell.push_attribute(("r", reference));
    cell.push_attribute(("t", "inlineStr"));
    emit(writer, Event::Start(cell))?;
    emit(writer, Event::Start(BytesStart::new("is")))?;

    let mut t = BytesStart::new("t");
    t.push_attribute(("xml:space", "preserve"));
    emit(writer, Event::Start(t))?;
    emit(writer, Event::Text(BytesText::new(text)))?;
    emit(writer, Event::End(BytesEnd::new("t")))?;

    emit(writer, Event::End(BytesEnd::new("is")))?;
    emit(writer, Event::End(BytesEnd::new("c")))
}
