//! Worksheet reader

use std::io::{Cursor, Read};

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde_json::{Number, Value};
use zip::result::ZipError;
use zip::ZipArchive;

use super::column_index;
use crate::error::{ConvertError, Result};
use crate::metadata::DEFAULT_SHEET_NAME;

const WORKBOOK_PART: &str = "xl/workbook.xml";
const WORKBOOK_RELS_PART: &str = "xl/_rels/workbook.xml.rels";
const SHARED_STRINGS_PART: &str = "xl/sharedStrings.xml";
const DEFAULT_SHEET_PART: &str = "xl/worksheets/sheet1.xml";

/// Cells of one worksheet, row by row; `None` marks a blank cell.
#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    pub name: String,
    pub rows: Vec<Vec<Option<Value>>>,
}

type Archive<'a> = ZipArchive<Cursor<&'a [u8]>>;

pub fn read_first_sheet(bytes: &[u8]) -> Result<Sheet> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;

    let workbook = read_part(&mut archive, WORKBOOK_PART)?
        .ok_or_else(|| ConvertError::Malformed(format!("missing {WORKBOOK_PART}")))?;
    let (name, relationship) = first_sheet(&workbook)?;

    let mut sheet_part = DEFAULT_SHEET_PART.to_string();
    if let (Some(id), Some(rels)) = (relationship, read_part(&mut archive, WORKBOOK_RELS_PART)?) {
        if let Some(target) = relationship_target(&rels, &id)? {
            sheet_part = part_path(&target);
        }
    }

    let shared = match read_part(&mut archive, SHARED_STRINGS_PART)? {
        Some(xml) => shared_strings(&xml)?,
        None => Vec::new(),
    };

    let sheet_xml = read_part(&mut archive, &sheet_part)?
        .ok_or_else(|| ConvertError::Malformed(format!("missing worksheet part {sheet_part}")))?;

    Ok(Sheet {
        name,
        rows: sheet_rows(&sheet_xml, &shared)?,
    })
}

fn read_part(archive: &mut Archive<'_>, name: &str) -> Result<Option<String>> {
    match archive.by_name(name) {
        Ok(mut file) => {
            let mut text = String::new();
            file.read_to_string(&mut text)?;
            Ok(Some(text))
        }
        Err(ZipError::FileNotFound) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn attribute(start: &BytesStart<'_>, local_name: &[u8]) -> Result<Option<String>> {
    for attr in start.attributes() {
        let attr = attr.map_err(ConvertError::xml)?;
        if attr.key.local_name().as_ref() == local_name {
            let value = attr.unescape_value().map_err(ConvertError::xml)?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

// Relationship targets are relative to xl/ unless absolute.
fn part_path(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None if target.starts_with("xl/") => target.to_string(),
        None => format!("xl/{target}"),
    }
}

fn first_sheet(workbook: &str) -> Result<(String, Option<String>)> {
    let mut reader = Reader::from_str(workbook);
    loop {
        match reader.read_event().map_err(ConvertError::xml)? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"sheet" => {
                let name = attribute(&e, b"name")?.unwrap_or_else(|| DEFAULT_SHEET_NAME.to_string());
                return Ok((name, attribute(&e, b"id")?));
            }
            Event::Eof => return Err(ConvertError::Malformed("workbook has no worksheets".into())),
            _ => {}
        }
    }
}

fn relationship_target(rels: &str, id: &str) -> Result<Option<String>> {
    let mut reader = Reader::from_str(rels);
    loop {
        match reader.read_event().map_err(ConvertError::xml)? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"Relationship" => {
                if attribute(&e, b"Id")?.as_deref() == Some(id) {
                    return attribute(&e, b"Target");
                }
            }
            Event::Eof => return Ok(None),
            _ => {}
        }
    }
}

fn shared_strings(xml: &str) -> Result<Vec<String>> {
    let mut reader = Reader::from_str(xml);
    let mut strings = Vec::new();
    let mut current = String::new();
    let (mut in_item, mut in_text, mut in_phonetic) = (false, false, false);

    loop {
        match reader.read_event().map_err(ConvertError::xml)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"si" => {
                    in_item = true;
                    current.clear();
                }
                b"t" => in_text = true,
                b"rPh" => in_phonetic = true,
                _ => {}
            },
            Event::End(e) => match e.local_name().as_ref() {
                b"si" => {
                    in_item = false;
                    strings.push(std::mem::take(&mut current));
                }
                b"t" => in_text = false,
                b"rPh" => in_phonetic = false,
                _ => {}
            },
            Event::Empty(e) if e.local_name().as_ref() == b"si" => strings.push(String::new()),
            Event::Text(t) if in_item && in_text && !in_phonetic => {
                current.push_str(&t.unescape().map_err(ConvertError::xml)?);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(strings)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Capture {
    Nothing,
    Value,
    InlineText,
}

struct PendingCell {
    column: usize,
    kind: Option<String>,
    value: String,
    inline: String,
}

impl PendingCell {
    fn resolve(self, shared: &[String]) -> Option<Value> {
        match self.kind.as_deref() {
            Some("s") => self
                .value
                .trim()
                .parse::<usize>()
                .ok()
                .and_then(|i| shared.get(i))
                .map(|s| Value::String(s.clone())),
            Some("inlineStr") => Some(Value::String(self.inline)),
            Some("str") | Some("e") => Some(Value::String(self.value)),
            Some("b") => Some(Value::Bool(self.value.trim() == "1")),
            _ => numeric(&self.value),
        }
    }
}

fn numeric(raw: &str) -> Option<Value> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(int) = trimmed.parse::<i64>() {
        return Some(Value::from(int));
    }
    match trimmed.parse::<f64>().ok().and_then(Number::from_f64) {
        Some(number) => Some(Value::Number(number)),
        None => Some(Value::String(trimmed.to_string())),
    }
}

fn sheet_rows(xml: &str, shared: &[String]) -> Result<Vec<Vec<Option<Value>>>> {
    let mut reader = Reader::from_str(xml);
    let mut rows = Vec::new();
    let mut row: Option<Vec<Option<Value>>> = None;
    let mut cell: Option<PendingCell> = None;
    let mut capture = Capture::Nothing;

    loop {
        match reader.read_event().map_err(ConvertError::xml)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"row" => row = Some(Vec::new()),
                b"c" => {
                    let next = row.as_ref().map_or(0, Vec::len);
                    let column = match attribute(&e, b"r")? {
                        Some(cell_ref) => column_index(&cell_ref)?,
                        None => None,
                    };
                    cell = Some(PendingCell {
                        column: column.unwrap_or(next),
                        kind: attribute(&e, b"t")?,
                        value: String::new(),
                        inline: String::new(),
                    });
                }
                b"v" => capture = Capture::Value,
                b"t" if cell.is_some() => capture = Capture::InlineText,
                _ => {}
            },
            Event::Empty(e) if e.local_name().as_ref() == b"row" => rows.push(Vec::new()),
            Event::Text(t) => {
                if let Some(pending) = cell.as_mut() {
                    let text = t.unescape().map_err(ConvertError::xml)?;
                    match capture {
                        Capture::Value => pending.value.push_str(&text),
                        Capture::InlineText => pending.inline.push_str(&text),
                        Capture::Nothing => {}
                    }
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"v" | b"t" => capture = Capture::Nothing,
                b"c" => {
                    if let (Some(pending), Some(cells)) = (cell.take(), row.as_mut()) {
                        let column = pending.column;
                        let value = pending.resolve(shared);
                        if cells.len() <= column {
                            cells.resize(column + 1, None);
                        }
                        cells[column] = value;
                    }
                }
                b"row" => {
                    if let Some(cells) = row.take() {
                        rows.push(cells);
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(rows)
}
