//! XML reading and writing
//!
//! Reading builds a small element tree and maps it onto JSON:
//! attributes become `@name` fields, mixed text becomes `#text`, and
//! same-name siblings are grouped into arrays. Each child of the root
//! element is one record when all children share a tag name.

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use serde_json::{Map, Value};

use crate::error::{ConvertError, Result};
use crate::format::SourceFormat;
use crate::metadata::FormatMetadata;
use crate::registry::{Converted, Reconstructor, ToJsonConverter};
use crate::value::render_cell;

pub const ATTRIBUTE_PREFIX: char = '@';
pub const TEXT_KEY: &str = "#text";

#[derive(Debug, Default)]
struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<Element>,
    text: String,
}

impl Element {
    fn from_start(start: &BytesStart<'_>) -> Result<Self> {
        let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        let mut attributes = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(ConvertError::xml)?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr.unescape_value().map_err(ConvertError::xml)?.into_owned();
            attributes.push((key, value));
        }
        Ok(Self {
            name,
            attributes,
            ..Self::default()
        })
    }

    fn is_leaf(&self) -> bool {
        self.attributes.is_empty() && self.children.is_empty()
    }

    fn to_value(&self) -> Value {
        if self.is_leaf() {
            return Value::String(self.text.trim().to_string());
        }

        let mut map = Map::new();
        for (key, value) in &self.attributes {
            map.insert(format!("{ATTRIBUTE_PREFIX}{key}"), Value::String(value.clone()));
        }

        for (name, group) in group_by_name(&self.children) {
            let value = if group.len() == 1 {
                group[0].to_value()
            } else {
                Value::Array(group.iter().map(|e| e.to_value()).collect())
            };
            map.insert(name.to_string(), value);
        }

        let text = self.text.trim();
        if !text.is_empty() {
            map.insert(TEXT_KEY.to_string(), Value::String(text.to_string()));
        }

        Value::Object(map)
    }
}

// Groups keep the order in which each tag name first appears.
fn group_by_name(children: &[Element]) -> Vec<(&str, Vec<&Element>)> {
    let mut groups: Vec<(&str, Vec<&Element>)> = Vec::new();
    for child in children {
        match groups.iter_mut().find(|(name, _)| *name == child.name) {
            Some((_, members)) => members.push(child),
            None => groups.push((&child.name, vec![child])),
        }
    }
    groups
}

fn parse_tree(text: &str) -> Result<Element> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event().map_err(ConvertError::xml)? {
            Event::Start(start) => stack.push(Element::from_start(&start)?),
            Event::Empty(start) => {
                let element = Element::from_start(&start)?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(element),
                    None => root = Some(element),
                }
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| ConvertError::Malformed("unbalanced closing tag".into()))?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(element),
                    None => root = Some(element),
                }
            }
            Event::Text(text) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&text.unescape().map_err(ConvertError::xml)?);
                }
            }
            Event::CData(data) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&String::from_utf8_lossy(&data));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(ConvertError::Malformed("unclosed element at end of document".into()));
    }
    root.ok_or_else(|| ConvertError::Malformed("document has no root element".into()))
}

pub struct XmlConverter;

impl ToJsonConverter for XmlConverter {
    fn format(&self) -> SourceFormat {
        SourceFormat::Xml
    }

    fn to_json(&self, input: &[u8], _hints: &FormatMetadata) -> Result<Converted> {
        let text = std::str::from_utf8(input)?.trim_start_matches('\u{feff}');
        let root = parse_tree(text)?;

        let groups = group_by_name(&root.children);
        let (records, item_name) = match groups.as_slice() {
            [] => (Vec::new(), None),
            [(name, items)] => {
                let records = items
                    .iter()
                    .map(|item| match item.to_value() {
                        Value::Object(map) => Value::Object(map),
                        scalar => {
                            let mut map = Map::new();
                            map.insert(name.to_string(), scalar);
                            Value::Object(map)
                        }
                    })
                    .collect();
                (records, Some(name.to_string()))
            }
            _ => (vec![root.to_value()], None),
        };

        let mut metadata = FormatMetadata::for_format(SourceFormat::Xml).with_xml_root(&root.name);
        if let Some(item) = item_name {
            metadata.xml_item_element = item;
        }

        Ok(Converted { records, metadata })
    }
}

pub struct XmlReconstructor;

impl Reconstructor for XmlReconstructor {
    fn format(&self) -> SourceFormat {
        SourceFormat::Xml
    }

    fn reconstruct(&self, records: &[Value], metadata: &FormatMetadata) -> Result<Vec<u8>> {
        let root = element_name(&metadata.xml_root_element);
        let item = element_name(&metadata.xml_item_element);

        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(ConvertError::xml)?;
        writer
            .write_event(Event::Start(BytesStart::new(root.as_str())))
            .map_err(ConvertError::xml)?;

        for record in records {
            write_value(&mut writer, &item, record)?;
        }

        writer
            .write_event(Event::End(BytesEnd::new(root.as_str())))
            .map_err(ConvertError::xml)?;

        Ok(writer.into_inner())
    }
}

fn write_value(writer: &mut Writer<Vec<u8>>, name: &str, value: &Value) -> Result<()> {
    match value {
        Value::Array(items) => {
            for item in items {
                write_value(writer, name, item)?;
            }
        }
        Value::Object(map) => {
            let mut start = BytesStart::new(name);
            for (key, v) in map {
                if let Some(attr) = key.strip_prefix(ATTRIBUTE_PREFIX) {
                    let attr = element_name(attr);
                    start.push_attribute((attr.as_str(), render_cell(Some(v)).as_str()));
                }
            }
            writer
                .write_event(Event::Start(start))
                .map_err(ConvertError::xml)?;
            for (key, v) in map {
                if key == TEXT_KEY {
                    let text = render_cell(Some(v));
                    writer
                        .write_event(Event::Text(BytesText::new(&text)))
                        .map_err(ConvertError::xml)?;
                } else if !key.starts_with(ATTRIBUTE_PREFIX) {
                    write_value(writer, &element_name(key), v)?;
                }
            }
            writer
                .write_event(Event::End(BytesEnd::new(name)))
                .map_err(ConvertError::xml)?;
        }
        Value::Null => {
            writer
                .write_event(Event::Empty(BytesStart::new(name)))
                .map_err(ConvertError::xml)?;
        }
        scalar => {
            let text = render_cell(Some(scalar));
            writer
                .create_element(name)
                .write_text_content(BytesText::new(&text))
                .map_err(ConvertError::xml)?;
        }
    }
    Ok(())
}

/// Replace characters that cannot appear in an XML name.
pub fn element_name(raw: &str) -> String {
    let mut name: String = raw
        .trim()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '_' | '-' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if name.is_empty() {
        name.push('_');
    }
    if name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_digit() || c == '-' || c == '.')
    {
        name.insert(0, '_');
    }
    name
}
