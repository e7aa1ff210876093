//! Per-file metadata captured at ingestion time

use serde::{Deserialize, Serialize};

use crate::format::SourceFormat;

pub const DEFAULT_CSV_DELIMITER: char = ',';
pub const DEFAULT_XML_ROOT: &str = "root";
pub const DEFAULT_XML_ITEM: &str = "item";
pub const DEFAULT_SHEET_NAME: &str = "Sheet1";

/// Conventions of the original upload, used to shape reconstructed output.
///
/// Stored with the data source under PascalCase keys
/// (`OriginalFormat`, `CsvDelimiter`, `XmlRootElement`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct FormatMetadata {
    pub original_format: Option<SourceFormat>,
    pub csv_delimiter: char,
    pub csv_has_headers: bool,
    /// Header names in file order (CSV and Excel).
    pub column_headers: Vec<String>,
    pub xml_root_element: String,
    pub xml_item_element: String,
    pub excel_sheet_name: String,
}

impl Default for FormatMetadata {
    fn default() -> Self {
        Self {
            original_format: None,
            csv_delimiter: DEFAULT_CSV_DELIMITER,
            csv_has_headers: true,
            column_headers: Vec::new(),
            xml_root_element: DEFAULT_XML_ROOT.to_string(),
            xml_item_element: DEFAULT_XML_ITEM.to_string(),
            excel_sheet_name: DEFAULT_SHEET_NAME.to_string(),
        }
    }
}

impl FormatMetadata {
    pub fn for_format(format: SourceFormat) -> Self {
        Self {
            original_format: Some(format),
            ..Self::default()
        }
    }

    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.csv_delimiter = delimiter;
        self
    }

    pub fn with_headers(mut self, has_headers: bool) -> Self {
        self.csv_has_headers = has_headers;
        self
    }

    pub fn with_xml_root(mut self, root: impl Into<String>) -> Self {
        self.xml_root_element = root.into();
        self
    }

    pub fn with_sheet_name(mut self, sheet: impl Into<String>) -> Self {
        self.excel_sheet_name = sheet.into();
        self
    }
}
