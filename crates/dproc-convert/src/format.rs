//! Source format detection

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    Json,
    Csv,
    Xml,
    Excel,
}

impl SourceFormat {
    pub const ALL: [SourceFormat; 4] = [
        SourceFormat::Json,
        SourceFormat::Csv,
        SourceFormat::Xml,
        SourceFormat::Excel,
    ];

    pub fn from_file_name(file_name: &str) -> Option<Self> {
        let ext = std::path::Path::new(file_name)
            .extension()?
            .to_str()?
            .to_lowercase();
        match ext.as_str() {
            "json" => Some(SourceFormat::Json),
            "csv" | "tsv" | "txt" => Some(SourceFormat::Csv),
            "xml" => Some(SourceFormat::Xml),
            "xlsx" | "xlsm" => Some(SourceFormat::Excel),
            _ => None,
        }
    }

    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let mime = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_lowercase();
        match mime.as_str() {
            "application/json" | "text/json" => Some(SourceFormat::Json),
            "text/csv" | "application/csv" | "text/tab-separated-values" => Some(SourceFormat::Csv),
            "application/xml" | "text/xml" => Some(SourceFormat::Xml),
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            | "application/vnd.ms-excel" => Some(SourceFormat::Excel),
            _ => None,
        }
    }

    /// File extension wins; the content type is the fallback.
    pub fn detect(file_name: &str, content_type: &str) -> Option<Self> {
        Self::from_file_name(file_name).or_else(|| Self::from_content_type(content_type))
    }

    pub fn extension(self) -> &'static str {
        match self {
            SourceFormat::Json => "json",
            SourceFormat::Csv => "csv",
            SourceFormat::Xml => "xml",
            SourceFormat::Excel => "xlsx",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            SourceFormat::Json => "application/json",
            SourceFormat::Csv => "text/csv",
            SourceFormat::Xml => "application/xml",
            SourceFormat::Excel => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
        }
    }
}

impl std::fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SourceFormat::Json => "json",
            SourceFormat::Csv => "csv",
            SourceFormat::Xml => "xml",
            SourceFormat::Excel => "excel",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for SourceFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(SourceFormat::Json),
            "csv" => Ok(SourceFormat::Csv),
            "xml" => Ok(SourceFormat::Xml),
            "excel" | "xlsx" => Ok(SourceFormat::Excel),
            other => Err(format!("unknown format: {other}")),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_prefers_extension() {
        assert_eq!(SourceFormat::detect("a.CSV", "application/json"), Some(SourceFormat::Csv));
        assert_eq!(
            SourceFormat::detect("upload", "text/xml; charset=utf-8"),
            Some(SourceFormat::Xml)
        );
        assert_eq!(SourceFormat::detect("report.pdf", "application/pdf"), None);
    }

    #[test]
    fn test_extension_and_parse() {
        assert_eq!(SourceFormat::Excel.extension(), "xlsx");
        assert_eq!("XLSX".parse::<SourceFormat>().unwrap(), SourceFormat::Excel);
    }
}
