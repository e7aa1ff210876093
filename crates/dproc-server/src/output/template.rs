//! Placeholder expansion for file names, subfolders and message keys
//!
//! | placeholder    | value                               |
//! |----------------|-------------------------------------|
//! | `{filename}`   | original file name without extension|
//! | `{ext}`        | extension of the output format      |
//! | `{datasource}` | data source name                    |
//! | `{date}`       | `yyyyMMdd`                          |
//! | `{timestamp}`  | `yyyyMMddHHmmss`                    |
//! | `{year}`, `{month}`, `{day}` | zero-padded date parts|
//!
//! Unknown placeholders are left as written.

use chrono::{DateTime, Utc};

use super::handler::OutputContent;

pub const DEFAULT_FILE_NAME_PATTERN: &str = "{filename}.{ext}";
pub const DEFAULT_SUBFOLDER_PATTERN: &str = "{year}/{month}/{day}";
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

pub struct TemplateContext<'a> {
    pub file_stem: &'a str,
    pub extension: &'a str,
    pub data_source: &'a str,
    pub now: DateTime<Utc>,
}

impl<'a> TemplateContext<'a> {
    pub fn for_content(content: &'a OutputContent) -> Self {
        Self {
            file_stem: content.file_stem(),
            extension: content.format.extension(),
            data_source: &content.data_source_name,
            now: content.created_at,
        }
    }
}

pub fn expand(template: &str, ctx: &TemplateContext<'_>) -> String {
    template
        .replace("{filename}", &sanitize(ctx.file_stem))
        .replace("{ext}", ctx.extension)
        .replace("{datasource}", &sanitize(ctx.data_source))
        .replace("{timestamp}", &ctx.now.format(TIMESTAMP_FORMAT).to_string())
        .replace("{date}", &ctx.now.format("%Y%m%d").to_string())
        .replace("{year}", &ctx.now.format("%Y").to_string())
        .replace("{month}", &ctx.now.format("%m").to_string())
        .replace("{day}", &ctx.now.format("%d").to_string())
}

/// `out.json` becomes `out_20240501103000.json`.
pub fn timestamped(file_name: &str, now: DateTime<Utc>) -> String {
    let stamp = now.format(TIMESTAMP_FORMAT);
    match file_name.rsplit_once('.') {
        Some((base, ext)) if !base.is_empty() => format!("{base}_{stamp}.{ext}"),
        _ => format!("{file_name}_{stamp}"),
    }
}

// Names from uploads and data sources end up in paths.
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|') { '_' } else { c })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ctx() -> TemplateContext<'static> {
        TemplateContext {
            file_stem: "orders",
            extension: "csv",
            data_source: "Sales/EU",
            now: Utc.with_ymd_and_hms(2024, 5, 1, 10, 30, 0).unwrap(),
        }
    }

    #[test]
    fn test_file_name_placeholders() {
        assert_eq!(expand(DEFAULT_FILE_NAME_PATTERN, &ctx()), "orders.csv");
        assert_eq!(
            expand("{datasource}_{filename}_{timestamp}.{ext}", &ctx()),
            "Sales_EU_orders_20240501103000.csv"
        );
        assert_eq!(expand("{filename}-{date}.{ext}", &ctx()), "orders-20240501.csv");
        assert_eq!(expand("{unknown}", &ctx()), "{unknown}");
    }

    #[test]
    fn test_file_name_separators_are_replaced() {
        let ctx = TemplateContext {
            file_stem: "a/b\\c",
            ..ctx()
        };
        assert_eq!(expand("{filename}.{ext}", &ctx), "a_b_c.csv");
    }

    #[test]
    fn test_subfolder_placeholders() {
        assert_eq!(expand(DEFAULT_SUBFOLDER_PATTERN, &ctx()), "2024/05/01");
    }

    #[test]
    fn test_timestamped_names() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 10, 30, 0).unwrap();
        assert_eq!(timestamped("out.json", now), "out_20240501103000.json");
        assert_eq!(timestamped("out", now), "out_20240501103000");
    }
}
