//! Localized validation messages
//!
//! Templates use `{field}`, `{expected}` and `{actual}` placeholders. The
//! catalog is built once at start-up and handed to the validator.

use std::collections::HashMap;

use dproc_common::types::RuleKind;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct MessageCatalog {
    locale: String,
    templates: HashMap<RuleKind, String>,
}

const ENGLISH: [(RuleKind, &str); 14] = [
    (RuleKind::Required, "Field '{field}' is required"),
    (RuleKind::Type, "Field '{field}' must be of type {expected} but was {actual}"),
    (RuleKind::Enum, "Field '{field}' must be one of {expected} but was {actual}"),
    (
        RuleKind::Minimum,
        "Field '{field}' must be greater than or equal to {expected} but was {actual}",
    ),
    (
        RuleKind::Maximum,
        "Field '{field}' must be less than or equal to {expected} but was {actual}",
    ),
    (
        RuleKind::ExclusiveMinimum,
        "Field '{field}' must be greater than {expected} but was {actual}",
    ),
    (
        RuleKind::ExclusiveMaximum,
        "Field '{field}' must be less than {expected} but was {actual}",
    ),
    (
        RuleKind::MinLength,
        "Field '{field}' must be at least {expected} characters long but was {actual}",
    ),
    (
        RuleKind::MaxLength,
        "Field '{field}' must be at most {expected} characters long but was {actual}",
    ),
    (RuleKind::Pattern, "Field '{field}' does not match pattern {expected}"),
    (RuleKind::Format, "Field '{field}' is not a valid {expected}: {actual}"),
    (
        RuleKind::MinItems,
        "Field '{field}' must contain at least {expected} items but had {actual}",
    ),
    (
        RuleKind::MaxItems,
        "Field '{field}' must contain at most {expected} items but had {actual}",
    ),
    (RuleKind::MalformedRecord, "Record is not a key/value document (found {actual})"),
];

const HEBREW: [(RuleKind, &str); 14] = [
    (RuleKind::Required, "שדה חובה: {field}"),
    (RuleKind::Type, "{field}: סוג לא תקין (צפוי {expected}, התקבל {actual})"),
    (RuleKind::Enum, "{field}: ערך חייב להיות אחד מהרשימה {expected}"),
    (RuleKind::Minimum, "{field}: ערך מינימלי לא מתקיים ({expected})"),
    (RuleKind::Maximum, "{field}: ערך מקסימלי חורג ({expected})"),
    (RuleKind::ExclusiveMinimum, "{field}: ערך מינימלי לא מתקיים (גדול מ-{expected})"),
    (RuleKind::ExclusiveMaximum, "{field}: ערך מקסימלי חורג (קטן מ-{expected})"),
    (RuleKind::MinLength, "{field}: אורך מינימלי לא מתקיים ({expected})"),
    (RuleKind::MaxLength, "{field}: אורך מקסימלי חורג ({expected})"),
    (RuleKind::Pattern, "{field}: תבנית לא תקינה"),
    (RuleKind::Format, "{field}: פורמט לא תקין ({expected})"),
    (RuleKind::MinItems, "{field}: מספר פריטים מינימלי לא מתקיים ({expected})"),
    (RuleKind::MaxItems, "{field}: מספר פריטים מקסימלי חורג ({expected})"),
    (RuleKind::MalformedRecord, "רשומה לא תקינה ({actual})"),
];

impl MessageCatalog {
    pub fn english() -> Self {
        Self::from_table("en", &ENGLISH)
    }

    pub fn hebrew() -> Self {
        Self::from_table("he", &HEBREW)
    }

    /// Built-in catalog for `locale`, English when the locale is unknown.
    pub fn for_locale(locale: &str) -> Self {
        match locale.trim().to_lowercase().as_str() {
            "en" | "en-us" | "en-gb" => Self::english(),
            "he" | "he-il" => Self::hebrew(),
            other => {
                warn!(locale = other, "Unknown catalog locale, using English");
                Self::english()
            },
        }
    }

    fn from_table(locale: &str, table: &[(RuleKind, &str)]) -> Self {
        Self {
            locale: locale.to_string(),
            templates: table
                .iter()
                .map(|(rule, template)| (*rule, template.to_string()))
                .collect(),
        }
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }

    /// Replace one template.
    pub fn with_template(mut self, rule: RuleKind, template: impl Into<String>) -> Self {
        self.templates.insert(rule, template.into());
        self
    }

    pub fn render(
        &self,
        rule: RuleKind,
        field: &str,
        expected: Option<&str>,
        actual: Option<&str>,
    ) -> String {
        let template = self
            .templates
            .get(&rule)
            .map(String::as_str)
            .unwrap_or("Field '{field}' failed rule {rule}");
        template
            .replace("{field}", field)
            .replace("{expected}", expected.unwrap_or(""))
            .replace("{actual}", actual.unwrap_or(""))
            .replace("{rule}", rule.code())
    }
}

impl Default for MessageCatalog {
    fn default() -> Self {
        Self::english()
    }
}
