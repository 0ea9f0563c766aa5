//! Field reference matching.
//!
//! References are found with a case-insensitive substring test of the short
//! field API name. The qualified `Object.Field` form contains the short name,
//! so one test covers both spellings. The test also over-matches: a field
//! named `Status__c` is reported inside `My_Status__c_backup`.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static SALESFORCE_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9]{15,18}$").expect("Salesforce id regex is hardcoded and valid")
});

/// Lowercased needle for repeated matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMatcher {
    needle: String,
}

impl FieldMatcher {
    /// Build a matcher for a short field API name such as `Custom_Status__c`.
    #[must_use]
    pub fn new(field_api_name: &str) -> Self {
        Self {
            needle: field_api_name.trim().to_lowercase(),
        }
    }

    /// Whether `text` mentions the field. An empty field name matches nothing.
    #[must_use]
    pub fn matches_text(&self, text: &str) -> bool {
        !self.needle.is_empty() && text.to_lowercase().contains(&self.needle)
    }

    /// Whether a string attribute of a record mentions the field.
    ///
    /// Missing and non-string attributes do not match.
    #[must_use]
    pub fn matches_attr(&self, record: &Value, attr: &str) -> bool {
        record
            .get(attr)
            .and_then(Value::as_str)
            .is_some_and(|text| self.matches_text(text))
    }

    /// Whether the serialized form of a JSON value mentions the field.
    ///
    /// `null` serializes to `{}` so absent metadata never matches.
    #[must_use]
    pub fn matches_json(&self, value: &Value) -> bool {
        if value.is_null() {
            return false;
        }
        self.matches_text(&value.to_string())
    }
}

/// Whether `value` has the shape of a 15 or 18 character record id.
#[must_use]
pub fn looks_like_salesforce_id(value: &str) -> bool {
    SALESFORCE_ID.is_match(value)
}
