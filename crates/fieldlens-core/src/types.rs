//! Shared types used across the FieldLens engine.
//!
//! Requests, results and the category vocabulary. Everything that crosses
//! the host boundary serializes to the camelCase JSON shapes the extension
//! panel consumes.

use crate::error::{FieldLensError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use url::Url;

/// Newtype for an org base URL with validation.
///
/// Must be an absolute `http`/`https` URL with a host. Only the origin is
/// kept; any path the page happened to be on is dropped.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OrgUrl(Url);

impl OrgUrl {
    /// Parse and validate an org base URL.
    ///
    /// # Errors
    /// Returns `INVALID_INPUT` if the URL does not parse, is not http(s), or
    /// has no host.
    pub fn parse(raw: &str) -> Result<Self> {
        let url = Url::parse(raw.trim())
            .map_err(|e| FieldLensError::invalid_input(format!("invalid org URL '{raw}': {e}")))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(FieldLensError::invalid_input(format!(
                "invalid org URL '{raw}': scheme must be http or https"
            )));
        }
        if url.host_str().map_or(true, str::is_empty) {
            return Err(FieldLensError::invalid_input(format!(
                "invalid org URL '{raw}': missing host"
            )));
        }

        let origin = url.origin().ascii_serialization();
        let url = Url::parse(&origin)
            .map_err(|e| FieldLensError::invalid_input(format!("invalid org URL '{raw}': {e}")))?;
        Ok(Self(url))
    }

    /// Hostname without port.
    #[must_use]
    pub fn host(&self) -> &str {
        self.0.host_str().unwrap_or_default()
    }

    /// `scheme://host[:port]` without a trailing slash.
    #[must_use]
    pub fn origin(&self) -> String {
        self.0.origin().ascii_serialization()
    }

    /// Borrow the parsed URL.
    #[must_use]
    pub fn as_url(&self) -> &Url {
        &self.0
    }
}

impl fmt::Display for OrgUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.origin())
    }
}

/// Scan depth.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanMode {
    /// Default: core categories and FLS only.
    #[default]
    Quick,
    /// Adds the expensive best-effort categories.
    Deep,
}

impl ScanMode {
    /// Lenient parse used for request fields: anything but exactly `deep`
    /// is quick.
    #[must_use]
    pub fn from_request(raw: Option<&str>) -> Self {
        match raw {
            Some("deep") => Self::Deep,
            _ => Self::Quick,
        }
    }

    /// Whether deep-only categories run.
    #[must_use]
    pub fn is_deep(self) -> bool {
        matches!(self, Self::Deep)
    }

    /// Lowercase wire name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Quick => "quick",
            Self::Deep => "deep",
        }
    }
}

impl fmt::Display for ScanMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result group a reference belongs to.
///
/// Declaration order is the order groups and warnings are reported in.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub enum Category {
    /// Apex classes whose body mentions the field
    ApexClasses,
    /// Apex triggers whose body mentions the field
    ApexTriggers,
    /// Validation rules whose formula mentions the field
    ValidationRules,
    /// Flows whose definition mentions the field
    Flows,
    /// Other formula fields on the object referencing the field
    FormulaFields,
    /// Page layouts placing the field
    PageLayouts,
    /// List views showing or filtering on the field
    ListViews,
    /// Report types exposing the field
    ReportTypes,
    /// Field-level security rows for the field
    FieldPermissions,
}

impl Category {
    /// Every category, in reporting order.
    pub const ALL: [Category; 9] = [
        Self::ApexClasses,
        Self::ApexTriggers,
        Self::ValidationRules,
        Self::Flows,
        Self::FormulaFields,
        Self::PageLayouts,
        Self::ListViews,
        Self::ReportTypes,
        Self::FieldPermissions,
    ];

    /// Categories without which a scan is not useful.
    pub const CORE: [Category; 3] = [
        Self::ApexClasses,
        Self::ApexTriggers,
        Self::ValidationRules,
    ];

    /// Whether the category only runs in deep mode.
    #[must_use]
    pub fn is_deep_only(self) -> bool {
        matches!(
            self,
            Self::Flows
                | Self::FormulaFields
                | Self::PageLayouts
                | Self::ListViews
                | Self::ReportTypes
        )
    }

    /// Whether the category runs for the given mode.
    #[must_use]
    pub fn enabled_in(self, mode: ScanMode) -> bool {
        mode.is_deep() || !self.is_deep_only()
    }

    /// Prefix used for category-specific error codes.
    #[must_use]
    pub fn code_prefix(self) -> &'static str {
        match self {
            Self::ApexClasses => "APEX_CLASS",
            Self::ApexTriggers => "APEX_TRIGGER",
            Self::ValidationRules => "VALIDATION",
            Self::Flows => "FLOW",
            Self::FormulaFields => "FORMULA",
            Self::PageLayouts => "LAYOUT",
            Self::ListViews => "LIST_VIEW",
            Self::ReportTypes => "REPORT_TYPE",
            Self::FieldPermissions => "FLS",
        }
    }

    /// Human-readable group name.
    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            Self::ApexClasses => "Apex Classes",
            Self::ApexTriggers => "Apex Triggers",
            Self::ValidationRules => "Validation Rules",
            Self::Flows => "Flows",
            Self::FormulaFields => "Formula Fields",
            Self::PageLayouts => "Page Layouts",
            Self::ListViews => "List Views",
            Self::ReportTypes => "Report Types",
            Self::FieldPermissions => "FLS / Permissions",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Which kind of container granted a field permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PermissionType {
    /// Profile-owned permission set
    Profile,
    /// Standalone permission set
    PermissionSet,
}

/// Access level a field permission grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AccessType {
    /// Read only
    Read,
    /// Read and edit
    ReadEdit,
    /// No access
    None,
}

impl AccessType {
    /// Derive the access level from the two FLS flags.
    #[must_use]
    pub fn from_flags(read: bool, edit: bool) -> Self {
        if edit {
            Self::ReadEdit
        } else if read {
            Self::Read
        } else {
            Self::None
        }
    }

    /// Label used in item subtitles.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Read => "Read",
            Self::ReadEdit => "Read + Edit",
            Self::None => "No Access",
        }
    }
}

/// One reference found by a scan, uniform across categories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImpactItem {
    /// Salesforce record id (or a stable identifier for describe-only items)
    pub id: String,
    /// Display name
    pub name: String,
    /// Secondary line
    pub subtitle: String,
    /// Setup or record URL in the org
    pub url: String,
    /// Container kind, FLS rows only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permission_type: Option<PermissionType>,
    /// Access level, FLS rows only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_type: Option<AccessType>,
}

impl ImpactItem {
    /// Create an item without permission metadata.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        subtitle: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            subtitle: subtitle.into(),
            url: url.into(),
            permission_type: None,
            access_type: None,
        }
    }
}

/// Input to an impact scan. Immutable once issued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRequest {
    /// Org the user is browsing
    pub org: OrgUrl,
    /// Object API name, e.g. `Account`
    pub object_api_name: String,
    /// Field API name, e.g. `Custom_Status__c`
    pub field_api_name: String,
    /// Scan depth
    pub scan_mode: ScanMode,
    /// Browser tab that holds the session, when the request came from one
    pub tab_id: Option<i64>,
}

impl ScanRequest {
    /// Build a validated scan request.
    ///
    /// # Errors
    /// Returns `INVALID_INPUT` when any required part is missing or the org
    /// URL is invalid.
    pub fn new(
        org_base_url: &str,
        object_api_name: &str,
        field_api_name: &str,
        scan_mode: ScanMode,
    ) -> Result<Self> {
        if org_base_url.trim().is_empty()
            || object_api_name.trim().is_empty()
            || field_api_name.trim().is_empty()
        {
            return Err(FieldLensError::invalid_input(
                "Missing object or field context for scan.",
            ));
        }

        Ok(Self {
            org: OrgUrl::parse(org_base_url)?,
            object_api_name: object_api_name.trim().to_string(),
            field_api_name: field_api_name.trim().to_string(),
            scan_mode,
            tab_id: None,
        })
    }

    /// Attach the originating tab.
    #[must_use]
    pub fn with_tab(mut self, tab_id: Option<i64>) -> Self {
        self.tab_id = tab_id;
        self
    }

    /// `Object.Field` form.
    #[must_use]
    pub fn qualified_field(&self) -> String {
        format!("{}.{}", self.object_api_name, self.field_api_name)
    }
}

/// Input to a field list load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldListRequest {
    /// Org the user is browsing
    pub org: OrgUrl,
    /// Object API name
    pub object_api_name: String,
    /// Browser tab that holds the session
    pub tab_id: Option<i64>,
}

impl FieldListRequest {
    /// Build a validated field list request.
    ///
    /// # Errors
    /// Returns `INVALID_INPUT` when the object or org URL is missing or invalid.
    pub fn new(org_base_url: &str, object_api_name: &str) -> Result<Self> {
        if org_base_url.trim().is_empty() || object_api_name.trim().is_empty() {
            return Err(FieldLensError::invalid_input(
                "Missing object context for field list loading.",
            ));
        }

        Ok(Self {
            org: OrgUrl::parse(org_base_url)?,
            object_api_name: object_api_name.trim().to_string(),
            tab_id: None,
        })
    }

    /// Attach the originating tab.
    #[must_use]
    pub fn with_tab(mut self, tab_id: Option<i64>) -> Self {
        self.tab_id = tab_id;
        self
    }
}

/// Consolidated scan output. Stored verbatim in the cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    /// Scanned object
    pub object_api_name: String,
    /// Scanned field
    pub field_api_name: String,
    /// Mode the scan ran in
    pub scan_mode: ScanMode,
    /// Item count per successful category
    pub counts: BTreeMap<Category, usize>,
    /// Items per successful category
    pub groups: BTreeMap<Category, Vec<ImpactItem>>,
    /// Non-fatal problems, in category order
    pub warnings: Vec<String>,
    /// Epoch milliseconds the scan finished
    pub generated_at: i64,
    /// Whether this copy was served from the cache
    pub from_cache: bool,
}

/// One field of an object, as listed in the field picker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSummary {
    /// `FieldDefinition.DurableId`
    pub durable_id: String,
    /// Qualified API name
    pub api_name: String,
    /// Label, falling back to the API name
    pub label: String,
    /// Data type, `Unknown` when absent
    pub data_type: String,
}

/// Output of a field list load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldListPayload {
    /// Object the fields belong to
    pub object_api_name: String,
    /// Fields ordered by label
    pub fields: Vec<FieldSummary>,
    /// Epoch milliseconds the list was loaded
    pub generated_at: i64,
    /// Whether this copy was served from the cache
    pub from_cache: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_org_url_keeps_origin_only() {
        let org = OrgUrl::parse("https://acme.lightning.force.com/lightning/r/Account/001/view")
            .expect("valid org url");
        assert_eq!(org.origin(), "https://acme.lightning.force.com");
        assert_eq!(org.host(), "acme.lightning.force.com");
    }

    #[test]
    fn test_org_url_invalid() {
        for raw in ["", "not a url", "ftp://acme.my.salesforce.com", "file:///tmp/x"] {
            let err = OrgUrl::parse(raw).expect_err("should reject");
            assert_eq!(err.code, crate::ErrorCode::InvalidInput, "for {raw}");
        }
    }

    #[test]
    fn test_scan_mode_lenient_parse() {
        assert_eq!(ScanMode::from_request(Some("deep")), ScanMode::Deep);
        assert_eq!(ScanMode::from_request(Some("DEEP")), ScanMode::Quick);
        assert_eq!(ScanMode::from_request(Some(" deep")), ScanMode::Quick);
        assert_eq!(ScanMode::from_request(Some("weird")), ScanMode::Quick);
        assert_eq!(ScanMode::from_request(None), ScanMode::Quick);
    }

    #[test]
    fn test_category_mode_gating() {
        let quick: Vec<_> = Category::ALL
            .into_iter()
            .filter(|c| c.enabled_in(ScanMode::Quick))
            .collect();
        assert_eq!(
            quick,
            vec![
                Category::ApexClasses,
                Category::ApexTriggers,
                Category::ValidationRules,
                Category::FieldPermissions
            ]
        );
        assert!(Category::ALL.iter().all(|c| c.enabled_in(ScanMode::Deep)));
    }

    #[test]
    fn test_category_serializes_camel_case_keys() {
        let mut counts = BTreeMap::new();
        counts.insert(Category::ApexClasses, 1usize);
        counts.insert(Category::FieldPermissions, 2usize);
        let json = serde_json::to_value(&counts).expect("serialize counts");
        assert_eq!(
            json,
            serde_json::json!({ "apexClasses": 1, "fieldPermissions": 2 })
        );

        let parsed: BTreeMap<Category, usize> =
            serde_json::from_value(json).expect("deserialize counts");
        assert_eq!(parsed, counts);
    }

    #[test]
    fn test_scan_request_requires_context() {
        let err = ScanRequest::new("https://acme.my.salesforce.com", "Account", " ", ScanMode::Quick)
            .expect_err("missing field");
        assert_eq!(err.code, crate::ErrorCode::InvalidInput);

        let req = ScanRequest::new(
            "https://acme.my.salesforce.com",
            "Account",
            "Custom_Status__c",
            ScanMode::Deep,
        )
        .expect("valid request");
        assert_eq!(req.qualified_field(), "Account.Custom_Status__c");
    }

    #[test]
    fn test_access_type_flags() {
        assert_eq!(AccessType::from_flags(true, true), AccessType::ReadEdit);
        assert_eq!(AccessType::from_flags(true, false), AccessType::Read);
        assert_eq!(AccessType::from_flags(false, false), AccessType::None);
        assert_eq!(AccessType::ReadEdit.label(), "Read + Edit");
    }

    #[test]
    fn test_impact_item_skips_permission_fields() {
        let item = ImpactItem::new("01p", "MyClass", "Apex Class", "https://x");
        let json = serde_json::to_value(&item).expect("serialize item");
        assert!(json.get("permissionType").is_none());
        assert!(json.get("accessType").is_none());
    }
}
