//! Per-category scan strategies.
//!
//! Every category exposes `scan(&ScanContext) -> Result<StrategyOutcome<ImpactItem>>`.
//! The aggregator runs them concurrently and folds their outcomes together.

pub mod apex;
pub mod flows;
pub mod formulas;
pub mod layouts;
pub mod list_views;
pub mod permissions;
pub mod report_types;
pub mod validation;

use crate::matching::FieldMatcher;
use crate::strategy::StrategyOutcome;
use fieldlens_client::{escape_soql, QuerySurface, SalesforceClient};
use fieldlens_core::{Category, Result, ScanRequest};
use futures::stream::{self, StreamExt};
use serde_json::Value;

/// Detail fetches kept in flight at once within one category.
const DETAIL_CONCURRENCY: usize = 5;

/// Everything a category needs to run against one org.
pub struct ScanContext<'a> {
    client: &'a SalesforceClient,
    request: &'a ScanRequest,
    matcher: FieldMatcher,
    detail_limit: usize,
}

impl<'a> ScanContext<'a> {
    /// Bind a client to a request.
    #[must_use]
    pub fn new(client: &'a SalesforceClient, request: &'a ScanRequest, detail_limit: usize) -> Self {
        Self {
            client,
            request,
            matcher: FieldMatcher::new(&request.field_api_name),
            detail_limit: detail_limit.max(1),
        }
    }

    /// The request being scanned.
    #[must_use]
    pub fn request(&self) -> &ScanRequest {
        self.request
    }

    /// Matcher for the scanned field.
    #[must_use]
    pub fn matcher(&self) -> &FieldMatcher {
        &self.matcher
    }

    /// Tooling API query.
    pub async fn tooling(&self, soql: &str) -> Result<Vec<Value>> {
        self.client
            .query(&self.request.org, QuerySurface::Tooling, soql, self.request.tab_id)
            .await
    }

    /// Data API query.
    pub async fn data(&self, soql: &str) -> Result<Vec<Value>> {
        self.client
            .query(&self.request.org, QuerySurface::Data, soql, self.request.tab_id)
            .await
    }

    /// Single resource under `/services/data/<ver>`.
    pub async fn resource(&self, path: &str) -> Result<Value> {
        self.client
            .get_resource(&self.request.org, path, self.request.tab_id)
            .await
    }

    /// Object API name escaped for a SOQL literal.
    #[must_use]
    pub fn object_literal(&self) -> String {
        escape_soql(&self.request.object_api_name)
    }

    /// Object API name encoded for a URL path segment.
    #[must_use]
    pub fn object_segment(&self) -> String {
        urlencoding::encode(&self.request.object_api_name).into_owned()
    }

    /// Absolute URL in the org the request came from.
    #[must_use]
    pub fn org_link(&self, path: &str) -> String {
        format!("{}{path}", self.request.org.origin())
    }

    /// Fetch per-record details and keep the records whose detail matches.
    ///
    /// At most `detail_limit` records are inspected; when more exist the
    /// outcome carries a warning saying how many were looked at. A failed
    /// detail fetch skips that record unless it is permission-classified,
    /// which fails the whole inspection.
    pub async fn inspect_details<P, M>(
        &self,
        category: Category,
        records: Vec<Value>,
        detail_path: P,
        is_match: M,
    ) -> Result<StrategyOutcome<(Value, Value)>>
    where
        P: Fn(&Value) -> Option<String>,
        M: Fn(&Value) -> bool,
    {
        let total = records.len();
        let inspected = total.min(self.detail_limit);

        let fetches = records
            .into_iter()
            .take(inspected)
            .filter_map(|record| detail_path(&record).map(|path| (record, path)));
        let settled: Vec<(Value, Result<Value>)> = stream::iter(fetches)
            .map(|(record, path)| async move {
                let detail = self.resource(&path).await;
                (record, detail)
            })
            .buffered(DETAIL_CONCURRENCY)
            .collect()
            .await;

        let mut matched = Vec::new();
        let mut skipped = 0usize;
        for (record, detail) in settled {
            match detail {
                Ok(detail) => {
                    if is_match(&detail) {
                        matched.push((record, detail));
                    }
                }
                Err(err) if err.is_permission_denied() => return Err(err),
                Err(err) => {
                    skipped += 1;
                    tracing::debug!(%category, code = %err.code, "Detail fetch skipped: {}", err.message);
                }
            }
        }

        tracing::debug!(%category, total, inspected, skipped, matched = matched.len(), "Details inspected");

        let warning = (total > inspected).then(|| {
            format!(
                "{} scan inspected the first {inspected} of {total} records.",
                category.display_name()
            )
        });
        Ok(StrategyOutcome {
            records: matched,
            warning,
        })
    }
}

/// Non-empty string attribute.
pub(crate) fn text<'v>(record: &'v Value, key: &str) -> Option<&'v str> {
    record
        .get(key)
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
}

/// Non-empty string at a nested path such as `["Parent", "Profile", "Name"]`.
pub(crate) fn text_at<'v>(record: &'v Value, path: &[&str]) -> Option<&'v str> {
    path.iter()
        .try_fold(record, |node, key| node.get(*key))
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
}

/// Truthiness of a boolean attribute; anything else is false.
pub(crate) fn flag(record: &Value, key: &str) -> bool {
    record.get(key).and_then(Value::as_bool).unwrap_or(false)
}

/// Record id, empty when missing.
pub(crate) fn record_id(record: &Value) -> String {
    text(record, "Id").unwrap_or_default().to_string()
}

/// Join two optional advisory warnings.
pub(crate) fn join_warnings(first: Option<String>, second: Option<String>) -> Option<String> {
    match (first, second) {
        (Some(a), Some(b)) => Some(format!("{a} {b}")),
        (a, b) => a.or(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_attribute_helpers() {
        let record = json!({
            "Id": "01p000000000001",
            "Name": "",
            "Active": true,
            "Parent": { "Profile": { "Name": "System Administrator" } }
        });
        assert_eq!(record_id(&record), "01p000000000001");
        assert_eq!(text(&record, "Name"), None);
        assert!(flag(&record, "Active"));
        assert!(!flag(&record, "Missing"));
        assert_eq!(
            text_at(&record, &["Parent", "Profile", "Name"]),
            Some("System Administrator")
        );
        assert_eq!(text_at(&record, &["Parent", "Label"]), None);
    }

    #[test]
    fn test_join_warnings() {
        assert_eq!(join_warnings(None, None), None);
        assert_eq!(
            join_warnings(Some("a.".into()), Some("b.".into())).as_deref(),
            Some("a. b.")
        );
        assert_eq!(join_warnings(None, Some("b".into())).as_deref(), Some("b"));
    }
}
