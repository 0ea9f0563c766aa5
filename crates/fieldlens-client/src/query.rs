//! Paginated query execution and candidate fallback.

use crate::candidates::api_base_candidates;
use crate::soql::encode_query;
use crate::transport::TransportPipeline;
use fieldlens_core::{
    CandidateFailure, ErrorCode, ErrorDebug, FieldLensError, OrgUrl, Result, TransportTrace,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::future::Future;

static PERMISSION_MESSAGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)INSUFFICIENT_ACCESS|INVALID_SESSION_ID|API_DISABLED_FOR_ORG")
        .expect("permission regex is hardcoded and valid")
});

/// Which query endpoint a SOQL statement targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuerySurface {
    /// `/services/data/<ver>/tooling/query/`
    Tooling,
    /// `/services/data/<ver>/query/`
    Data,
}

impl QuerySurface {
    fn path(self, api_version: &str, soql: &str) -> String {
        let q = encode_query(soql);
        match self {
            Self::Tooling => format!("/services/data/{api_version}/tooling/query/?q={q}"),
            Self::Data => format!("/services/data/{api_version}/query/?q={q}"),
        }
    }

    fn exhausted_message(self) -> &'static str {
        match self {
            Self::Tooling => "Unable to execute Tooling API query.",
            Self::Data => "Unable to execute Salesforce data API query.",
        }
    }
}

/// Salesforce API client: candidate fallback over a paginated executor.
#[derive(Debug, Clone)]
pub struct SalesforceClient {
    transport: TransportPipeline,
    api_version: String,
}

impl SalesforceClient {
    /// Create a client for an API version such as `v60.0`.
    #[must_use]
    pub fn new(transport: TransportPipeline, api_version: impl Into<String>) -> Self {
        Self {
            transport,
            api_version: api_version.into(),
        }
    }

    /// API version segment in use.
    #[must_use]
    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    /// Run a SOQL query against the first candidate origin that answers.
    ///
    /// # Errors
    /// A permission-classified failure is returned as soon as it happens.
    /// Otherwise, when every candidate fails, the first candidate's code and
    /// message are returned with all failures in `debug.candidates`.
    pub async fn query(
        &self,
        org: &OrgUrl,
        surface: QuerySurface,
        soql: &str,
        tab_id: Option<i64>,
    ) -> Result<Vec<Value>> {
        let path = surface.path(&self.api_version, soql);
        tracing::debug!(?surface, soql, "Running query");
        across_candidates(org, surface.exhausted_message(), |api_base| {
            let path = path.clone();
            async move { self.query_for_base(&api_base, &path, tab_id).await }
        })
        .await
    }

    /// GET a single resource under `/services/data/<ver>`, e.g.
    /// `/sobjects/Account/describe`.
    pub async fn get_resource(
        &self,
        org: &OrgUrl,
        resource: &str,
        tab_id: Option<i64>,
    ) -> Result<Value> {
        let path = format!("/services/data/{}{resource}", self.api_version);
        across_candidates(org, "Unable to fetch Salesforce resource.", |api_base| {
            let path = path.clone();
            async move { self.get_for_base(&api_base, &path, tab_id).await }
        })
        .await
    }

    /// Fetch every page of a query from one API base.
    ///
    /// Pages are requested strictly one after another; records are returned
    /// only if every page succeeds.
    pub async fn query_for_base(
        &self,
        api_base: &str,
        initial_path: &str,
        tab_id: Option<i64>,
    ) -> Result<Vec<Value>> {
        let mut records = Vec::new();
        let mut trail: Vec<TransportTrace> = Vec::new();
        let mut next_url = Some(format!("{api_base}{initial_path}"));
        let mut pages = 0usize;

        while let Some(url) = next_url.take() {
            let response = self
                .transport
                .get_json(&url, tab_id)
                .await
                .map_err(|err| with_base(err, api_base, &trail))?;
            trail.extend(response.trail);
            check_status(api_base, initial_path, response.status, &response.body, &trail)?;
            pages += 1;

            if let Some(page) = response.body.get("records").and_then(Value::as_array) {
                records.extend(page.iter().cloned());
            }
            next_url = response
                .body
                .get("nextRecordsUrl")
                .and_then(Value::as_str)
                .map(|next| format!("{api_base}{next}"));
        }

        tracing::debug!(api_base, pages, records = records.len(), "Query complete");
        Ok(records)
    }

    /// GET one resource from one API base with the same status policy.
    pub async fn get_for_base(
        &self,
        api_base: &str,
        path: &str,
        tab_id: Option<i64>,
    ) -> Result<Value> {
        let response = self
            .transport
            .get_json(&format!("{api_base}{path}"), tab_id)
            .await
            .map_err(|err| with_base(err, api_base, &[]))?;
        check_status(api_base, path, response.status, &response.body, &response.trail)?;
        Ok(response.body)
    }
}

/// Try `attempt` against each candidate origin in order.
async fn across_candidates<T, F, Fut>(
    org: &OrgUrl,
    exhausted_message: &str,
    mut attempt: F,
) -> Result<T>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut failures: Vec<CandidateFailure> = Vec::new();

    for candidate in api_base_candidates(org) {
        match attempt(candidate.clone()).await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if err.is_permission_denied() {
                    tracing::debug!(
                        candidate = %candidate,
                        code = %err.code,
                        "Permission denied, not trying other origins"
                    );
                    return Err(err);
                }
                tracing::debug!(
                    candidate = %candidate,
                    code = %err.code,
                    "Candidate failed: {}",
                    err.message
                );
                failures.push(CandidateFailure {
                    candidate,
                    code: err.code,
                    message: err.message,
                    debug: err.debug,
                });
            }
        }
    }

    let (code, message) = failures.first().map_or_else(
        || (ErrorCode::ApiError, exhausted_message.to_string()),
        |first| (first.code, first.message.clone()),
    );
    Err(FieldLensError::new(code, message).with_debug(ErrorDebug {
        candidates: failures,
        ..ErrorDebug::default()
    }))
}

/// Prefix earlier pages' trail and record the base on a transport error.
fn with_base(mut err: FieldLensError, api_base: &str, earlier: &[TransportTrace]) -> FieldLensError {
    let mut debug = err.debug.take().unwrap_or_default();
    let mut full = earlier.to_vec();
    full.append(&mut debug.debug_trail);
    debug.debug_trail = full;
    debug.api_base = Some(api_base.to_string());
    err.with_debug(debug)
}

/// 403 message naming the API surface that refused the request.
fn access_denied_message(path: &str) -> &'static str {
    if path.contains("/tooling/") {
        "Tooling API access denied for this user."
    } else if path.contains("/analytics/") {
        "Analytics API access denied for this user."
    } else {
        "Salesforce API access denied for this user."
    }
}

/// Classify a non-2xx answer to a request for `path`.
fn check_status(
    api_base: &str,
    path: &str,
    status: u16,
    body: &Value,
    trail: &[TransportTrace],
) -> Result<()> {
    if (200..300).contains(&status) {
        return Ok(());
    }
    let debug = ErrorDebug::for_base(api_base, trail.to_vec());

    let (code, message) = match status {
        401 => (
            ErrorCode::NotLoggedIn,
            "Salesforce session is not available. Please log in again.".to_string(),
        ),
        403 => (
            ErrorCode::InsufficientPermissions,
            access_denied_message(path).to_string(),
        ),
        _ => {
            let message = body
                .get(0)
                .and_then(|first| first.get("message"))
                .and_then(Value::as_str)
                .filter(|message| !message.is_empty())
                .map_or_else(|| format!("Salesforce API error ({status})"), str::to_string);
            if PERMISSION_MESSAGE.is_match(&message) {
                (ErrorCode::InsufficientPermissions, message)
            } else {
                (ErrorCode::ApiError, message)
            }
        }
    };

    Err(FieldLensError::new(code, message).with_debug(debug))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_surface_paths() {
        assert_eq!(
            QuerySurface::Tooling.path("v60.0", "SELECT Id FROM Flow"),
            "/services/data/v60.0/tooling/query/?q=SELECT%20Id%20FROM%20Flow"
        );
        assert_eq!(
            QuerySurface::Data.path("v60.0", "SELECT Id FROM ListView"),
            "/services/data/v60.0/query/?q=SELECT%20Id%20FROM%20ListView"
        );
    }

    #[test]
    fn test_status_classification() {
        let base = "https://acme.my.salesforce.com";
        let tooling = "/services/data/v60.0/tooling/query/?q=x";
        assert!(check_status(base, tooling, 200, &json!({}), &[]).is_ok());

        let err = check_status(base, tooling, 401, &json!([]), &[]).unwrap_err();
        assert_eq!(err.code, ErrorCode::NotLoggedIn);

        let err = check_status(base, tooling, 403, &json!([]), &[]).unwrap_err();
        assert_eq!(err.code, ErrorCode::InsufficientPermissions);
        assert_eq!(err.message, "Tooling API access denied for this user.");

        let err = check_status(
            base,
            tooling,
            400,
            &json!([{ "message": "No such column 'ErrorConditionFormula' on entity 'ValidationRule'", "errorCode": "INVALID_FIELD" }]),
            &[],
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::ApiError);
        assert!(err.message.starts_with("No such column"));

        let err = check_status(
            base,
            tooling,
            400,
            &json!([{ "message": "api_disabled_for_org: API is not enabled" }]),
            &[],
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::InsufficientPermissions);

        let err = check_status(base, tooling, 500, &json!({ "oops": true }), &[]).unwrap_err();
        assert_eq!(err.message, "Salesforce API error (500)");
        assert_eq!(
            err.debug.and_then(|d| d.api_base).as_deref(),
            Some("https://acme.my.salesforce.com")
        );
    }

    #[test]
    fn test_access_denied_names_the_surface() {
        let base = "https://acme.my.salesforce.com";
        let denied = |path: &str| check_status(base, path, 403, &json!([]), &[]).unwrap_err().message;

        assert_eq!(
            denied("/services/data/v60.0/analytics/reportTypes"),
            "Analytics API access denied for this user."
        );
        assert_eq!(
            denied("/services/data/v60.0/query/?q=SELECT%20Id%20FROM%20FieldPermissions"),
            "Salesforce API access denied for this user."
        );
        assert_eq!(
            denied("/services/data/v60.0/tooling/sobjects/Layout/00h000000000001AAA"),
            "Tooling API access denied for this user."
        );
    }
}
