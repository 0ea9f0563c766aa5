//! Session-aware GET pipeline.
//!
//! The Salesforce session lives in the user's browser, not in this process.
//! Each GET walks through progressively more intrusive ways of borrowing it:
//!
//! 1. `DirectCookie` - the host's own client and cookie jar.
//! 2. `BearerSession` - the browser's `sid` cookie sent as a bearer token.
//! 3. `TabRelay` - the fetch runs in the logged-in tab's content context.
//! 4. `MainWorld` - the fetch runs in the tab's page context.
//!
//! The first stage that yields a JSON body whose status is not 401 wins.
//! Every stage leaves a [`TransportTrace`] behind.

use crate::candidates::candidate_hosts;
use crate::http::{HttpFetcher, HttpResponse};
use fieldlens_browser::{BrowserError, CookieSource, FetchWorld, TabBridge};
use fieldlens_core::{
    ErrorCode, ErrorDebug, FieldLensError, OrgUrl, Result, TransportStage, TransportTrace,
};
use serde_json::Value;
use std::sync::Arc;

const SESSION_COOKIE: &str = "sid";

/// A definitive JSON answer and the stages it took to get it.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonResponse {
    /// HTTP status of the answering stage
    pub status: u16,
    /// Parsed body (an empty array when the body was not valid JSON)
    pub body: Value,
    /// Every stage attempted, in order
    pub trail: Vec<TransportTrace>,
}

/// Why a stage did not produce an answer. Later variants win when picking
/// the error code for an exhausted pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Miss {
    Network,
    Proxy,
    Session,
    Timeout,
}

impl Miss {
    fn code(self) -> ErrorCode {
        match self {
            Self::Network => ErrorCode::NetworkError,
            Self::Proxy => ErrorCode::ProxyFetchFailed,
            Self::Session => ErrorCode::NotLoggedIn,
            Self::Timeout => ErrorCode::Timeout,
        }
    }
}

#[derive(Debug, Default)]
struct Attempts {
    trail: Vec<TransportTrace>,
    worst: Option<(Miss, String)>,
}

impl Attempts {
    fn trace(&mut self, stage: TransportStage, url: &str, status: u16, detail: Option<String>) {
        tracing::debug!(?stage, status, detail = detail.as_deref(), "Transport stage");
        self.trail.push(TransportTrace {
            stage,
            url: url.to_string(),
            status,
            detail,
        });
    }

    fn miss(&mut self, miss: Miss, message: impl Into<String>) {
        if self.worst.as_ref().map_or(true, |(worst, _)| miss > *worst) {
            self.worst = Some((miss, message.into()));
        }
    }

    /// Trace an HTTP stage; `Some` when it produced a definitive answer.
    fn http_stage(
        &mut self,
        stage: TransportStage,
        url: &str,
        outcome: Result<HttpResponse>,
    ) -> Option<JsonResponse> {
        match outcome {
            Ok(response) => {
                self.trace(stage, url, response.status, content_detail(&response.content_type));
                if response.is_json() && response.status != 401 {
                    return Some(std::mem::take(self).answer(response.status, &response.body));
                }
                let message = if response.status == 401 {
                    "Salesforce session is not available. Please log in again."
                } else {
                    "Unexpected non-JSON response from Salesforce. Session may be expired."
                };
                self.miss(Miss::Session, message);
                None
            }
            Err(err) => {
                self.trace(stage, url, 0, Some(err.message.clone()));
                self.miss(Miss::Network, err.message);
                None
            }
        }
    }

    fn into_error(self) -> FieldLensError {
        let (code, message) = match self.worst {
            Some((miss, message)) => (miss.code(), message),
            None => (
                ErrorCode::NotLoggedIn,
                "Salesforce session is not available. Please log in again.".to_string(),
            ),
        };
        FieldLensError::new(code, message).with_debug(ErrorDebug {
            debug_trail: self.trail,
            ..ErrorDebug::default()
        })
    }

    fn answer(self, status: u16, raw: &str) -> JsonResponse {
        JsonResponse {
            status,
            body: parse_body(raw),
            trail: self.trail,
        }
    }
}

fn parse_body(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::Array(Vec::new()))
}

fn content_detail(content_type: &str) -> Option<String> {
    Some(if content_type.is_empty() {
        "unknown".to_string()
    } else {
        content_type.to_string()
    })
}

/// Runs one GET through every available stage.
#[derive(Clone)]
pub struct TransportPipeline {
    http: Arc<dyn HttpFetcher>,
    cookies: Option<Arc<dyn CookieSource>>,
    tabs: Option<Arc<dyn TabBridge>>,
}

impl std::fmt::Debug for TransportPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportPipeline")
            .field("cookies", &self.cookies.is_some())
            .field("tabs", &self.tabs.is_some())
            .finish_non_exhaustive()
    }
}

impl TransportPipeline {
    /// Pipeline with only the direct stage.
    #[must_use]
    pub fn new(http: Arc<dyn HttpFetcher>) -> Self {
        Self {
            http,
            cookies: None,
            tabs: None,
        }
    }

    /// Enable the bearer stage.
    #[must_use]
    pub fn with_cookies(mut self, cookies: Arc<dyn CookieSource>) -> Self {
        self.cookies = Some(cookies);
        self
    }

    /// Enable the tab stages.
    #[must_use]
    pub fn with_tabs(mut self, tabs: Arc<dyn TabBridge>) -> Self {
        self.tabs = Some(tabs);
        self
    }

    /// GET `url`, escalating through the stages until one answers.
    ///
    /// # Errors
    /// When every stage is exhausted: `TIMEOUT` if a tab round trip timed
    /// out, else `NOT_LOGGED_IN` if any stage saw 401 or a non-JSON body,
    /// else `PROXY_FETCH_FAILED` or `NETWORK_ERROR`. The trail is attached
    /// as `debug.debugTrail`.
    pub async fn get_json(&self, url: &str, tab_id: Option<i64>) -> Result<JsonResponse> {
        let mut attempts = Attempts::default();

        let direct = self.http.get(url, None).await;
        if let Some(answer) = attempts.http_stage(TransportStage::DirectCookie, url, direct) {
            return Ok(answer);
        }

        match self.session_id(url).await {
            Some(sid) => {
                let bearer = self.http.get(url, Some(&sid)).await;
                if let Some(answer) = attempts.http_stage(TransportStage::BearerSession, url, bearer)
                {
                    return Ok(answer);
                }
            }
            None => attempts.trace(
                TransportStage::BearerSession,
                url,
                0,
                Some("skipped: no session cookie".to_string()),
            ),
        }

        if let (Some(tab_id), Some(tabs)) = (tab_id, self.tabs.as_ref()) {
            for (stage, world) in [
                (TransportStage::TabRelay, FetchWorld::Isolated),
                (TransportStage::MainWorld, FetchWorld::Main),
            ] {
                match tabs.fetch_json(tab_id, url, world).await {
                    Ok(response) => {
                        attempts.trace(
                            stage,
                            url,
                            response.status,
                            content_detail(&response.content_type),
                        );
                        if response.is_json() && response.status != 401 {
                            return Ok(attempts.answer(response.status, &response.body));
                        }
                        attempts.miss(
                            Miss::Session,
                            format!(
                                "Tab fetch returned no usable session (status {}, content type {}).",
                                response.status,
                                content_detail(&response.content_type).unwrap_or_default()
                            ),
                        );
                    }
                    Err(err) => {
                        attempts.trace(stage, url, err.status(), Some(err.to_string()));
                        let (miss, message) = classify_browser_error(&err);
                        attempts.miss(miss, message);
                    }
                }
            }
        }

        tracing::debug!(url, "Every transport stage exhausted");
        Err(attempts.into_error())
    }

    /// The browser's `sid` cookie for the URL's host or one of its aliases.
    async fn session_id(&self, url: &str) -> Option<String> {
        let cookies = self.cookies.as_ref()?;
        let org = OrgUrl::parse(url).ok()?;
        let scheme = org.as_url().scheme();

        for host in candidate_hosts(&org) {
            let cookie_url = format!("{scheme}://{host}/");
            match cookies.cookie(&cookie_url, SESSION_COOKIE).await {
                Ok(Some(sid)) => return Some(sid),
                Ok(None) => {}
                Err(e) => tracing::debug!(host = %host, "Session cookie lookup failed: {}", e),
            }
        }
        None
    }
}

fn classify_browser_error(err: &BrowserError) -> (Miss, String) {
    match err {
        BrowserError::Timeout(message) => (Miss::Timeout, message.clone()),
        BrowserError::FetchFailed { code, message, .. }
            if code.as_deref() == Some("NOT_LOGGED_IN") =>
        {
            (Miss::Session, message.clone())
        }
        BrowserError::FetchFailed { message, .. } => (Miss::Proxy, message.clone()),
        other => (
            Miss::Proxy,
            format!("Unable to proxy Salesforce request through tab context: {other}"),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_body_tolerates_garbage() {
        assert_eq!(parse_body("not json"), Value::Array(Vec::new()));
        assert_eq!(parse_body(r#"{"a":1}"#)["a"], 1);
    }

    #[test]
    fn test_miss_ranking() {
        let mut attempts = Attempts::default();
        attempts.miss(Miss::Network, "down");
        attempts.miss(Miss::Session, "expired");
        attempts.miss(Miss::Proxy, "proxy");
        let err = attempts.into_error();
        assert_eq!(err.code, ErrorCode::NotLoggedIn);
        assert_eq!(err.message, "expired");
    }

    #[test]
    fn test_classify_timeout() {
        let (miss, _) = classify_browser_error(&BrowserError::Timeout("late".to_string()));
        assert_eq!(miss, Miss::Timeout);
    }
}
