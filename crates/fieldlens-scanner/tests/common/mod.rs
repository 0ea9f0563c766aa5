//! Scripted Salesforce org for scanner tests.

#![allow(dead_code)]

use async_trait::async_trait;
use fieldlens_client::{HttpFetcher, HttpResponse, SalesforceClient, TransportPipeline};
use fieldlens_core::{CacheStore, Clock, Result};
use fieldlens_scanner::ScanOrchestrator;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

pub const BASE_URL: &str = "https://acme.my.salesforce.com";
pub const TTL_MS: i64 = 600_000;

/// Canned answer for requests whose decoded URL contains a pattern.
struct Route {
    pattern: String,
    status: u16,
    body: Value,
}

/// Fake org answering from routes; the latest matching route wins and
/// unmatched requests get a 404.
#[derive(Default)]
pub struct FakeOrg {
    routes: Mutex<Vec<Route>>,
    calls: Mutex<Vec<String>>,
}

impl FakeOrg {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Answer a query with `records` on a single page.
    pub fn records(&self, pattern: &str, records: Value) -> &Self {
        let total = records.as_array().map_or(0, Vec::len);
        self.reply(
            pattern,
            200,
            json!({ "totalSize": total, "done": true, "records": records }),
        )
    }

    /// Answer with an arbitrary status and body.
    pub fn reply(&self, pattern: &str, status: u16, body: Value) -> &Self {
        self.routes.lock().unwrap().push(Route {
            pattern: pattern.to_string(),
            status,
            body,
        });
        self
    }

    /// Answer with a Salesforce-style error array.
    pub fn error(&self, pattern: &str, status: u16, message: &str, code: &str) -> &Self {
        self.reply(
            pattern,
            status,
            json!([{ "message": message, "errorCode": code }]),
        )
    }

    /// Decoded URLs of every request made so far.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of requests whose decoded URL contains `pattern`.
    pub fn count(&self, pattern: &str) -> usize {
        self.calls()
            .iter()
            .filter(|url| url.contains(pattern))
            .count()
    }
}

#[async_trait]
impl HttpFetcher for FakeOrg {
    async fn get(&self, url: &str, _bearer: Option<&str>) -> Result<HttpResponse> {
        let decoded = urlencoding::decode(url)
            .map(|cow| cow.into_owned())
            .unwrap_or_else(|_| url.to_string());
        self.calls.lock().unwrap().push(decoded.clone());

        let routes = self.routes.lock().unwrap();
        let (status, body) = routes
            .iter()
            .rev()
            .find(|route| decoded.contains(&route.pattern))
            .map_or_else(
                || {
                    (
                        404,
                        json!([{ "message": "The requested resource does not exist", "errorCode": "NOT_FOUND" }]),
                    )
                },
                |route| (route.status, route.body.clone()),
            );

        Ok(HttpResponse {
            status,
            content_type: "application/json;charset=UTF-8".to_string(),
            body: body.to_string(),
        })
    }
}

pub fn client(org: &Arc<FakeOrg>) -> SalesforceClient {
    SalesforceClient::new(TransportPipeline::new(org.clone()), "v60.0")
}

pub fn orchestrator(
    org: &Arc<FakeOrg>,
    store: Arc<dyn CacheStore>,
    clock: Arc<dyn Clock>,
    detail_limit: usize,
) -> ScanOrchestrator {
    ScanOrchestrator::new(client(org), store, clock, TTL_MS, detail_limit)
}

/// Org where the three core categories answer with nothing matching.
pub fn quiet_org() -> Arc<FakeOrg> {
    let org = FakeOrg::new();
    org.records("FROM ApexClass", json!([]))
        .records("FROM ApexTrigger", json!([]))
        .records("ErrorConditionFormula FROM ValidationRule", json!([]))
        .records("FROM FieldPermissions", json!([]));
    org
}
