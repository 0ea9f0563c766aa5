//! Seams between the HTTP pipeline and the logged-in browser.

use crate::error::{BrowserError, Result};

/// JavaScript context a tab-side fetch runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchWorld {
    /// Extension content-script context.
    Isolated,
    /// The page's own top-level context.
    Main,
}

/// Raw answer from a tab-side fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct TabFetchResponse {
    pub status: u16,
    pub content_type: String,
    pub body: String,
}

impl TabFetchResponse {
    pub fn is_json(&self) -> bool {
        self.content_type.contains("application/json")
    }
}

/// Executes GETs inside a browser tab that holds the user's session.
#[async_trait::async_trait]
pub trait TabBridge: Send + Sync {
    async fn fetch_json(&self, tab_id: i64, url: &str, world: FetchWorld)
        -> Result<TabFetchResponse>;
}

/// Reads cookies from the browser's cookie jar.
#[async_trait::async_trait]
pub trait CookieSource: Send + Sync {
    /// Value of cookie `name` as sent to `url`, if any.
    async fn cookie(&self, url: &str, name: &str) -> Result<Option<String>>;
}

/// Host name of a URL.
pub fn extract_host(url: &str) -> Result<String> {
    let url = url::Url::parse(url)
        .map_err(|e| BrowserError::NoMatchingPage(format!("invalid URL: {e}")))?;

    url.host_str()
        .ok_or_else(|| BrowserError::NoMatchingPage("no host in URL".to_string()))
        .map(str::to_string)
}

fn is_salesforce_host(host: &str) -> bool {
    host.ends_with(".salesforce.com") || host.ends_with(".force.com")
}

fn salesforce_core(host: &str) -> String {
    host.replace(".lightning.force.com", "")
        .replace(".my.salesforce.com", "")
        .replace(".force.com", "")
        .replace(".salesforce.com", "")
}

/// Whether a page on `current_host` may fetch from `target_host` on the user's behalf.
///
/// Both must be Salesforce hosts and name the same org, allowing the
/// Lightning / My Domain switch.
pub fn is_trusted_salesforce_pair(current_host: &str, target_host: &str) -> bool {
    if !is_salesforce_host(current_host) || !is_salesforce_host(target_host) {
        return false;
    }
    if current_host == target_host {
        return true;
    }
    let current = salesforce_core(current_host);
    !current.is_empty() && current == salesforce_core(target_host)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_host() {
        assert_eq!(
            extract_host("https://acme.my.salesforce.com/services/data").unwrap(),
            "acme.my.salesforce.com"
        );
        assert!(extract_host("not-a-url").is_err());
    }

    #[test]
    fn test_trusted_pairs() {
        assert!(is_trusted_salesforce_pair(
            "acme.lightning.force.com",
            "acme.my.salesforce.com"
        ));
        assert!(is_trusted_salesforce_pair(
            "acme.my.salesforce.com",
            "acme.my.salesforce.com"
        ));
        assert!(!is_trusted_salesforce_pair(
            "acme.lightning.force.com",
            "other.my.salesforce.com"
        ));
        assert!(!is_trusted_salesforce_pair("acme.example.com", "acme.my.salesforce.com"));
    }

    #[test]
    fn test_json_content_type() {
        let response = TabFetchResponse {
            status: 200,
            content_type: "application/json;charset=UTF-8".to_string(),
            body: "{}".to_string(),
        };
        assert!(response.is_json());
    }
}
