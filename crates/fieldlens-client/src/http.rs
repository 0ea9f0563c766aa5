//! Outbound HTTP from the host process.

use async_trait::async_trait;
use fieldlens_core::{ApiConfig, ErrorCode, FieldLensError, Result};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Client;

/// Status, content type and raw body of one response.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    /// HTTP status code
    pub status: u16,
    /// `Content-Type` header, empty when absent
    pub content_type: String,
    /// Response body
    pub body: String,
}

impl HttpResponse {
    /// Whether the body is declared as JSON.
    #[must_use]
    pub fn is_json(&self) -> bool {
        self.content_type.contains("application/json")
    }
}

/// Performs a credentialed GET.
///
/// Implementations report transport failures (no response at all) as
/// [`ErrorCode::NetworkError`]; any HTTP status is a successful fetch.
#[async_trait]
pub trait HttpFetcher: Send + Sync {
    /// GET `url` with `Accept: application/json`, optionally as `Bearer <token>`.
    async fn get(&self, url: &str, bearer: Option<&str>) -> Result<HttpResponse>;
}

/// [`HttpFetcher`] over a `reqwest` client with its own cookie jar.
#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    client: Client,
}

impl ReqwestFetcher {
    /// Build a client from the API settings.
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .user_agent(config.user_agent.clone())
            .cookie_store(true)
            .build()
            .map_err(|e| FieldLensError::internal(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpFetcher for ReqwestFetcher {
    async fn get(&self, url: &str, bearer: Option<&str>) -> Result<HttpResponse> {
        let mut request = self.client.get(url).header(ACCEPT, "application/json");
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            FieldLensError::new(
                ErrorCode::NetworkError,
                format!("Network error while contacting Salesforce: {e}"),
            )
        })?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let body = response.text().await.map_err(|e| {
            FieldLensError::new(
                ErrorCode::NetworkError,
                format!("Failed to read Salesforce response body: {e}"),
            )
        })?;

        Ok(HttpResponse {
            status,
            content_type,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_fetcher() {
        assert!(ReqwestFetcher::new(&ApiConfig::default()).is_ok());
    }

    #[test]
    fn test_json_detection() {
        let response = HttpResponse {
            status: 200,
            content_type: "text/html; charset=UTF-8".to_string(),
            body: "<html>".to_string(),
        };
        assert!(!response.is_json());
    }
}
