use crate::bridge::{
    extract_host, is_trusted_salesforce_pair, CookieSource, FetchWorld, TabBridge,
    TabFetchResponse,
};
use crate::error::{BrowserError, Result};
use chromiumoxide::browser::Browser;
use chromiumoxide::cdp::browser_protocol::network::GetCookiesParams;
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::Page;
use futures::StreamExt;
use serde::Deserialize;

/// Script run in the page's main world. Resolves to `{ok, status, contentType, raw}`.
fn main_world_fetch_script(url: &str) -> Result<String> {
    let url_literal = serde_json::to_string(url)
        .map_err(|e| BrowserError::ChromiumError(format!("cannot encode url: {e}")))?;
    Ok(format!(
        r"(async (requestUrl) => {{
  try {{
    const response = await fetch(requestUrl, {{
      method: 'GET',
      credentials: 'include',
      headers: {{ Accept: 'application/json' }}
    }});
    const contentType = response.headers.get('content-type') || '';
    const raw = await response.text();
    return {{ ok: true, status: response.status, contentType, raw }};
  }} catch (error) {{
    return {{ ok: false, status: 0, errorMessage: (error && error.message) || 'MAIN world fetch failed' }};
  }}
}})({url_literal})"
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MainWorldResult {
    ok: bool,
    #[serde(default)]
    status: u16,
    #[serde(default)]
    content_type: String,
    #[serde(default)]
    raw: String,
    #[serde(default)]
    error_message: Option<String>,
}

/// DevTools-protocol attachment to the user's running Chrome.
pub struct CdpSession {
    browser: Browser,
}

impl CdpSession {
    /// Attach to a browser started with `--remote-debugging-port`.
    pub async fn connect(endpoint: &str) -> Result<Self> {
        let (browser, mut handler) = Browser::connect(endpoint)
            .await
            .map_err(|e| BrowserError::ChromiumError(e.to_string()))?;

        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!("CDP handler event error: {}", e);
                }
            }
        });

        tracing::info!("Attached to Chrome DevTools at {}", endpoint);
        Ok(Self { browser })
    }

    /// First open page whose host belongs to the same org as `url`.
    async fn page_for(&self, url: &str) -> Result<Page> {
        let target_host = extract_host(url)?;
        let pages = self
            .browser
            .pages()
            .await
            .map_err(|e| BrowserError::ChromiumError(e.to_string()))?;

        for page in pages {
            let Ok(Some(page_url)) = page.url().await else {
                continue;
            };
            let Ok(page_host) = extract_host(&page_url) else {
                continue;
            };
            if is_trusted_salesforce_pair(&page_host, &target_host) {
                return Ok(page);
            }
        }

        Err(BrowserError::NoMatchingPage(target_host))
    }
}

#[async_trait::async_trait]
impl TabBridge for CdpSession {
    // CDP target ids are not extension tab ids, so the tab is chosen by org host.
    async fn fetch_json(
        &self,
        _tab_id: i64,
        url: &str,
        world: FetchWorld,
    ) -> Result<TabFetchResponse> {
        if world == FetchWorld::Isolated {
            return Err(BrowserError::Unsupported(
                "isolated-world fetch requires the extension relay".to_string(),
            ));
        }

        let page = self.page_for(url).await?;
        let params = EvaluateParams::builder()
            .expression(main_world_fetch_script(url)?)
            .await_promise(true)
            .return_by_value(true)
            .build()
            .map_err(BrowserError::ChromiumError)?;

        let result: MainWorldResult = page
            .evaluate_expression(params)
            .await
            .map_err(|e| BrowserError::ChromiumError(e.to_string()))?
            .into_value()
            .map_err(|e| BrowserError::ChromiumError(e.to_string()))?;

        if !result.ok {
            return Err(BrowserError::FetchFailed {
                status: result.status,
                code: Some("PROXY_FETCH_FAILED".to_string()),
                message: result
                    .error_message
                    .unwrap_or_else(|| "MAIN world execution returned no result.".to_string()),
            });
        }

        Ok(TabFetchResponse {
            status: result.status,
            content_type: result.content_type,
            body: result.raw,
        })
    }
}

#[async_trait::async_trait]
impl CookieSource for CdpSession {
    async fn cookie(&self, url: &str, name: &str) -> Result<Option<String>> {
        let page = self.page_for(url).await?;
        let response = page
            .execute(GetCookiesParams::builder().url(url).build())
            .await
            .map_err(|e| BrowserError::ChromiumError(e.to_string()))?;

        Ok(response
            .result
            .cookies
            .iter()
            .find(|cookie| cookie.name == name && !cookie.value.is_empty())
            .map(|cookie| cookie.value.clone()))
    }
}
