//! Concrete retrieval strategies.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, CONNECTION,
    COOKIE, PRAGMA, REFERER, UPGRADE_INSECURE_REQUESTS, USER_AGENT,
};
use reqwest::Client;
use tracing::debug;

use super::{FetchError, FetchStrategy};

/// Desktop Chrome user agent sent by the direct strategy.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Consent and age-gate cookies pre-set to "accepted".
pub const CONSENT_COOKIES: &str =
    "cookieconsent_status=dismiss; age_verified=1; popup_closed=1; gdpr_consent=1; ok_clicked=1";

pub const DEFAULT_CODETABS_URL: &str = "https://api.codetabs.com/v1/proxy";
pub const DEFAULT_ALLORIGINS_URL: &str = "https://api.allorigins.win/raw";

/// Build the shared HTTP client.
pub fn build_client(user_agent: &str, timeout: Duration) -> Result<Client, FetchError> {
    Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .gzip(true)
        .brotli(true)
        .build()
        .map_err(|source| FetchError::Http {
            url: "<client>".to_string(),
            source,
        })
}

/// Headers that make a request look like a first browser navigation.
///
/// `navigation` adds the `Sec-Fetch-*` family sent by the server relay.
pub fn browser_headers(navigation: bool) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
    headers.insert(
        ACCEPT,
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
        ),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(UPGRADE_INSECURE_REQUESTS, HeaderValue::from_static("1"));
    headers.insert(REFERER, HeaderValue::from_static("https://www.google.com/"));
    headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
    headers.insert(COOKIE, HeaderValue::from_static(CONSENT_COOKIES));
    if navigation {
        for (name, value) in [
            ("sec-fetch-dest", "document"),
            ("sec-fetch-mode", "navigate"),
            ("sec-fetch-site", "none"),
            ("sec-fetch-user", "?1"),
        ] {
            headers.insert(HeaderName::from_static(name), HeaderValue::from_static(value));
        }
    }
    headers
}

/// GET `request_url` and return the body of a 2xx response.
async fn get_text(
    client: &Client,
    strategy: &'static str,
    request_url: &str,
    headers: Option<HeaderMap>,
) -> Result<String, FetchError> {
    debug!("{}: GET {}", strategy, request_url);
    let mut request = client.get(request_url);
    if let Some(headers) = headers {
        request = request.headers(headers);
    }
    let response = request.send().await.map_err(|source| FetchError::Http {
        url: request_url.to_string(),
        source,
    })?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status {
            strategy,
            status: status.as_u16(),
        });
    }

    response.text().await.map_err(|source| FetchError::Http {
        url: request_url.to_string(),
        source,
    })
}

fn relay_url(base: &str, param: &str, target: &str) -> String {
    let separator = if base.contains('?') { '&' } else { '?' };
    format!("{}{}{}={}", base, separator, param, urlencoding::encode(target))
}

/// CodeTabs CORS relay (`?quest=`).
pub struct CodeTabsRelay {
    client: Client,
    endpoint: String,
}

impl CodeTabsRelay {
    pub fn new(client: Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl FetchStrategy for CodeTabsRelay {
    fn name(&self) -> &'static str {
        "codetabs"
    }

    async fn fetch_once(&self, url: &str) -> Result<String, FetchError> {
        let request_url = relay_url(&self.endpoint, "quest", url);
        get_text(&self.client, self.name(), &request_url, None).await
    }
}

/// This system's own relay endpoint (`/api/proxy?url=`).
pub struct ServerRelay {
    client: Client,
    endpoint: String,
}

impl ServerRelay {
    pub fn new(client: Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl FetchStrategy for ServerRelay {
    fn name(&self) -> &'static str {
        "server-relay"
    }

    async fn fetch_once(&self, url: &str) -> Result<String, FetchError> {
        let request_url = relay_url(&self.endpoint, "url", url);
        get_text(&self.client, self.name(), &request_url, None).await
    }
}

/// AllOrigins raw relay (`?url=`).
pub struct AllOriginsRelay {
    client: Client,
    endpoint: String,
}

impl AllOriginsRelay {
    pub fn new(client: Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl FetchStrategy for AllOriginsRelay {
    fn name(&self) -> &'static str {
        "allorigins"
    }

    async fn fetch_once(&self, url: &str) -> Result<String, FetchError> {
        let request_url = relay_url(&self.endpoint, "url", url);
        get_text(&self.client, self.name(), &request_url, None).await
    }
}

/// Direct request with spoofed browser headers and consent cookies.
pub struct DirectFetch {
    client: Client,
    navigation_headers: bool,
}

impl DirectFetch {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            navigation_headers: false,
        }
    }

    /// Variant used by the server relay, adding `Sec-Fetch-*` headers.
    pub fn navigation(client: Client) -> Self {
        Self {
            client,
            navigation_headers: true,
        }
    }
}

#[async_trait]
impl FetchStrategy for DirectFetch {
    fn name(&self) -> &'static str {
        "direct"
    }

    async fn fetch_once(&self, url: &str) -> Result<String, FetchError> {
        let headers = browser_headers(self.navigation_headers);
        get_text(&self.client, self.name(), url, Some(headers)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relay_url_encoding() {
        assert_eq!(
            relay_url(DEFAULT_CODETABS_URL, "quest", "https://casino.guru/a?b=1"),
            "https://api.codetabs.com/v1/proxy?quest=https%3A%2F%2Fcasino.guru%2Fa%3Fb%3D1"
        );
        assert_eq!(
            relay_url("http://h/api/proxy?token=x", "url", "u"),
            "http://h/api/proxy?token=x&url=u"
        );
    }

    #[test]
    fn test_browser_headers() {
        let plain = browser_headers(false);
        assert_eq!(plain.get(COOKIE).unwrap(), CONSENT_COOKIES);
        assert_eq!(plain.get(REFERER).unwrap(), "https://www.google.com/");
        assert!(plain.get("sec-fetch-mode").is_none());

        let nav = browser_headers(true);
        assert_eq!(nav.get("sec-fetch-mode").unwrap(), "navigate");
    }
}
