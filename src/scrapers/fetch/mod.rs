//! Multi-strategy HTML retrieval.
//!
//! [`ResilientFetcher`] tries each [`FetchStrategy`] in order. Every strategy
//! gets a fixed number of attempts with a fixed delay between them, and a
//! response only counts when its body looks like a real HTML page. Relay
//! services happily return short error pages with a 200 status.

mod popups;
mod strategies;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::Settings;

pub use popups::{has_ok_button, strip_ok_popup, strip_popups};
pub use strategies::{
    browser_headers, build_client, AllOriginsRelay, CodeTabsRelay, DirectFetch, ServerRelay,
    BROWSER_USER_AGENT, CONSENT_COOKIES, DEFAULT_ALLORIGINS_URL, DEFAULT_CODETABS_URL,
};

/// Attempts per strategy.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Delay between attempts of one strategy (milliseconds).
pub const DEFAULT_RETRY_DELAY_MS: u64 = 2000;

/// A body must be longer than this to be accepted.
pub const MIN_HTML_CHARS: usize = 1000;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{strategy} returned HTTP {status}")]
    Status { strategy: &'static str, status: u16 },

    #[error("{strategy} returned a body that is not an HTML page ({length} chars)")]
    InvalidBody { strategy: &'static str, length: usize },

    #[error("all fetch strategies failed for {url}: {last}")]
    Exhausted {
        url: String,
        #[source]
        last: Box<FetchError>,
    },

    #[error("no fetch strategies configured")]
    NoStrategies,
}

/// Anything that can turn a URL into page HTML.
#[async_trait]
pub trait HtmlFetcher: Send + Sync {
    async fn fetch_html(&self, url: &str) -> Result<String, FetchError>;
}

/// One way of retrieving a page, tried as a single attempt.
#[async_trait]
pub trait FetchStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn fetch_once(&self, url: &str) -> Result<String, FetchError>;
}

/// Fixed-delay retry policy applied to each strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }
}

/// Whether a body looks like a full HTML page.
pub fn is_valid_html(body: &str) -> bool {
    body.chars().count() > MIN_HTML_CHARS && (body.contains("<html") || body.contains("<body"))
}

/// Ordered strategy chain with per-strategy retries.
pub struct ResilientFetcher {
    strategies: Vec<Box<dyn FetchStrategy>>,
    policy: RetryPolicy,
}

impl ResilientFetcher {
    pub fn new(strategies: Vec<Box<dyn FetchStrategy>>, policy: RetryPolicy) -> Self {
        Self { strategies, policy }
    }

    /// Standard chain: CodeTabs, server relay (when configured), AllOrigins,
    /// then a direct request.
    pub fn from_settings(settings: &Settings) -> Result<Self, FetchError> {
        let client = build_client(
            &settings.user_agent,
            Duration::from_secs(settings.request_timeout),
        )?;

        let mut strategies: Vec<Box<dyn FetchStrategy>> = vec![Box::new(CodeTabsRelay::new(
            client.clone(),
            settings.codetabs_url.clone(),
        ))];
        if let Some(ref relay) = settings.relay_url {
            strategies.push(Box::new(ServerRelay::new(client.clone(), relay.clone())));
        }
        strategies.push(Box::new(AllOriginsRelay::new(
            client.clone(),
            settings.allorigins_url.clone(),
        )));
        strategies.push(Box::new(DirectFetch::new(client)));

        Ok(Self::new(
            strategies,
            RetryPolicy::new(
                settings.fetch_attempts,
                Duration::from_millis(settings.fetch_retry_delay_ms),
            ),
        ))
    }

    pub fn into_shared(self) -> Arc<dyn HtmlFetcher> {
        Arc::new(self)
    }

    /// Run one strategy under the retry policy.
    async fn run_strategy(
        &self,
        strategy: &dyn FetchStrategy,
        url: &str,
    ) -> Result<String, FetchError> {
        let attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            let result = strategy.fetch_once(url).await.and_then(|body| {
                if is_valid_html(&body) {
                    Ok(body)
                } else {
                    Err(FetchError::InvalidBody {
                        strategy: strategy.name(),
                        length: body.chars().count(),
                    })
                }
            });

            match result {
                Ok(body) => return Ok(body),
                Err(e) if attempt >= attempts => return Err(e),
                Err(e) => {
                    warn!(
                        "{}: attempt {}/{} failed for {}: {}",
                        strategy.name(),
                        attempt,
                        attempts,
                        url,
                        e
                    );
                    if !self.policy.delay.is_zero() {
                        sleep(self.policy.delay).await;
                    }
                    attempt += 1;
                }
            }
        }
    }
}

#[async_trait]
impl HtmlFetcher for ResilientFetcher {
    async fn fetch_html(&self, url: &str) -> Result<String, FetchError> {
        let mut last_error = None;

        for strategy in &self.strategies {
            match self.run_strategy(strategy.as_ref(), url).await {
                Ok(body) => {
                    info!("Fetched {} via {} ({} bytes)", url, strategy.name(), body.len());
                    return Ok(strip_popups(&body));
                }
                Err(e) => {
                    warn!("{} failed for {}: {}", strategy.name(), url, e);
                    last_error = Some(e);
                }
            }
        }

        debug!("Every strategy exhausted for {}", url);
        match last_error {
            Some(last) => Err(FetchError::Exhausted {
                url: url.to_string(),
                last: Box::new(last),
            }),
            None => Err(FetchError::NoStrategies),
        }
    }
}
