//! Fetch, parse and persist a single casino page.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use sqlx::sqlite::SqlitePool;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::config::Settings;
use crate::models::{LogStatus, ParsedCasino};
use crate::repository::{AsyncCasinoRepository, AsyncJobRepository, RelatedCounts, RepositoryError};
use crate::scrapers::{parse_page, FetchError, HtmlFetcher, ParseError, ProfileRegistry, ResilientFetcher};

/// Attempts per URL: the first try plus one retry.
pub const PARSE_ATTEMPTS: u32 = 2;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Run `op` up to `attempts` times, sleeping `delay` after every failed
/// attempt including the last. `op` receives the 1-based attempt number.
pub(crate) async fn with_courtesy<T, E, F, Fut>(attempts: u32, delay: Duration, mut op: F) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let attempts = attempts.max(1);
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) => {
                if !delay.is_zero() {
                    info!("Waiting {:?} before continuing", delay);
                    sleep(delay).await;
                }
                if attempt >= attempts {
                    return Err(e);
                }
                attempt += 1;
            }
        }
    }
}

/// Result of one parse-and-save call.
///
/// Failures carry only a message; callers never need the error type.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ParseOutcome {
    pub success: bool,
    pub casino_id: Option<i64>,
    /// True when the casino row did not exist before this call.
    pub created: bool,
    pub parsed: Option<ParsedCasino>,
    pub error: Option<String>,
}

impl ParseOutcome {
    fn saved(casino_id: i64, created: bool, parsed: ParsedCasino) -> Self {
        Self {
            success: true,
            casino_id: Some(casino_id),
            created,
            parsed: Some(parsed),
            error: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Default::default()
        }
    }
}

/// Parses casino pages and writes them to the database.
pub struct ParserService {
    fetcher: Arc<dyn HtmlFetcher>,
    profiles: Arc<ProfileRegistry>,
    casinos: AsyncCasinoRepository,
    jobs: AsyncJobRepository,
    courtesy_delay: Duration,
}

impl ParserService {
    pub fn new(fetcher: Arc<dyn HtmlFetcher>, profiles: Arc<ProfileRegistry>, pool: SqlitePool) -> Self {
        Self {
            fetcher,
            profiles,
            casinos: AsyncCasinoRepository::new(pool.clone()),
            jobs: AsyncJobRepository::new(pool),
            courtesy_delay: Duration::from_secs(crate::config::DEFAULT_COURTESY_DELAY_SECS),
        }
    }

    /// Service wired with the standard fetch chain and configured profiles.
    pub fn from_settings(settings: &Settings, pool: SqlitePool) -> Result<Self, FetchError> {
        let fetcher = ResilientFetcher::from_settings(settings)?.into_shared();
        let profiles = Arc::new(ProfileRegistry::with_profiles(settings.profiles.clone()));
        Ok(Self::new(fetcher, profiles, pool)
            .with_courtesy_delay(Duration::from_secs(settings.courtesy_delay_secs)))
    }

    /// Wait inserted after every failed attempt.
    pub fn with_courtesy_delay(mut self, delay: Duration) -> Self {
        self.courtesy_delay = delay;
        self
    }

    pub fn casinos(&self) -> &AsyncCasinoRepository {
        &self.casinos
    }

    pub fn jobs(&self) -> &AsyncJobRepository {
        &self.jobs
    }

    /// Fetch, parse and persist `url`, retrying once on failure.
    ///
    /// Every failed attempt writes an error log row and is followed by the
    /// courtesy delay, including the last one.
    pub async fn parse_and_save(&self, url: &str, job_id: Option<i64>) -> ParseOutcome {
        let result = with_courtesy(PARSE_ATTEMPTS, self.courtesy_delay, |attempt| async move {
            match self.try_parse_and_save(url, job_id).await {
                Ok(outcome) => Ok(outcome),
                Err(e) => {
                    error!("Attempt {}/{} for {} failed: {}", attempt, PARSE_ATTEMPTS, url, e);
                    let message = e.to_string();
                    self.log(
                        url,
                        LogStatus::Error,
                        &format!("Attempt {}/{}: {}", attempt, PARSE_ATTEMPTS, message),
                        job_id,
                        None,
                    )
                    .await;
                    Err(message)
                }
            }
        })
        .await;

        result.unwrap_or_else(ParseOutcome::failed)
    }

    async fn try_parse_and_save(&self, url: &str, job_id: Option<i64>) -> Result<ParseOutcome, ServiceError> {
        let parsed = self.parse_only(url).await?;
        let (casino_id, created) = self.persist(&parsed).await?;

        self.log(
            url,
            LogStatus::Success,
            &format!("Successfully parsed and saved {}", parsed.name),
            job_id,
            Some(casino_id),
        )
        .await;

        Ok(ParseOutcome::saved(casino_id, created, parsed))
    }

    /// Parse already-retrieved HTML and persist it. No fetch, no retry.
    ///
    /// A `pending` log row is written first and rewritten with the outcome.
    pub async fn parse_and_save_html(&self, html: &str, url: &str) -> ParseOutcome {
        let log_id = match self
            .jobs
            .insert_log(url, LogStatus::Pending, "Parsing supplied HTML", None, None)
            .await
        {
            Ok(id) => Some(id),
            Err(e) => {
                warn!("Failed to write pending log for {}: {}", url, e);
                None
            }
        };

        let result: Result<_, ServiceError> = async {
            let parsed = parse_page(html, url, self.profiles.resolve(url))?;
            let (casino_id, created) = self.persist(&parsed).await?;
            Ok((parsed, casino_id, created))
        }
        .await;

        let (status, message, casino_id, outcome) = match result {
            Ok((parsed, casino_id, created)) => (
                LogStatus::Success,
                format!("Successfully parsed and saved {}", parsed.name),
                Some(casino_id),
                ParseOutcome::saved(casino_id, created, parsed),
            ),
            Err(e) => {
                error!("Parsing supplied HTML for {} failed: {}", url, e);
                (LogStatus::Error, e.to_string(), None, ParseOutcome::failed(e.to_string()))
            }
        };

        if let Some(id) = log_id {
            if let Err(e) = self.jobs.update_log(id, status, &message, casino_id).await {
                warn!("Failed to update log {}: {}", id, e);
            }
        }
        outcome
    }

    /// Fetch and parse without touching the database.
    pub async fn parse_only(&self, url: &str) -> Result<ParsedCasino, ServiceError> {
        let html = self.fetcher.fetch_html(url).await?;
        let profile = self.profiles.resolve(url);
        info!("Parsing {} with profile {}", url, profile.name);
        Ok(parse_page(&html, url, profile)?)
    }

    /// Upsert the casino row and its related collections.
    async fn persist(&self, parsed: &ParsedCasino) -> Result<(i64, bool), ServiceError> {
        let (casino_id, created) = self.casinos.upsert(parsed).await?;
        let saved: RelatedCounts = self.casinos.save_related(casino_id, parsed).await;
        info!(
            "{} {} ({}): {} features, {} payment methods, {} bonuses",
            if created { "Created" } else { "Updated" },
            parsed.name,
            casino_id,
            saved.features,
            saved.payment_methods,
            saved.bonuses
        );
        Ok((casino_id, created))
    }

    async fn log(
        &self,
        url: &str,
        status: LogStatus,
        message: &str,
        job_id: Option<i64>,
        casino_id: Option<i64>,
    ) {
        if let Err(e) = self.jobs.insert_log(url, status, message, job_id, casino_id).await {
            warn!("Failed to write {} log for {}: {}", status.as_str(), url, e);
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::repository::create_memory_pool;

    pub(crate) fn review_page(name: &str) -> String {
        format!(
            r#"<html><head><title>{name} Review - Casino Guru</title></head><body>
            <img class="casino-logo" alt="{name} Logo" src="https://img/logo.png">
            <h1>{name} Review</h1>
            <div class="rating"><b>8,5</b></div>
            <div class="casino-detail-box-pros">
              <div class="col">Positives</div>
              <ul><li>Fast withdrawals</li><li>Live chat</li></ul>
            </div>
            <p>{filler}</p>
            </body></html>"#,
            name = name,
            filler = "lorem ipsum ".repeat(100)
        )
    }

    /// Serves canned pages and counts calls per URL.
    #[derive(Default)]
    pub(crate) struct FakeFetcher {
        pages: HashMap<String, String>,
        calls: Mutex<HashMap<String, u32>>,
        /// Calls per URL that fail before the page is served.
        fail_first: u32,
    }

    impl FakeFetcher {
        pub(crate) fn failing_first(mut self, calls: u32) -> Self {
            self.fail_first = calls;
            self
        }

        pub(crate) fn with_page(mut self, url: &str, html: String) -> Self {
            self.pages.insert(url.to_string(), html);
            self
        }

        pub(crate) fn calls_for(&self, url: &str) -> u32 {
            self.calls.lock().unwrap().get(url).copied().unwrap_or(0)
        }
    }

    #[async_trait]
    impl HtmlFetcher for FakeFetcher {
        async fn fetch_html(&self, url: &str) -> Result<String, FetchError> {
            let call = {
                let mut calls = self.calls.lock().unwrap();
                let count = calls.entry(url.to_string()).or_default();
                *count += 1;
                *count
            };
            match self.pages.get(url) {
                Some(html) if call > self.fail_first => Ok(html.clone()),
                _ => Err(FetchError::NoStrategies),
            }
        }
    }

    async fn service(fetcher: Arc<FakeFetcher>) -> ParserService {
        let pool = create_memory_pool().await.unwrap();
        ParserService::new(fetcher, Arc::new(ProfileRegistry::builtin()), pool)
            .with_courtesy_delay(Duration::ZERO)
    }

    #[tokio::test]
    async fn test_parse_and_save_success_logs_casino_id() {
        let url = "https://casino.guru/spin-palace-review";
        let fetcher = Arc::new(FakeFetcher::default().with_page(url, review_page("Spin Palace")));
        let service = service(fetcher.clone()).await;

        let outcome = service.parse_and_save(url, None).await;
        assert!(outcome.success, "{:?}", outcome.error);
        assert!(outcome.created);
        assert_eq!(outcome.parsed.as_ref().unwrap().name, "Spin Palace");
        assert_eq!(fetcher.calls_for(url), 1);

        let logs = service.jobs().recent_logs(None).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].status, LogStatus::Success);
        assert_eq!(logs[0].casino_id, outcome.casino_id);
    }

    #[tokio::test]
    async fn test_failure_retries_exactly_once() {
        let url = "https://casino.guru/missing-review";
        let fetcher = Arc::new(FakeFetcher::default());
        let service = service(fetcher.clone()).await;

        let outcome = service.parse_and_save(url, None).await;
        assert!(!outcome.success);
        assert!(outcome.error.is_some());
        assert_eq!(fetcher.calls_for(url), PARSE_ATTEMPTS);

        let logs = service.jobs().recent_logs(None).await.unwrap();
        assert_eq!(logs.len(), PARSE_ATTEMPTS as usize);
        assert!(logs.iter().all(|l| l.status == LogStatus::Error));
    }

    #[tokio::test]
    async fn test_default_courtesy_delay() {
        let pool = create_memory_pool().await.unwrap();
        let service = ParserService::new(
            Arc::new(FakeFetcher::default()),
            Arc::new(ProfileRegistry::builtin()),
            pool,
        );
        assert_eq!(
            service.courtesy_delay,
            Duration::from_secs(crate::config::DEFAULT_COURTESY_DELAY_SECS)
        );
    }

    fn courtesy() -> Duration {
        Duration::from_secs(crate::config::DEFAULT_COURTESY_DELAY_SECS)
    }

    #[tokio::test(start_paused = true)]
    async fn test_courtesy_after_every_failure() {
        let start = tokio::time::Instant::now();
        let mut seen = Vec::new();
        let result: Result<(), &str> = with_courtesy(PARSE_ATTEMPTS, courtesy(), |attempt| {
            seen.push(attempt);
            async { Err("down") }
        })
        .await;
        let elapsed = start.elapsed();

        assert_eq!(result, Err("down"));
        assert_eq!(seen, vec![1, 2]);
        assert!(elapsed >= courtesy() * 2, "{:?}", elapsed);
        assert!(elapsed < courtesy() * 2 + Duration::from_secs(1), "{:?}", elapsed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_on_retry_waits_once() {
        let start = tokio::time::Instant::now();
        let result = with_courtesy(PARSE_ATTEMPTS, courtesy(), |attempt| async move {
            if attempt == 1 {
                Err("flaky")
            } else {
                Ok(attempt)
            }
        })
        .await;
        let elapsed = start.elapsed();

        assert_eq!(result, Ok(2));
        assert!(elapsed >= courtesy(), "{:?}", elapsed);
        assert!(elapsed < courtesy() + Duration::from_secs(1), "{:?}", elapsed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_success_never_waits() {
        let start = tokio::time::Instant::now();
        let result: Result<u32, &str> =
            with_courtesy(PARSE_ATTEMPTS, courtesy(), |attempt| async move { Ok(attempt) }).await;
        assert_eq!(result, Ok(1));
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_retry_then_success_logs_both() {
        let url = "https://casino.guru/flaky-review";
        let fetcher = Arc::new(
            FakeFetcher::default()
                .with_page(url, review_page("Flaky Casino"))
                .failing_first(1),
        );
        let service = service(fetcher.clone()).await;

        let outcome = service.parse_and_save(url, None).await;
        assert!(outcome.success, "{:?}", outcome.error);
        assert_eq!(fetcher.calls_for(url), 2);

        let logs = service.jobs().recent_logs(None).await.unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].status, LogStatus::Success);
        assert_eq!(logs[1].status, LogStatus::Error);
        assert!(logs[1].message.starts_with("Attempt 1/2"));
    }

    #[tokio::test]
    async fn test_unusable_page_is_a_failure() {
        let url = "https://casino.guru/blank";
        let blank = format!("<html><body><p>{}</p></body></html>", "x".repeat(2000));
        let fetcher = Arc::new(FakeFetcher::default().with_page(url, blank));
        let service = service(fetcher.clone()).await;

        let outcome = service.parse_and_save(url, None).await;
        assert!(!outcome.success);
        assert_eq!(fetcher.calls_for(url), 2);
        assert_eq!(service.casinos().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_parse_and_save_html_updates_pending_log() {
        let service = service(Arc::new(FakeFetcher::default())).await;
        let url = "https://casino.guru/pasted-review";

        let outcome = service
            .parse_and_save_html(&review_page("Pasted Casino"), url)
            .await;
        assert!(outcome.success);

        let failed = service.parse_and_save_html("<html></html>", url).await;
        assert!(!failed.success);

        let logs = service.jobs().recent_logs(None).await.unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].status, LogStatus::Error);
        assert_eq!(logs[1].status, LogStatus::Success);
        assert_eq!(logs[1].casino_id, outcome.casino_id);
    }

    #[tokio::test]
    async fn test_parse_only_does_not_persist() {
        let url = "https://casino.guru/dry-review";
        let fetcher = Arc::new(FakeFetcher::default().with_page(url, review_page("Dry Run")));
        let service = service(fetcher).await;

        let parsed = service.parse_only(url).await.unwrap();
        assert_eq!(parsed.name, "Dry Run");
        assert_eq!(service.casinos().count().await.unwrap(), 0);
    }
}
