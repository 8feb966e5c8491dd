//! Background batch jobs.
//!
//! URLs of one job are processed strictly in order, one at a time, so the
//! courtesy delays between failed attempts keep their meaning. Several jobs
//! may run side by side; each only writes its own job row and log rows.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use super::parser::{ParseOutcome, ParserService};
use crate::models::LogStatus;
use crate::repository::{JobProgress, RepositoryError};

/// Progress notifications for interactive callers.
#[derive(Debug, Clone)]
pub enum BatchEvent {
    Started { job_id: i64, total: usize },
    UrlStarted { index: usize, url: String },
    UrlFinished { index: usize, url: String, outcome: ParseOutcome },
    Finished(JobSummary),
}

/// Final counters of a batch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct JobSummary {
    pub job_id: i64,
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
}

/// Drives a job through `queued -> processing -> completed`.
#[derive(Clone)]
pub struct BatchRunner {
    service: Arc<ParserService>,
    events: Option<mpsc::UnboundedSender<BatchEvent>>,
}

impl BatchRunner {
    pub fn new(service: Arc<ParserService>) -> Self {
        Self {
            service,
            events: None,
        }
    }

    pub fn with_events(mut self, events: mpsc::UnboundedSender<BatchEvent>) -> Self {
        self.events = Some(events);
        self
    }

    fn emit(&self, event: BatchEvent) {
        if let Some(ref tx) = self.events {
            let _ = tx.send(event);
        }
    }

    /// Create a queued job for `urls`.
    pub async fn create_job(&self, urls: &[String], source: Option<&str>) -> Result<i64, RepositoryError> {
        let job_id = self.service.jobs().create_job(urls.len(), source).await?;
        info!("Created job {} with {} URLs", job_id, urls.len());
        Ok(job_id)
    }

    /// Create a job and run it on a detached task. Returns the job id
    /// immediately; progress is observed through the job row.
    pub async fn submit(&self, urls: Vec<String>, source: Option<&str>) -> Result<i64, RepositoryError> {
        let job_id = self.create_job(&urls, source).await?;
        let runner = self.clone();
        tokio::spawn(async move {
            runner.run(&urls, job_id).await;
        });
        Ok(job_id)
    }

    /// Process every URL of a job in order.
    ///
    /// One URL failing never stops the batch and the job always ends
    /// `completed`. Counters are written after each URL.
    pub async fn run(&self, urls: &[String], job_id: i64) -> JobSummary {
        let jobs = self.service.jobs();
        if let Err(e) = jobs.mark_processing(job_id).await {
            warn!("Failed to mark job {} processing: {}", job_id, e);
        }
        self.emit(BatchEvent::Started {
            job_id,
            total: urls.len(),
        });

        let mut summary = JobSummary {
            job_id,
            total: urls.len(),
            ..Default::default()
        };

        for (index, url) in urls.iter().enumerate() {
            info!("Job {}: [{}/{}] {}", job_id, index + 1, urls.len(), url);
            self.emit(BatchEvent::UrlStarted {
                index,
                url: url.clone(),
            });

            if let Err(e) = jobs
                .insert_log(url, LogStatus::Pending, "Processing", Some(job_id), None)
                .await
            {
                warn!("Failed to write pending log for {}: {}", url, e);
            }

            let outcome = self.process_url(url, job_id).await;
            if outcome.success {
                summary.successful += 1;
            } else {
                summary.failed += 1;
            }

            let progress = JobProgress {
                processed: (summary.successful + summary.failed) as i64,
                successful: summary.successful as i64,
                failed: summary.failed as i64,
            };
            if let Err(e) = jobs.update_progress(job_id, progress).await {
                warn!("Failed to update progress of job {}: {}", job_id, e);
            }

            self.emit(BatchEvent::UrlFinished {
                index,
                url: url.clone(),
                outcome,
            });
        }

        if let Err(e) = jobs.mark_completed(job_id).await {
            error!("Failed to mark job {} completed: {}", job_id, e);
        }
        info!(
            "Job {} completed: {} succeeded, {} failed",
            job_id, summary.successful, summary.failed
        );
        self.emit(BatchEvent::Finished(summary));
        summary
    }

    /// Parse one URL on its own task so a panic only fails that URL.
    async fn process_url(&self, url: &str, job_id: i64) -> ParseOutcome {
        let service = self.service.clone();
        let owned = url.to_string();
        let handle = tokio::spawn(async move { service.parse_and_save(&owned, Some(job_id)).await });

        match handle.await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Job {}: processing {} aborted: {}", job_id, url, e);
                ParseOutcome::failed(format!("processing aborted: {}", e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::models::JobStatus;
    use crate::repository::create_memory_pool;
    use crate::scrapers::ProfileRegistry;
    use crate::services::parser::tests::{review_page, FakeFetcher};

    async fn runner(fetcher: FakeFetcher) -> BatchRunner {
        let pool = create_memory_pool().await.unwrap();
        let service = ParserService::new(Arc::new(fetcher), Arc::new(ProfileRegistry::builtin()), pool)
            .with_courtesy_delay(Duration::ZERO);
        BatchRunner::new(Arc::new(service))
    }

    fn urls() -> Vec<String> {
        vec![
            "https://casino.guru/one-review".to_string(),
            "https://casino.guru/broken-review".to_string(),
            "https://casino.guru/three-review".to_string(),
        ]
    }

    #[tokio::test]
    async fn test_run_completes_despite_failure() {
        let fetcher = FakeFetcher::default()
            .with_page("https://casino.guru/one-review", review_page("One Casino"))
            .with_page("https://casino.guru/three-review", review_page("Three Casino"));
        let runner = runner(fetcher).await;
        let urls = urls();

        let job_id = runner.create_job(&urls, Some("test")).await.unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let summary = runner.clone().with_events(tx).run(&urls, job_id).await;

        assert_eq!(
            summary,
            JobSummary {
                job_id,
                total: 3,
                successful: 2,
                failed: 1
            }
        );

        let job = runner.service.jobs().get_job(job_id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.processed_urls, 3);
        assert_eq!(job.successful_urls, 2);
        assert_eq!(job.failed_urls, 1);

        let mut finished = 0;
        while let Ok(event) = rx.try_recv() {
            if let BatchEvent::UrlFinished { index, outcome, .. } = event {
                assert_eq!(outcome.success, index != 1);
                finished += 1;
            }
        }
        assert_eq!(finished, 3);
    }

    #[tokio::test]
    async fn test_submit_returns_immediately() {
        let fetcher = FakeFetcher::default()
            .with_page("https://casino.guru/one-review", review_page("One Casino"));
        let runner = runner(fetcher).await;

        let job_id = runner
            .submit(vec!["https://casino.guru/one-review".to_string()], None)
            .await
            .unwrap();

        let jobs = runner.service.jobs();
        let mut status = JobStatus::Queued;
        for _ in 0..100 {
            status = jobs.get_job(job_id).await.unwrap().unwrap().status;
            if status.is_terminal() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn test_empty_batch_completes() {
        let runner = runner(FakeFetcher::default()).await;
        let job_id = runner.create_job(&[], None).await.unwrap();
        let summary = runner.run(&[], job_id).await;
        assert_eq!(summary.total, 0);

        let job = runner.service.jobs().get_job(job_id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Completed);
    }
}
