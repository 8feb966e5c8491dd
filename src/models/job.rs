//! Batch job and parse log models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of a batch job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(Self::Queued),
            "processing" => Some(Self::Processing),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Terminal jobs are never mutated again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// A batch parse request and its progress counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: i64,
    pub total_urls: i64,
    pub processed_urls: i64,
    pub successful_urls: i64,
    pub failed_urls: i64,
    pub status: JobStatus,
    /// Where the URL list came from (sitemap URL, file name, "api").
    pub source: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Fraction of URLs processed, in `0.0..=1.0`.
    pub fn progress(&self) -> f64 {
        if self.total_urls <= 0 {
            return 1.0;
        }
        self.processed_urls as f64 / self.total_urls as f64
    }
}

/// Outcome marker for a parse log row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogStatus {
    Pending,
    Success,
    Error,
}

impl LogStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Error => "error",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "success" => Some(Self::Success),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

/// One durable record of a parse attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseLog {
    pub id: i64,
    pub url: String,
    pub status: LogStatus,
    pub message: String,
    pub job_id: Option<i64>,
    pub casino_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_status_strings() {
        for status in [
            JobStatus::Queued,
            JobStatus::Processing,
            JobStatus::Completed,
            JobStatus::Failed,
        ] {
            assert_eq!(JobStatus::from_str(status.as_str()), Some(status));
        }
        assert!(JobStatus::Completed.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
    }

    #[test]
    fn test_progress_with_empty_job() {
        let job = Job {
            id: 1,
            total_urls: 0,
            processed_urls: 0,
            successful_urls: 0,
            failed_urls: 0,
            status: JobStatus::Queued,
            source: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        };
        assert_eq!(job.progress(), 1.0);
    }
}
