//! Batch jobs and parse logs.

use chrono::Utc;
use sqlx::sqlite::SqlitePool;

use super::{parse_datetime, parse_datetime_opt, Result};
use crate::models::{Job, JobStatus, LogStatus, ParseLog};

/// Most log rows returned by [`AsyncJobRepository::recent_logs`].
pub const RECENT_LOG_LIMIT: i64 = 50;

/// Counters written after every processed URL.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobProgress {
    pub processed: i64,
    pub successful: i64,
    pub failed: i64,
}

#[derive(sqlx::FromRow)]
struct JobRow {
    id: i64,
    total_urls: i64,
    processed_urls: i64,
    successful_urls: i64,
    failed_urls: i64,
    status: String,
    source: Option<String>,
    created_at: String,
    started_at: Option<String>,
    completed_at: Option<String>,
}

impl From<JobRow> for Job {
    fn from(row: JobRow) -> Self {
        Job {
            id: row.id,
            total_urls: row.total_urls,
            processed_urls: row.processed_urls,
            successful_urls: row.successful_urls,
            failed_urls: row.failed_urls,
            status: JobStatus::from_str(&row.status).unwrap_or(JobStatus::Queued),
            source: row.source,
            created_at: parse_datetime(&row.created_at),
            started_at: parse_datetime_opt(row.started_at),
            completed_at: parse_datetime_opt(row.completed_at),
        }
    }
}

#[derive(sqlx::FromRow)]
struct LogRow {
    id: i64,
    url: String,
    status: String,
    message: Option<String>,
    job_id: Option<i64>,
    casino_id: Option<i64>,
    created_at: String,
}

impl From<LogRow> for ParseLog {
    fn from(row: LogRow) -> Self {
        ParseLog {
            id: row.id,
            url: row.url,
            status: LogStatus::from_str(&row.status).unwrap_or(LogStatus::Error),
            message: row.message.unwrap_or_default(),
            job_id: row.job_id,
            casino_id: row.casino_id,
            created_at: parse_datetime(&row.created_at),
        }
    }
}

const JOB_COLUMNS: &str = "id, total_urls, processed_urls, successful_urls, failed_urls, \
                           status, source, created_at, started_at, completed_at";

/// Async SQLx-backed job and log repository.
#[derive(Clone)]
pub struct AsyncJobRepository {
    pool: SqlitePool,
}

impl AsyncJobRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a queued job for `total_urls` URLs.
    pub async fn create_job(&self, total_urls: usize, source: Option<&str>) -> Result<i64> {
        let now = Utc::now().to_rfc3339();
        let result = sqlx::query(
            r#"INSERT INTO parsing_jobs (total_urls, status, source, created_at)
               VALUES (?, ?, ?, ?)"#,
        )
        .bind(total_urls as i64)
        .bind(JobStatus::Queued.as_str())
        .bind(source)
        .bind(&now)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn get_job(&self, id: i64) -> Result<Option<Job>> {
        let sql = format!("SELECT {} FROM parsing_jobs WHERE id = ?", JOB_COLUMNS);
        let row = sqlx::query_as::<_, JobRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Job::from))
    }

    pub async fn mark_processing(&self, id: i64) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query("UPDATE parsing_jobs SET status = ?, started_at = ? WHERE id = ?")
            .bind(JobStatus::Processing.as_str())
            .bind(&now)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// All three counters change in one statement.
    pub async fn update_progress(&self, id: i64, progress: JobProgress) -> Result<()> {
        sqlx::query(
            r#"UPDATE parsing_jobs
               SET processed_urls = ?, successful_urls = ?, failed_urls = ?
               WHERE id = ?"#,
        )
        .bind(progress.processed)
        .bind(progress.successful)
        .bind(progress.failed)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn mark_completed(&self, id: i64) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query("UPDATE parsing_jobs SET status = ?, completed_at = ? WHERE id = ?")
            .bind(JobStatus::Completed.as_str())
            .bind(&now)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Queued and processing jobs, newest first.
    pub async fn active_jobs(&self) -> Result<Vec<Job>> {
        let sql = format!(
            "SELECT {} FROM parsing_jobs WHERE status IN (?, ?) ORDER BY id DESC",
            JOB_COLUMNS
        );
        let rows = sqlx::query_as::<_, JobRow>(&sql)
            .bind(JobStatus::Queued.as_str())
            .bind(JobStatus::Processing.as_str())
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Job::from).collect())
    }

    pub async fn recent_jobs(&self, limit: i64) -> Result<Vec<Job>> {
        let sql = format!("SELECT {} FROM parsing_jobs ORDER BY id DESC LIMIT ?", JOB_COLUMNS);
        let rows = sqlx::query_as::<_, JobRow>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Job::from).collect())
    }

    pub async fn insert_log(
        &self,
        url: &str,
        status: LogStatus,
        message: &str,
        job_id: Option<i64>,
        casino_id: Option<i64>,
    ) -> Result<i64> {
        let now = Utc::now().to_rfc3339();
        let result = sqlx::query(
            r#"INSERT INTO parse_logs (url, status, message, job_id, casino_id, created_at)
               VALUES (?, ?, ?, ?, ?, ?)"#,
        )
        .bind(url)
        .bind(status.as_str())
        .bind(message)
        .bind(job_id)
        .bind(casino_id)
        .bind(&now)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Rewrite an existing log row, e.g. a `pending` row once the outcome
    /// is known.
    pub async fn update_log(
        &self,
        id: i64,
        status: LogStatus,
        message: &str,
        casino_id: Option<i64>,
    ) -> Result<()> {
        sqlx::query("UPDATE parse_logs SET status = ?, message = ?, casino_id = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(message)
            .bind(casino_id)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Latest log rows, newest first, optionally scoped to one job.
    pub async fn recent_logs(&self, job_id: Option<i64>) -> Result<Vec<ParseLog>> {
        let rows = match job_id {
            Some(job_id) => {
                sqlx::query_as::<_, LogRow>(
                    r#"SELECT id, url, status, message, job_id, casino_id, created_at
                       FROM parse_logs WHERE job_id = ? ORDER BY id DESC LIMIT ?"#,
                )
                .bind(job_id)
                .bind(RECENT_LOG_LIMIT)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, LogRow>(
                    r#"SELECT id, url, status, message, job_id, casino_id, created_at
                       FROM parse_logs ORDER BY id DESC LIMIT ?"#,
                )
                .bind(RECENT_LOG_LIMIT)
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(rows.into_iter().map(ParseLog::from).collect())
    }
}
