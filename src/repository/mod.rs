//! SQLite persistence.
//!
//! A single [`SqlitePool`] is created at startup and handed to each
//! repository. Timestamps are stored as RFC 3339 text.

pub mod casino;
pub mod job;

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous};
use thiserror::Error;
use tracing::debug;

pub use casino::{AsyncCasinoRepository, ReferenceTable, RelatedCounts};
pub use job::{AsyncJobRepository, JobProgress};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RepositoryError>;

/// Lookup key for names matched ignoring case. Folds the full Unicode
/// range, unlike SQLite's ASCII-only `NOCASE`.
pub(crate) fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Parse a stored RFC 3339 timestamp, falling back to now on garbage.
pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

pub(crate) fn parse_datetime_opt(s: Option<String>) -> Option<DateTime<Utc>> {
    s.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    })
}

const SCHEMA: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS casinos (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        name_key TEXT NOT NULL UNIQUE,
        logo_url TEXT,
        rating REAL,
        description TEXT,
        description_html TEXT,
        owner TEXT,
        operator TEXT,
        established INTEGER,
        estimated_revenue TEXT,
        withdrawal_limit_text TEXT,
        withdrawal_limits TEXT,
        external_id TEXT,
        source_url TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS casino_features (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        casino_id INTEGER NOT NULL REFERENCES casinos(id) ON DELETE CASCADE,
        feature_type TEXT NOT NULL,
        text TEXT NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS payment_methods (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        name_key TEXT NOT NULL UNIQUE,
        logo_url TEXT
    )"#,
    r#"CREATE TABLE IF NOT EXISTS casino_payment_methods (
        casino_id INTEGER NOT NULL REFERENCES casinos(id) ON DELETE CASCADE,
        payment_method_id INTEGER NOT NULL REFERENCES payment_methods(id) ON DELETE CASCADE,
        PRIMARY KEY (casino_id, payment_method_id)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS licenses (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        name_key TEXT NOT NULL UNIQUE,
        country_code TEXT
    )"#,
    r#"CREATE TABLE IF NOT EXISTS casino_licenses (
        casino_id INTEGER NOT NULL REFERENCES casinos(id) ON DELETE CASCADE,
        license_id INTEGER NOT NULL REFERENCES licenses(id) ON DELETE CASCADE,
        PRIMARY KEY (casino_id, license_id)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS game_types (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        name_key TEXT NOT NULL UNIQUE
    )"#,
    r#"CREATE TABLE IF NOT EXISTS casino_game_types (
        casino_id INTEGER NOT NULL REFERENCES casinos(id) ON DELETE CASCADE,
        game_type_id INTEGER NOT NULL REFERENCES game_types(id) ON DELETE CASCADE,
        PRIMARY KEY (casino_id, game_type_id)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS game_providers (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        name_key TEXT NOT NULL UNIQUE,
        logo_url TEXT
    )"#,
    r#"CREATE TABLE IF NOT EXISTS casino_game_providers (
        casino_id INTEGER NOT NULL REFERENCES casinos(id) ON DELETE CASCADE,
        game_provider_id INTEGER NOT NULL REFERENCES game_providers(id) ON DELETE CASCADE,
        PRIMARY KEY (casino_id, game_provider_id)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS languages (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        name_key TEXT NOT NULL,
        country_code TEXT
    )"#,
    r#"CREATE TABLE IF NOT EXISTS casino_languages (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        casino_id INTEGER NOT NULL REFERENCES casinos(id) ON DELETE CASCADE,
        language_id INTEGER NOT NULL REFERENCES languages(id) ON DELETE CASCADE,
        type TEXT NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS casino_bonuses (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        casino_id INTEGER NOT NULL REFERENCES casinos(id) ON DELETE CASCADE,
        bonus_type TEXT NOT NULL,
        name TEXT NOT NULL DEFAULT 'Unknown Bonus',
        secondary_name TEXT,
        subtype TEXT,
        min_deposit TEXT,
        wagering_requirements TEXT,
        max_cashout TEXT,
        max_bet TEXT,
        expiration TEXT,
        process_speed TEXT,
        free_spins_value TEXT,
        free_spins_conditions TEXT,
        other_info TEXT
    )"#,
    r#"CREATE TABLE IF NOT EXISTS screenshots (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        casino_id INTEGER NOT NULL REFERENCES casinos(id) ON DELETE CASCADE,
        url TEXT NOT NULL,
        alt_text TEXT
    )"#,
    r#"CREATE TABLE IF NOT EXISTS parsing_jobs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        total_urls INTEGER NOT NULL,
        processed_urls INTEGER NOT NULL DEFAULT 0,
        successful_urls INTEGER NOT NULL DEFAULT 0,
        failed_urls INTEGER NOT NULL DEFAULT 0,
        status TEXT NOT NULL,
        source TEXT,
        created_at TEXT NOT NULL,
        started_at TEXT,
        completed_at TEXT
    )"#,
    r#"CREATE TABLE IF NOT EXISTS parse_logs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        url TEXT NOT NULL,
        status TEXT NOT NULL,
        message TEXT,
        job_id INTEGER REFERENCES parsing_jobs(id) ON DELETE SET NULL,
        casino_id INTEGER REFERENCES casinos(id) ON DELETE SET NULL,
        created_at TEXT NOT NULL
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_languages_key ON languages(name_key, country_code)",
    "CREATE INDEX IF NOT EXISTS idx_parse_logs_job ON parse_logs(job_id, created_at)",
    "CREATE INDEX IF NOT EXISTS idx_parsing_jobs_status ON parsing_jobs(status)",
];

/// Create every table that does not exist yet.
pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    debug!("Schema ready ({} statements)", SCHEMA.len());
    Ok(())
}

/// Open (creating if needed) the database file and ensure the schema.
pub async fn create_pool(db_path: &Path) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(30));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    init_schema(&pool).await?;
    Ok(pool)
}

/// Private in-memory database, used by tests and `parse --dry-run`.
///
/// Each connection to `:memory:` is a separate database, so the pool is
/// pinned to one connection that never expires.
pub async fn create_memory_pool() -> Result<SqlitePool> {
    let options = SqliteConnectOptions::new()
        .in_memory(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    init_schema(&pool).await?;
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_datetime() {
        let dt = parse_datetime("2024-03-01T12:00:00+00:00");
        assert_eq!(dt.to_rfc3339(), "2024-03-01T12:00:00+00:00");
        assert!(parse_datetime_opt(None).is_none());
        assert!(parse_datetime_opt(Some("nope".to_string())).is_none());
    }

    #[test]
    fn test_name_key_folds_unicode() {
        assert_eq!(name_key("  ÖDÖN Casino "), "ödön casino");
        assert_eq!(name_key("Ödön casino"), name_key("ÖDÖN CASINO"));
    }

    #[tokio::test]
    async fn test_init_schema_is_repeatable() {
        let pool = create_memory_pool().await.unwrap();
        init_schema(&pool).await.unwrap();

        let tables: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(tables, 16);
    }

    #[tokio::test]
    async fn test_file_pool_creates_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("casinos.db");
        let pool = create_pool(&path).await.unwrap();
        drop(pool);
        assert!(path.exists());
    }
}
