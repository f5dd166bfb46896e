//! SQLite persistence for analysis records and user feedback.
//!
//! `analysis_records` is append-only: an `UPDATE`/`DELETE` trigger aborts any
//! attempt to change a row after insertion. Feedback lives in its own table and
//! reads attach the most recent feedback row to each record.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

use crate::config::DatabaseConfig;
use crate::error::RcaError;
use crate::models::{AnalysisRecord, Feedback, NewRecord};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS analysis_records (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        raw_log TEXT NOT NULL,
        parsed_error TEXT NOT NULL,
        suggestion TEXT NOT NULL,
        model TEXT NOT NULL,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS feedback (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        record_id INTEGER NOT NULL REFERENCES analysis_records(id),
        helpful INTEGER NOT NULL,
        comment TEXT,
        created_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_feedback_record ON feedback(record_id, id)",
    r#"
    CREATE TRIGGER IF NOT EXISTS analysis_records_no_update
    BEFORE UPDATE ON analysis_records
    BEGIN
        SELECT RAISE(ABORT, 'analysis records are immutable');
    END
    "#,
    r#"
    CREATE TRIGGER IF NOT EXISTS analysis_records_no_delete
    BEFORE DELETE ON analysis_records
    BEGIN
        SELECT RAISE(ABORT, 'analysis records are immutable');
    END
    "#,
];

const RECORD_SELECT: &str = r#"
    SELECT
        r.id,
        r.raw_log,
        r.parsed_error,
        r.suggestion,
        r.model,
        r.created_at,
        f.id AS feedback_id,
        f.helpful AS feedback_helpful,
        f.comment AS feedback_comment,
        f.created_at AS feedback_created_at
    FROM analysis_records r
    LEFT JOIN feedback f
        ON f.id = (SELECT MAX(f2.id) FROM feedback f2 WHERE f2.record_id = r.id)
"#;

pub async fn create_pool(config: &DatabaseConfig) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(&config.url)?
        .create_if_missing(true)
        .foreign_keys(true);

    SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .connect_with(options)
        .await
}

/// Create tables, indexes and triggers. Safe to run on every startup.
pub async fn init_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}

pub async fn health_check(pool: &SqlitePool) -> Result<String, sqlx::Error> {
    let row: (String,) = sqlx::query_as("SELECT sqlite_version()")
        .fetch_one(pool)
        .await?;
    Ok(row.0)
}

/// Filter for history reads.
#[derive(Debug, Clone, Copy, Default)]
pub struct HistoryQuery {
    /// `None` returns every record
    pub limit: Option<u32>,
    pub offset: u32,
    /// Default order is creation order (oldest first)
    pub newest_first: bool,
}

#[derive(sqlx::FromRow)]
struct RecordRow {
    id: i64,
    raw_log: String,
    parsed_error: String,
    suggestion: String,
    model: String,
    created_at: DateTime<Utc>,
    feedback_id: Option<i64>,
    feedback_helpful: Option<bool>,
    feedback_comment: Option<String>,
    feedback_created_at: Option<DateTime<Utc>>,
}

impl TryFrom<RecordRow> for AnalysisRecord {
    type Error = RcaError;

    fn try_from(row: RecordRow) -> Result<Self, Self::Error> {
        let feedback = match (row.feedback_id, row.feedback_helpful, row.feedback_created_at) {
            (Some(id), Some(helpful), Some(created_at)) => Some(Feedback {
                id,
                record_id: row.id,
                helpful,
                comment: row.feedback_comment,
                created_at,
            }),
            _ => None,
        };

        Ok(AnalysisRecord {
            id: row.id,
            raw_log: row.raw_log,
            parsed_error: serde_json::from_str(&row.parsed_error)?,
            suggestion: serde_json::from_str(&row.suggestion)?,
            model: row.model,
            created_at: row.created_at,
            feedback,
        })
    }
}

pub async fn insert_record(pool: &SqlitePool, new: NewRecord) -> Result<AnalysisRecord, RcaError> {
    let parsed_error = serde_json::to_string(&new.analysis.errors)?;
    let suggestion = serde_json::to_string(&new.analysis.possible_solutions)?;
    let created_at = Utc::now();

    let id = sqlx::query(
        r#"
        INSERT INTO analysis_records (raw_log, parsed_error, suggestion, model, created_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&new.raw_log)
    .bind(&parsed_error)
    .bind(&suggestion)
    .bind(&new.model)
    .bind(created_at)
    .execute(pool)
    .await?
    .last_insert_rowid();

    tracing::info!(record_id = id, errors = new.analysis.errors.len(), "Stored analysis record");

    Ok(AnalysisRecord {
        id,
        raw_log: new.raw_log,
        parsed_error: new.analysis.errors,
        suggestion: new.analysis.possible_solutions,
        model: new.model,
        created_at,
        feedback: None,
    })
}

pub async fn get_record(pool: &SqlitePool, id: i64) -> Result<Option<AnalysisRecord>, RcaError> {
    let sql = format!("{RECORD_SELECT} WHERE r.id = ?");
    let row: Option<RecordRow> = sqlx::query_as(&sql).bind(id).fetch_optional(pool).await?;
    row.map(AnalysisRecord::try_from).transpose()
}

pub async fn list_records(
    pool: &SqlitePool,
    query: HistoryQuery,
) -> Result<Vec<AnalysisRecord>, RcaError> {
    let order = if query.newest_first { "DESC" } else { "ASC" };
    // SQLite treats a negative LIMIT as "no limit"
    let limit = query.limit.map(i64::from).unwrap_or(-1);

    let sql = format!("{RECORD_SELECT} ORDER BY r.id {order} LIMIT ? OFFSET ?");
    let rows: Vec<RecordRow> = sqlx::query_as(&sql)
        .bind(limit)
        .bind(i64::from(query.offset))
        .fetch_all(pool)
        .await?;

    rows.into_iter().map(AnalysisRecord::try_from).collect()
}

pub async fn count_records(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM analysis_records")
        .fetch_one(pool)
        .await?;
    Ok(row.0)
}

pub async fn insert_feedback(
    pool: &SqlitePool,
    record_id: i64,
    helpful: bool,
    comment: Option<String>,
) -> Result<Feedback, RcaError> {
    let exists: Option<(i64,)> = sqlx::query_as("SELECT id FROM analysis_records WHERE id = ?")
        .bind(record_id)
        .fetch_optional(pool)
        .await?;
    if exists.is_none() {
        return Err(RcaError::NotFound(format!("analysis record {record_id}")));
    }

    let comment = comment.filter(|c| !c.trim().is_empty());
    let created_at = Utc::now();

    let id = sqlx::query(
        "INSERT INTO feedback (record_id, helpful, comment, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(record_id)
    .bind(helpful)
    .bind(&comment)
    .bind(created_at)
    .execute(pool)
    .await?
    .last_insert_rowid();

    tracing::info!(record_id, feedback_id = id, helpful, "Stored feedback");

    Ok(Feedback {
        id,
        record_id,
        helpful,
        comment,
        created_at,
    })
}
