use rca_core::db;
use rca_core::models::{AnalysisRecord, NewRecord};
use rca_core::{AnalysisPipeline, RcaError};
use sqlx::SqlitePool;

/// Run the pipeline on `raw_log` and persist the result.
///
/// The record is written only after the LLM reply parsed successfully, so a
/// failed analysis never leaves a row behind.
pub async fn analyze_and_record(
    pool: &SqlitePool,
    pipeline: Option<&AnalysisPipeline>,
    raw_log: &str,
) -> Result<AnalysisRecord, RcaError> {
    let pipeline = pipeline.ok_or_else(|| {
        RcaError::Unavailable("LLM backend is not configured".to_string())
    })?;

    let analysis = pipeline.run(raw_log).await?;

    let record = db::insert_record(
        pool,
        NewRecord {
            raw_log: raw_log.to_string(),
            analysis,
            model: pipeline.model().to_string(),
        },
    )
    .await?;

    tracing::info!(
        record_id = record.id,
        headline = %record.analysis().headline(),
        "Analysis recorded"
    );

    Ok(record)
}
