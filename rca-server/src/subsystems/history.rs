use rca_core::config::HistoryConfig;
use rca_core::db::{self, HistoryQuery};
use rca_core::models::{AnalysisRecord, Feedback};
use rca_core::RcaError;
use sqlx::SqlitePool;

/// Page size for a history read.
///
/// An explicit limit is clamped to `1..=max_limit`. Without one, a
/// creation-order read returns every record, while the newest-first "recent"
/// view falls back to `default_limit`.
pub fn effective_limit(
    requested: Option<u32>,
    newest_first: bool,
    config: &HistoryConfig,
) -> Option<u32> {
    let max = config.max_limit.max(1);
    match requested {
        Some(n) => Some(n.clamp(1, max)),
        None if newest_first => Some(config.default_limit.clamp(1, max)),
        None => None,
    }
}

pub async fn list_history(
    pool: &SqlitePool,
    config: &HistoryConfig,
    limit: Option<u32>,
    offset: u32,
    newest_first: bool,
) -> Result<Vec<AnalysisRecord>, RcaError> {
    db::list_records(
        pool,
        HistoryQuery {
            limit: effective_limit(limit, newest_first, config),
            offset,
            newest_first,
        },
    )
    .await
}

pub async fn get_entry(pool: &SqlitePool, id: i64) -> Result<AnalysisRecord, RcaError> {
    db::get_record(pool, id)
        .await?
        .ok_or_else(|| RcaError::NotFound(format!("analysis record {id}")))
}

pub async fn leave_feedback(
    pool: &SqlitePool,
    id: i64,
    helpful: bool,
    comment: Option<String>,
) -> Result<Feedback, RcaError> {
    db::insert_feedback(pool, id, helpful, comment).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_limit_defaults_and_clamps() {
        let config = HistoryConfig {
            default_limit: 10,
            max_limit: 50,
        };
        assert_eq!(effective_limit(None, true, &config), Some(10));
        assert_eq!(effective_limit(Some(25), false, &config), Some(25));
        assert_eq!(effective_limit(Some(500), true, &config), Some(50));
        assert_eq!(effective_limit(Some(0), false, &config), Some(1));
    }

    #[test]
    fn test_creation_order_without_limit_reads_everything() {
        let config = HistoryConfig {
            default_limit: 10,
            max_limit: 50,
        };
        assert_eq!(effective_limit(None, false, &config), None);
    }
}
