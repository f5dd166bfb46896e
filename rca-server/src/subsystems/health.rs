use rca_core::db;
use rca_core::RcaError;
use sqlx::SqlitePool;

/// Result of the offline `--health` check.
#[derive(Debug)]
pub struct StoreHealth {
    pub sqlite_version: String,
    pub records: i64,
}

/// Confirm the store answers queries and the history table is readable.
pub async fn check_store(pool: &SqlitePool) -> Result<StoreHealth, RcaError> {
    let sqlite_version = db::health_check(pool).await?;
    let records = db::count_records(pool).await?;
    Ok(StoreHealth {
        sqlite_version,
        records,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rca_core::config::DatabaseConfig;

    async fn memory_pool() -> SqlitePool {
        let pool = db::create_pool(&DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
        })
        .await
        .unwrap();
        db::init_schema(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn test_healthy_store_reports_version_and_count() {
        let health = check_store(&memory_pool().await).await.unwrap();
        assert!(!health.sqlite_version.is_empty());
        assert_eq!(health.records, 0);
    }

    #[tokio::test]
    async fn test_missing_schema_fails() {
        let pool = db::create_pool(&DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
        })
        .await
        .unwrap();
        assert!(check_store(&pool).await.is_err());
    }

    #[tokio::test]
    async fn test_closed_pool_fails() {
        let pool = memory_pool().await;
        pool.close().await;
        assert!(matches!(
            check_store(&pool).await,
            Err(RcaError::Database(_))
        ));
    }
}
