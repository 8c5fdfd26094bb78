
use anyhow::{Context, Result};
use chrono::{Duration, NaiveDateTime, Utc};
use sqlx::SqlitePool;

use super::models::{
    AnalyticsSummary, DailySearches, EmbeddingRow, NewSearchAnalytics, TopQuery,
};

const META_MONTHLY_SEARCHES: &str = "monthly_searches";
const META_COUNTER_RESET: &str = "search_counter_reset";

pub struct EmbeddingQueries;

impl EmbeddingQueries {
    /// Insert or overwrite the single record for a document.
    #[inline]
    pub async fn upsert(
        pool: &SqlitePool,
        document_id: i64,
        embedding: &[u8],
        model_version: &str,
        content_fingerprint: &str,
    ) -> Result<(), sqlx::Error> {
        let now = Utc::now().naive_utc();

        sqlx::query(
            "INSERT INTO embeddings \
             (document_id, embedding, model_version, content_fingerprint, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?) \
             ON CONFLICT(document_id) DO UPDATE SET \
                 embedding = excluded.embedding, \
                 model_version = excluded.model_version, \
                 content_fingerprint = excluded.content_fingerprint, \
                 updated_at = excluded.updated_at",
        )
        .bind(document_id)
        .bind(embedding)
        .bind(model_version)
        .bind(content_fingerprint)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await?;

        Ok(())
    }

    #[inline]
    pub async fn get_by_document(
        pool: &SqlitePool,
        document_id: i64,
    ) -> Result<Option<EmbeddingRow>, sqlx::Error> {
        sqlx::query_as::<_, EmbeddingRow>(
            "SELECT id, document_id, embedding, model_version, content_fingerprint, \
                    created_at, updated_at \
             FROM embeddings WHERE document_id = ?",
        )
        .bind(document_id)
        .fetch_optional(pool)
        .await
    }

    /// All rows for the linear similarity scan, in stable document order.
    #[inline]
    pub async fn list_all(pool: &SqlitePool) -> Result<Vec<EmbeddingRow>, sqlx::Error> {
        sqlx::query_as::<_, EmbeddingRow>(
            "SELECT id, document_id, embedding, model_version, content_fingerprint, \
                    created_at, updated_at \
             FROM embeddings ORDER BY document_id ASC",
        )
        .fetch_all(pool)
        .await
    }

    #[inline]
    pub async fn document_ids(pool: &SqlitePool) -> Result<Vec<i64>, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT document_id FROM embeddings ORDER BY document_id ASC")
            .fetch_all(pool)
            .await
    }

    /// Idempotent delete; removing a missing record is not an error.
    #[inline]
    pub async fn delete_by_document(
        pool: &SqlitePool,
        document_id: i64,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM embeddings WHERE document_id = ?")
            .bind(document_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[inline]
    pub async fn count(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM embeddings")
            .fetch_one(pool)
            .await
    }

    #[inline]
    pub async fn delete_all(pool: &SqlitePool) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM embeddings").execute(pool).await?;
        Ok(())
    }
}

pub struct AnalyticsQueries;

impl AnalyticsQueries {
    #[inline]
    pub async fn record(pool: &SqlitePool, entry: &NewSearchAnalytics) -> Result<()> {
        sqlx::query(
            "INSERT INTO search_analytics \
             (query_text, query_fingerprint, result_count, execution_time, fallback_used, user_id, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&entry.query_text)
        .bind(&entry.query_fingerprint)
        .bind(entry.result_count)
        .bind(entry.execution_time)
        .bind(entry.fallback_used)
        .bind(entry.user_id)
        .bind(Utc::now().naive_utc())
        .execute(pool)
        .await
        .context("Failed to record search analytics")?;

        Ok(())
    }

    /// Aggregate searches over the trailing `days` window.
    #[inline]
    pub async fn summary(pool: &SqlitePool, days: i64) -> Result<AnalyticsSummary> {
        let cutoff = window_cutoff(days);

        let (total_searches, avg_execution_time, avg_results, fallback_count): (
            i64,
            Option<f64>,
            Option<f64>,
            Option<i64>,
        ) = sqlx::query_as(
            "SELECT COUNT(*), AVG(execution_time), AVG(result_count), \
                    SUM(CASE WHEN fallback_used THEN 1 ELSE 0 END) \
             FROM search_analytics WHERE created_at >= ?",
        )
        .bind(cutoff)
        .fetch_one(pool)
        .await
        .context("Failed to aggregate search analytics")?;

        let top_queries = sqlx::query_as::<_, TopQuery>(
            "SELECT MIN(query_text) AS query_text, COUNT(*) AS count \
             FROM search_analytics WHERE created_at >= ? \
             GROUP BY query_fingerprint ORDER BY count DESC, query_text ASC LIMIT 10",
        )
        .bind(cutoff)
        .fetch_all(pool)
        .await
        .context("Failed to list top queries")?;

        let daily = sqlx::query_as::<_, DailySearches>(
            "SELECT DATE(created_at) AS date, COUNT(*) AS searches \
             FROM search_analytics WHERE created_at >= ? \
             GROUP BY DATE(created_at) ORDER BY date ASC",
        )
        .bind(cutoff)
        .fetch_all(pool)
        .await
        .context("Failed to aggregate daily searches")?;

        let fallback_count = fallback_count.unwrap_or(0);
        let fallback_rate = if total_searches > 0 {
            fallback_count as f64 / total_searches as f64
        } else {
            0.0
        };

        Ok(AnalyticsSummary {
            total_searches,
            avg_execution_time: avg_execution_time.unwrap_or(0.0),
            avg_results: avg_results.unwrap_or(0.0),
            fallback_rate,
            top_queries,
            daily,
        })
    }
}

fn window_cutoff(days: i64) -> NaiveDateTime {
    Utc::now().naive_utc() - Duration::days(days.max(0))
}

pub struct UsageQueries;

impl UsageQueries {
    #[inline]
    pub async fn monthly_searches(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
        let value: Option<String> =
            sqlx::query_scalar("SELECT value FROM meta WHERE key = ?")
                .bind(META_MONTHLY_SEARCHES)
                .fetch_optional(pool)
                .await?;

        Ok(value.and_then(|v| v.parse().ok()).unwrap_or(0))
    }

    #[inline]
    pub async fn increment_monthly_searches(pool: &SqlitePool) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO meta (key, value) VALUES (?, '1') \
             ON CONFLICT(key) DO UPDATE SET value = CAST(value AS INTEGER) + 1",
        )
        .bind(META_MONTHLY_SEARCHES)
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Reset the monthly counter and stamp when it happened. Invoked once per
    /// billing period by an external scheduler.
    #[inline]
    pub async fn reset_monthly_searches(pool: &SqlitePool) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO meta (key, value) VALUES (?, '0') \
             ON CONFLICT(key) DO UPDATE SET value = '0'",
        )
        .bind(META_MONTHLY_SEARCHES)
        .execute(pool)
        .await?;

        sqlx::query(
            "INSERT INTO meta (key, value) VALUES (?, ?) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(META_COUNTER_RESET)
        .bind(Utc::now().naive_utc().to_string())
        .execute(pool)
        .await?;

        Ok(())
    }

    #[inline]
    pub async fn last_reset(pool: &SqlitePool) -> Result<Option<String>, sqlx::Error> {
        sqlx::query_scalar("SELECT value FROM meta WHERE key = ?")
            .bind(META_COUNTER_RESET)
            .fetch_optional(pool)
            .await
    }
}
