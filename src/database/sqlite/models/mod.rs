#[cfg(test)]
mod tests;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Raw embedding row as stored. The vector is an opaque blob of
/// little-endian `f32` values; decoding happens in the vector store.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct EmbeddingRow {
    pub id: i64,
    pub document_id: i64,
    pub embedding: Vec<u8>,
    pub model_version: String,
    pub content_fingerprint: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Decoded embedding record handed to callers (and cached as JSON).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEmbedding {
    pub document_id: i64,
    pub vector: Vec<f32>,
    pub model_version: String,
    pub content_fingerprint: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// One analytics entry per search invocation, append-only.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSearchAnalytics {
    pub query_text: String,
    pub query_fingerprint: String,
    pub result_count: i64,
    pub execution_time: f64,
    pub fallback_used: bool,
    pub user_id: Option<i64>,
}

/// Aggregated analytics over a trailing window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsSummary {
    pub total_searches: i64,
    pub avg_execution_time: f64,
    pub avg_results: f64,
    pub fallback_rate: f64,
    pub top_queries: Vec<TopQuery>,
    pub daily: Vec<DailySearches>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct TopQuery {
    pub query_text: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct DailySearches {
    pub date: String,
    pub searches: i64,
}

/// Usage counter snapshot for quota displays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UsageStats {
    pub monthly_searches: i64,
    pub monthly_search_limit: u32,
    pub indexed_documents: i64,
    pub index_limit: u32,
    pub last_reset: Option<String>,
}
