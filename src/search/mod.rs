
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::config::SearchConfig;
use crate::content::{ContentStore, Document};
use crate::database::sqlite::Database;
use crate::database::sqlite::models::{AnalyticsSummary, NewSearchAnalytics, UsageStats};
use crate::database::sqlite::queries::{AnalyticsQueries, UsageQueries};
use crate::database::vector_store::VectorStore;
use crate::embeddings::OpenAiClient;

/// Recorded query text is bounded; the fingerprint still covers the full query.
const MAX_RECORDED_QUERY_CHARS: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchType {
    Semantic,
    Keyword,
}

/// Why a search degraded to the keyword path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FallbackReason {
    LimitReached,
    EmbeddingError,
    NoResults,
    StorageError,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultAuthor {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResultItem {
    pub id: i64,
    pub title: String,
    pub excerpt: String,
    pub url: String,
    pub doc_type: String,
    pub date: String,
    pub author: ResultAuthor,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f64>,
}

/// Response envelope shared by the semantic and keyword paths, so callers
/// never branch on which path ran.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResultItem>,
    pub total: u64,
    pub page: usize,
    pub per_page: usize,
    pub query: String,
    pub fallback_used: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<FallbackReason>,
    pub execution_time: f64,
    pub search_type: SearchType,
}

/// Per-request overrides; anything unset comes from [`SearchConfig`].
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    pub page: Option<usize>,
    pub per_page: Option<usize>,
    pub threshold: Option<f32>,
    pub doc_types: Option<Vec<String>>,
    pub user_id: Option<i64>,
}

/// Orchestrates a search request: quota gate, query embedding, similarity
/// scan, pagination, and the tiered fallback to keyword search.
///
/// Every failure inside `search` resolves to a fallback or a degraded
/// success; the caller never sees an error from it.
#[derive(Clone)]
pub struct SearchHandler {
    client: OpenAiClient,
    store: VectorStore,
    content: Arc<dyn ContentStore>,
    database: Database,
    config: SearchConfig,
}

impl SearchHandler {
    #[inline]
    pub fn new(
        client: OpenAiClient,
        store: VectorStore,
        content: Arc<dyn ContentStore>,
        database: Database,
        config: SearchConfig,
    ) -> Self {
        Self {
            client,
            store,
            content,
            database,
            config,
        }
    }

    /// Semantic search is available once a credential is stored.
    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.client.credentials().is_configured()
    }

    /// Run one search pass. Exactly one terminal outcome per call: a semantic
    /// result page, a degraded empty success, or a keyword fallback.
    #[inline]
    pub async fn search(&self, query: &str, options: &SearchOptions) -> SearchResponse {
        let started = Instant::now();

        let page = options.page.unwrap_or(1).max(1);
        let per_page = options
            .per_page
            .unwrap_or(self.config.per_page as usize)
            .max(1);
        let threshold = options
            .threshold
            .unwrap_or(self.config.similarity_threshold);
        let doc_types = options
            .doc_types
            .clone()
            .unwrap_or_else(|| self.config.indexed_types.clone());

        if self.has_reached_search_limit().await {
            return self
                .fallback_search(
                    query,
                    page,
                    per_page,
                    &doc_types,
                    FallbackReason::LimitReached,
                    options.user_id,
                    started,
                )
                .await;
        }

        let query_vector = match self.client.embed(query) {
            Ok(vector) => vector,
            Err(e) => {
                warn!("Query embedding failed: {}", e);
                return self
                    .fallback_search(
                        query,
                        page,
                        per_page,
                        &doc_types,
                        FallbackReason::EmbeddingError,
                        options.user_id,
                        started,
                    )
                    .await;
            }
        };

        let similar = match self
            .store
            .find_similar(
                &query_vector,
                self.config.max_results as usize,
                threshold,
                &doc_types,
            )
            .await
        {
            Ok(matches) => matches,
            Err(e) => {
                warn!("Similarity search failed: {}", e);
                return self
                    .fallback_search(
                        query,
                        page,
                        per_page,
                        &doc_types,
                        FallbackReason::StorageError,
                        options.user_id,
                        started,
                    )
                    .await;
            }
        };

        if similar.is_empty() {
            if self.config.fallback_enabled {
                return self
                    .fallback_search(
                        query,
                        page,
                        per_page,
                        &doc_types,
                        FallbackReason::NoResults,
                        options.user_id,
                        started,
                    )
                    .await;
            }

            // Fallback disabled: an empty semantic result is a success.
            let execution_time = started.elapsed().as_secs_f64();
            self.record_search(query, 0, execution_time, false, options.user_id)
                .await;

            return SearchResponse {
                results: Vec::new(),
                total: 0,
                page,
                per_page,
                query: query.to_string(),
                fallback_used: false,
                fallback_reason: None,
                execution_time,
                search_type: SearchType::Semantic,
            };
        }

        let offset = page.saturating_sub(1).saturating_mul(per_page);
        let mut results = Vec::new();

        for candidate in similar.iter().skip(offset).take(per_page) {
            match self.content.get_document(candidate.document_id).await {
                Ok(Some(document)) => {
                    results.push(format_result(&document, Some(candidate.similarity)));
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(
                        "Failed to resolve document {} for result page: {}",
                        candidate.document_id, e
                    );
                }
            }
        }

        let total = similar.len() as u64;
        let execution_time = started.elapsed().as_secs_f64();

        self.increment_search_counter().await;
        self.record_search(query, total, execution_time, false, options.user_id)
            .await;

        debug!(
            "Semantic search for '{}' matched {} documents in {:.3}s",
            query, total, execution_time
        );

        SearchResponse {
            results,
            total,
            page,
            per_page,
            query: query.to_string(),
            fallback_used: false,
            fallback_reason: None,
            execution_time,
            search_type: SearchType::Semantic,
        }
    }

    /// Keyword fallback with identical pagination. Shape-compatible with the
    /// semantic path; the `similarity` field is simply absent.
    async fn fallback_search(
        &self,
        query: &str,
        page: usize,
        per_page: usize,
        doc_types: &[String],
        reason: FallbackReason,
        user_id: Option<i64>,
        started: Instant,
    ) -> SearchResponse {
        debug!("Falling back to keyword search: {:?}", reason);

        let (documents, total) = match self
            .content
            .keyword_search(query, doc_types, page, per_page)
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Keyword fallback failed: {}", e);
                (Vec::new(), 0)
            }
        };

        let results = documents
            .iter()
            .map(|document| format_result(document, None))
            .collect();

        let execution_time = started.elapsed().as_secs_f64();
        self.record_search(query, total, execution_time, true, user_id)
            .await;

        SearchResponse {
            results,
            total,
            page,
            per_page,
            query: query.to_string(),
            fallback_used: true,
            fallback_reason: Some(reason),
            execution_time,
            search_type: SearchType::Keyword,
        }
    }

    /// Advisory check only: no lock spans check and increment, so concurrent
    /// searches can overshoot the limit by a small margin.
    #[inline]
    pub async fn has_reached_search_limit(&self) -> bool {
        match UsageQueries::monthly_searches(self.database.pool()).await {
            Ok(count) => count >= i64::from(self.config.monthly_search_limit),
            Err(e) => {
                warn!("Failed to read monthly search counter: {}", e);
                false
            }
        }
    }

    #[inline]
    pub async fn has_reached_index_limit(&self) -> bool {
        match self.store.count().await {
            Ok(count) => count >= i64::from(self.config.index_limit),
            Err(e) => {
                warn!("Failed to count stored embeddings: {}", e);
                false
            }
        }
    }

    async fn increment_search_counter(&self) {
        if let Err(e) = UsageQueries::increment_monthly_searches(self.database.pool()).await {
            warn!("Failed to increment monthly search counter: {}", e);
        }
    }

    /// Reset the monthly counter; the external scheduler calls this once per
    /// billing period.
    #[inline]
    pub async fn reset_monthly_counter(&self) -> Result<()> {
        UsageQueries::reset_monthly_searches(self.database.pool()).await?;
        Ok(())
    }

    #[inline]
    pub async fn get_usage_stats(&self) -> Result<UsageStats> {
        let monthly_searches = UsageQueries::monthly_searches(self.database.pool()).await?;
        let indexed_documents = self.store.count().await?;
        let last_reset = UsageQueries::last_reset(self.database.pool()).await?;

        Ok(UsageStats {
            monthly_searches,
            monthly_search_limit: self.config.monthly_search_limit,
            indexed_documents,
            index_limit: self.config.index_limit,
            last_reset,
        })
    }

    #[inline]
    pub async fn analytics_summary(&self, days: i64) -> Result<AnalyticsSummary> {
        AnalyticsQueries::summary(self.database.pool(), days).await
    }

    async fn record_search(
        &self,
        query: &str,
        result_count: u64,
        execution_time: f64,
        fallback_used: bool,
        user_id: Option<i64>,
    ) {
        let entry = NewSearchAnalytics {
            query_text: query.chars().take(MAX_RECORDED_QUERY_CHARS).collect(),
            query_fingerprint: query_fingerprint(query),
            result_count: i64::try_from(result_count).unwrap_or(i64::MAX),
            execution_time,
            fallback_used,
            user_id,
        };

        if let Err(e) = AnalyticsQueries::record(self.database.pool(), &entry).await {
            warn!("Failed to record search analytics: {}", e);
        }
    }
}

fn format_result(document: &Document, similarity: Option<f32>) -> SearchResultItem {
    SearchResultItem {
        id: document.id,
        title: document.title.clone(),
        excerpt: document.excerpt.clone(),
        url: document.permalink.clone(),
        doc_type: document.doc_type.clone(),
        date: document.published_at.and_utc().to_rfc3339(),
        author: ResultAuthor {
            id: document.author_id,
            name: document.author_name.clone(),
        },
        thumbnail: document.thumbnail_url.clone(),
        similarity: similarity.map(round_similarity),
    }
}

/// Similarity scores are rounded to 4 decimal places for display.
fn round_similarity(similarity: f32) -> f64 {
    (f64::from(similarity) * 10_000.0).round() / 10_000.0
}

/// Fingerprint of the normalized query, used to group identical queries in
/// analytics.
fn query_fingerprint(query: &str) -> String {
    hex::encode(Sha256::digest(query.trim().to_lowercase().as_bytes()))
}
