#[cfg(test)]
mod tests;

use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

use crate::cache::ObjectCache;
use crate::content::{ContentStore, DocumentStatus};
use crate::database::sqlite::Database;
use crate::database::sqlite::models::StoredEmbedding;
use crate::database::sqlite::queries::EmbeddingQueries;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Cannot store an empty embedding")]
    EmptyVector,

    #[error("Embedding has {actual} dimensions, expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Storage failure: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("Content store failure: {0}")]
    Content(#[from] anyhow::Error),
}

/// A scored candidate from the similarity scan.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityMatch {
    pub document_id: i64,
    pub similarity: f32,
}

/// Persistent store of one embedding per document with brute-force
/// cosine-similarity search.
///
/// Linear scan is the deliberate choice here: the store holds at most tens of
/// thousands of vectors, where a full scan stays in the low milliseconds and
/// an ANN index would buy nothing but complexity.
#[derive(Clone)]
pub struct VectorStore {
    database: Database,
    content: Arc<dyn ContentStore>,
    cache: Arc<dyn ObjectCache>,
    dimensions: usize,
    model_version: String,
    cache_ttl: Duration,
}

impl VectorStore {
    #[inline]
    pub fn new(
        database: Database,
        content: Arc<dyn ContentStore>,
        cache: Arc<dyn ObjectCache>,
        dimensions: usize,
        model_version: impl Into<String>,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            database,
            content,
            cache,
            dimensions,
            model_version: model_version.into(),
            cache_ttl,
        }
    }

    /// Upsert the embedding for a document and drop any cached copy.
    #[inline]
    pub async fn store(
        &self,
        document_id: i64,
        vector: &[f32],
        content_fingerprint: &str,
    ) -> Result<(), StoreError> {
        if vector.is_empty() {
            return Err(StoreError::EmptyVector);
        }
        if vector.len() != self.dimensions {
            return Err(StoreError::DimensionMismatch {
                expected: self.dimensions,
                actual: vector.len(),
            });
        }

        EmbeddingQueries::upsert(
            self.database.pool(),
            document_id,
            &vec_to_blob(vector),
            &self.model_version,
            content_fingerprint,
        )
        .await?;

        self.cache.delete(&record_cache_key(document_id));

        debug!("Stored embedding for document {}", document_id);
        Ok(())
    }

    /// Fetch a document's embedding record: cache first, storage on miss.
    /// An undecodable cache payload falls through to storage.
    #[inline]
    pub async fn get(&self, document_id: i64) -> Result<Option<StoredEmbedding>, StoreError> {
        let cache_key = record_cache_key(document_id);

        if let Some(cached) = self.cache.get(&cache_key) {
            match serde_json::from_str::<StoredEmbedding>(&cached) {
                Ok(record) => return Ok(Some(record)),
                Err(_) => self.cache.delete(&cache_key),
            }
        }

        let Some(row) = EmbeddingQueries::get_by_document(self.database.pool(), document_id).await?
        else {
            return Ok(None);
        };

        let record = StoredEmbedding {
            document_id: row.document_id,
            vector: blob_to_vec(&row.embedding),
            model_version: row.model_version,
            content_fingerprint: row.content_fingerprint,
            created_at: row.created_at,
            updated_at: row.updated_at,
        };

        if let Ok(encoded) = serde_json::to_string(&record) {
            self.cache.set(&cache_key, encoded, self.cache_ttl);
        }

        Ok(Some(record))
    }

    /// Delete a document's embedding. Deleting a missing record is fine.
    #[inline]
    pub async fn delete(&self, document_id: i64) -> Result<(), StoreError> {
        EmbeddingQueries::delete_by_document(self.database.pool(), document_id).await?;
        self.cache.delete(&record_cache_key(document_id));
        Ok(())
    }

    /// A document needs (re)indexing when it has no record or its stored
    /// fingerprint no longer matches the current content.
    #[inline]
    pub async fn needs_reindex(
        &self,
        document_id: i64,
        content_fingerprint: &str,
    ) -> Result<bool, StoreError> {
        match self.get(document_id).await? {
            Some(record) => Ok(record.content_fingerprint != content_fingerprint),
            None => Ok(true),
        }
    }

    /// Linear scan over every stored vector. Discards records whose document
    /// is gone, unpublished, or of a disallowed type; keeps scores at or
    /// above `threshold`; orders by similarity descending with ties broken by
    /// ascending document id; truncates to `limit`.
    #[inline]
    pub async fn find_similar(
        &self,
        query_vector: &[f32],
        limit: usize,
        threshold: f32,
        allowed_types: &[String],
    ) -> Result<Vec<SimilarityMatch>, StoreError> {
        let rows = EmbeddingQueries::list_all(self.database.pool()).await?;

        let mut matches = Vec::new();

        for row in rows {
            let document = match self.content.get_document(row.document_id).await {
                Ok(Some(document)) => document,
                Ok(None) => continue,
                Err(e) => {
                    warn!(
                        "Skipping document {} during similarity scan: {}",
                        row.document_id, e
                    );
                    continue;
                }
            };

            if document.status != DocumentStatus::Published
                || !allowed_types.contains(&document.doc_type)
            {
                continue;
            }

            let vector = blob_to_vec(&row.embedding);
            let similarity = cosine_similarity(query_vector, &vector);

            if similarity >= threshold {
                matches.push(SimilarityMatch {
                    document_id: row.document_id,
                    similarity,
                });
            }
        }

        matches.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.document_id.cmp(&b.document_id))
        });
        matches.truncate(limit);

        Ok(matches)
    }

    #[inline]
    pub async fn count(&self) -> Result<i64, StoreError> {
        Ok(EmbeddingQueries::count(self.database.pool()).await?)
    }

    /// Published documents of the allowed types with no stored embedding,
    /// in ascending id order, up to `limit`.
    #[inline]
    pub async fn documents_needing_index(
        &self,
        allowed_types: &[String],
        limit: usize,
    ) -> Result<Vec<i64>, StoreError> {
        let indexed: HashSet<i64> = EmbeddingQueries::document_ids(self.database.pool())
            .await?
            .into_iter()
            .collect();

        let candidates = self
            .content
            .list_documents(allowed_types, DocumentStatus::Published, None)
            .await?;

        Ok(candidates
            .into_iter()
            .filter(|id| !indexed.contains(id))
            .take(limit)
            .collect())
    }

    /// Remove every record and flush the cache namespace.
    #[inline]
    pub async fn clear_all(&self) -> Result<(), StoreError> {
        EmbeddingQueries::delete_all(self.database.pool()).await?;
        self.cache.flush();
        Ok(())
    }
}

fn record_cache_key(document_id: i64) -> String {
    format!("embedding:{document_id}")
}

/// Cosine similarity of two vectors, in `[-1, 1]`.
///
/// Defined as 0.0 when the vectors differ in length (cross-model or corrupt
/// data) or when either has zero magnitude.
#[inline]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denominator = norm_a.sqrt() * norm_b.sqrt();
    if denominator < f32::EPSILON {
        return 0.0;
    }

    dot / denominator
}

/// Encode a vector as little-endian `f32` bytes for BLOB storage.
#[inline]
pub fn vec_to_blob(vector: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vector.len() * 4);
    for &value in vector {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a vector. Trailing partial values are dropped.
#[inline]
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}
