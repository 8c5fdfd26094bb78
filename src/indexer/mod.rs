// Indexer module
// Decides which documents need (re)embedding and drives the work in batches


use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::SearchConfig;
use crate::content::{ContentStore, DocumentStatus};
use crate::database::vector_store::VectorStore;
use crate::embeddings::{OpenAiClient, content_fingerprint, document_text};

/// Per-document failure inside a batch. One bad document never aborts the
/// rest of the batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexError {
    pub document_id: i64,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchOutcome {
    pub indexed: usize,
    pub errors: Vec<IndexError>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexStatus {
    pub indexed: i64,
    pub total: u64,
    pub needs_indexing: usize,
    pub percentage: f64,
    pub limit: u32,
    pub limit_reached: bool,
}

/// Drives (re)embedding of documents into the vector store, respecting the
/// global index-size quota. Invoked repeatedly by a scheduler or an
/// interactive batch trigger; it owns no loop of its own.
#[derive(Clone)]
pub struct Indexer {
    client: OpenAiClient,
    store: VectorStore,
    content: Arc<dyn ContentStore>,
    config: SearchConfig,
}

impl Indexer {
    #[inline]
    pub fn new(
        client: OpenAiClient,
        store: VectorStore,
        content: Arc<dyn ContentStore>,
        config: SearchConfig,
    ) -> Self {
        Self {
            client,
            store,
            content,
            config,
        }
    }

    /// Index a batch of documents. With no explicit ids, picks up to
    /// `batch_size` published documents that have no embedding yet.
    ///
    /// Partial-failure semantics: per-document embedding or storage failures
    /// land in `errors` and the batch continues. Only an inability to reach
    /// storage or the content store at all aborts the call.
    #[inline]
    pub async fn index_batch(
        &self,
        document_ids: Option<Vec<i64>>,
        batch_size: usize,
    ) -> Result<BatchOutcome> {
        let ids = match document_ids {
            Some(ids) if !ids.is_empty() => ids,
            _ => {
                self.store
                    .documents_needing_index(&self.config.indexed_types, batch_size)
                    .await?
            }
        };

        if ids.is_empty() {
            debug!("No documents need indexing");
            return Ok(BatchOutcome::default());
        }

        info!("Indexing batch of {} documents", ids.len());

        let mut outcome = BatchOutcome::default();

        for document_id in ids {
            // Quota re-check per document; hitting the cap ends the batch
            // early without an error.
            if self.has_reached_index_limit().await? {
                info!("Index limit reached, stopping batch early");
                break;
            }

            let Some(document) = self.content.get_document(document_id).await? else {
                continue;
            };
            if document.status != DocumentStatus::Published {
                continue;
            }

            let text = document_text(&document);
            let fingerprint = content_fingerprint(&text);

            let vector = match self.client.embed(&text) {
                Ok(vector) => vector,
                Err(e) => {
                    warn!("Embedding failed for document {}: {}", document_id, e);
                    outcome.errors.push(IndexError {
                        document_id,
                        message: e.to_string(),
                    });
                    continue;
                }
            };

            if let Err(e) = self.store.store(document_id, &vector, &fingerprint).await {
                warn!("Failed to store embedding for document {}: {}", document_id, e);
                outcome.errors.push(IndexError {
                    document_id,
                    message: e.to_string(),
                });
                continue;
            }

            outcome.indexed += 1;
        }

        info!(
            "Batch complete: {} indexed, {} errors",
            outcome.indexed,
            outcome.errors.len()
        );

        Ok(outcome)
    }

    /// React to a document change: drop the record when the document is gone
    /// or unpublished, re-embed when the content fingerprint moved, and do
    /// nothing otherwise. Embedding failures are logged, never propagated.
    #[inline]
    pub async fn sync_document(&self, document_id: i64) -> Result<()> {
        let Some(document) = self.content.get_document(document_id).await? else {
            self.store.delete(document_id).await?;
            return Ok(());
        };

        if !self.config.indexed_types.contains(&document.doc_type) {
            return Ok(());
        }

        if document.status != DocumentStatus::Published {
            self.store.delete(document_id).await?;
            return Ok(());
        }

        let text = document_text(&document);
        let fingerprint = content_fingerprint(&text);

        if !self.store.needs_reindex(document_id, &fingerprint).await? {
            return Ok(());
        }

        match self.client.embed(&text) {
            Ok(vector) => {
                if let Err(e) = self.store.store(document_id, &vector, &fingerprint).await {
                    warn!("Failed to store embedding for document {}: {}", document_id, e);
                }
            }
            Err(e) => {
                warn!("Failed to re-embed document {}: {}", document_id, e);
            }
        }

        Ok(())
    }

    /// Drop a deleted document's embedding.
    #[inline]
    pub async fn remove_document(&self, document_id: i64) -> Result<()> {
        self.store.delete(document_id).await?;
        Ok(())
    }

    #[inline]
    pub async fn index_status(&self) -> Result<IndexStatus> {
        let indexed = self.store.count().await?;
        let total = self
            .content
            .count_documents(&self.config.indexed_types, DocumentStatus::Published)
            .await?;
        let needs_indexing = self
            .store
            .documents_needing_index(&self.config.indexed_types, 1000)
            .await?
            .len();

        let percentage = if total > 0 {
            ((indexed as f64 / total as f64) * 1000.0).round() / 10.0
        } else {
            0.0
        };

        Ok(IndexStatus {
            indexed,
            total,
            needs_indexing,
            percentage,
            limit: self.config.index_limit,
            limit_reached: indexed >= i64::from(self.config.index_limit),
        })
    }

    /// Remove every stored embedding; the next batch starts from scratch.
    #[inline]
    pub async fn clear_index(&self) -> Result<()> {
        self.store.clear_all().await?;
        info!("Cleared the embedding index");
        Ok(())
    }

    async fn has_reached_index_limit(&self) -> Result<bool> {
        Ok(self.store.count().await? >= i64::from(self.config.index_limit))
    }
}
