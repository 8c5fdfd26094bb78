
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::SqlitePool;
use tracing::debug;

use super::{ContentStore, Document, DocumentStatus, NewDocument};

/// Reference [`ContentStore`] backed by a `documents` table.
///
/// Production deployments point the engine at whatever store the platform
/// exposes; this implementation is what the CLI and tests run against.
#[derive(Debug, Clone)]
pub struct SqliteContentStore {
    pool: SqlitePool,
}

impl SqliteContentStore {
    #[inline]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    #[inline]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    #[inline]
    pub async fn insert_document(&self, new: NewDocument) -> Result<Document> {
        let id = sqlx::query(
            "INSERT INTO documents \
             (doc_type, status, title, excerpt, body, author_id, author_name, published_at, permalink, thumbnail_url) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&new.doc_type)
        .bind(new.status)
        .bind(&new.title)
        .bind(&new.excerpt)
        .bind(&new.body)
        .bind(new.author_id)
        .bind(&new.author_name)
        .bind(new.published_at)
        .bind(&new.permalink)
        .bind(&new.thumbnail_url)
        .execute(&self.pool)
        .await
        .context("Failed to insert document")?
        .last_insert_rowid();

        self.get_document(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Failed to retrieve inserted document"))
    }

    #[inline]
    pub async fn set_status(&self, id: i64, status: DocumentStatus) -> Result<()> {
        sqlx::query("UPDATE documents SET status = ? WHERE id = ?")
            .bind(status)
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to update document status")?;
        Ok(())
    }

    #[inline]
    pub async fn delete_document(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete document")?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl ContentStore for SqliteContentStore {
    #[inline]
    async fn get_document(&self, id: i64) -> Result<Option<Document>> {
        let document = sqlx::query_as::<_, Document>(
            "SELECT id, doc_type, status, title, excerpt, body, \
                    author_id, author_name, published_at, permalink, thumbnail_url \
             FROM documents WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to get document by id")?;

        Ok(document)
    }

    #[inline]
    async fn list_documents(
        &self,
        types: &[String],
        status: DocumentStatus,
        limit: Option<usize>,
    ) -> Result<Vec<i64>> {
        if types.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT id FROM documents WHERE status = ? AND doc_type IN ({}) ORDER BY id ASC LIMIT ?",
            type_placeholders(types.len())
        );

        let mut query = sqlx::query_scalar::<_, i64>(&sql).bind(status);
        for doc_type in types {
            query = query.bind(doc_type);
        }
        // SQLite treats a negative LIMIT as unbounded.
        query = query.bind(limit.map_or(-1i64, |l| i64::try_from(l).unwrap_or(i64::MAX)));

        let ids = query
            .fetch_all(&self.pool)
            .await
            .context("Failed to list documents")?;

        Ok(ids)
    }

    #[inline]
    async fn count_documents(
        &self,
        types: &[String],
        status: DocumentStatus,
    ) -> Result<u64> {
        if types.is_empty() {
            return Ok(0);
        }

        let sql = format!(
            "SELECT COUNT(*) FROM documents WHERE status = ? AND doc_type IN ({})",
            type_placeholders(types.len())
        );

        let mut query = sqlx::query_scalar::<_, i64>(&sql).bind(status);
        for doc_type in types {
            query = query.bind(doc_type);
        }

        let count = query
            .fetch_one(&self.pool)
            .await
            .context("Failed to count documents")?;

        Ok(u64::try_from(count).unwrap_or(0))
    }

    #[inline]
    async fn keyword_search(
        &self,
        query: &str,
        types: &[String],
        page: usize,
        per_page: usize,
    ) -> Result<(Vec<Document>, u64)> {
        if types.is_empty() {
            return Ok((Vec::new(), 0));
        }

        let pattern = format!("%{}%", escape_like(query));
        let placeholders = type_placeholders(types.len());

        let count_sql = format!(
            "SELECT COUNT(*) FROM documents \
             WHERE status = 'published' AND doc_type IN ({placeholders}) \
             AND (title LIKE ? ESCAPE '\\' OR excerpt LIKE ? ESCAPE '\\' OR body LIKE ? ESCAPE '\\')"
        );

        let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
        for doc_type in types {
            count_query = count_query.bind(doc_type);
        }
        count_query = count_query.bind(&pattern).bind(&pattern).bind(&pattern);

        let total = count_query
            .fetch_one(&self.pool)
            .await
            .context("Failed to count keyword matches")?;

        let offset = page.saturating_sub(1).saturating_mul(per_page);
        let page_sql = format!(
            "SELECT id, doc_type, status, title, excerpt, body, \
                    author_id, author_name, published_at, permalink, thumbnail_url \
             FROM documents \
             WHERE status = 'published' AND doc_type IN ({placeholders}) \
             AND (title LIKE ? ESCAPE '\\' OR excerpt LIKE ? ESCAPE '\\' OR body LIKE ? ESCAPE '\\') \
             ORDER BY published_at DESC, id ASC LIMIT ? OFFSET ?"
        );

        let mut page_query = sqlx::query_as::<_, Document>(&page_sql);
        for doc_type in types {
            page_query = page_query.bind(doc_type);
        }
        page_query = page_query
            .bind(&pattern)
            .bind(&pattern)
            .bind(&pattern)
            .bind(i64::try_from(per_page).unwrap_or(i64::MAX))
            .bind(i64::try_from(offset).unwrap_or(i64::MAX));

        let documents = page_query
            .fetch_all(&self.pool)
            .await
            .context("Failed to run keyword search")?;

        debug!(
            "Keyword search for '{}' matched {} documents",
            query, total
        );

        Ok((documents, u64::try_from(total).unwrap_or(0)))
    }
}

fn type_placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

fn escape_like(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}
