// Content collaborator boundary
// The engine reads documents and runs keyword fallback through this trait;
// it never mutates platform content.

pub mod sqlite;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};

pub use sqlite::SqliteContentStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Document {
    pub id: i64,
    pub doc_type: String,
    pub status: DocumentStatus,
    pub title: String,
    pub excerpt: String,
    pub body: String,
    pub author_id: i64,
    pub author_name: String,
    pub published_at: NaiveDateTime,
    pub permalink: String,
    pub thumbnail_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Published,
    Draft,
    Archived,
}

impl std::fmt::Display for DocumentStatus {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            DocumentStatus::Published => write!(f, "published"),
            DocumentStatus::Draft => write!(f, "draft"),
            DocumentStatus::Archived => write!(f, "archived"),
        }
    }
}

impl Document {
    #[inline]
    pub fn is_published(&self) -> bool {
        self.status == DocumentStatus::Published
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDocument {
    pub doc_type: String,
    pub status: DocumentStatus,
    pub title: String,
    pub excerpt: String,
    pub body: String,
    pub author_id: i64,
    pub author_name: String,
    pub published_at: NaiveDateTime,
    pub permalink: String,
    pub thumbnail_url: Option<String>,
}

/// Read-only access to the platform's document store, plus its native
/// keyword search used as the fallback path.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Fetch a single document, `None` if it does not exist.
    async fn get_document(&self, id: i64) -> anyhow::Result<Option<Document>>;

    /// List document ids of the given types and status in ascending id
    /// order. `None` limit means unbounded.
    async fn list_documents(
        &self,
        types: &[String],
        status: DocumentStatus,
        limit: Option<usize>,
    ) -> anyhow::Result<Vec<i64>>;

    /// Count documents of the given types and status.
    async fn count_documents(
        &self,
        types: &[String],
        status: DocumentStatus,
    ) -> anyhow::Result<u64>;

    /// Native keyword search over published documents, paginated. Returns the
    /// page of documents and the total match count.
    async fn keyword_search(
        &self,
        query: &str,
        types: &[String],
        page: usize,
        per_page: usize,
    ) -> anyhow::Result<(Vec<Document>, u64)>;
}
