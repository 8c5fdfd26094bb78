// Database module
// SQLite persistence plus the brute-force vector store built on top of it

pub mod sqlite;
pub mod vector_store;

pub use sqlite::*;
pub use vector_store::{SimilarityMatch, StoreError, VectorStore, cosine_similarity};
