use super::*;
use crate::cache::MemoryCache;
use crate::content::{DocumentStatus, NewDocument, SqliteContentStore};
use chrono::NaiveDate;
use tempfile::TempDir;

const DIMS: usize = 3;

async fn create_test_store() -> (TempDir, VectorStore, SqliteContentStore, Arc<MemoryCache>) {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let database = Database::initialize_from_config_dir(temp_dir.path())
        .await
        .expect("Failed to initialize database");

    let content = SqliteContentStore::new(database.pool().clone());
    let cache = Arc::new(MemoryCache::new());

    let store = VectorStore::new(
        database,
        Arc::new(content.clone()) as Arc<dyn ContentStore>,
        Arc::clone(&cache) as Arc<dyn ObjectCache>,
        DIMS,
        "text-embedding-3-small",
        Duration::from_secs(3600),
    );

    (temp_dir, store, content, cache)
}

fn make_document(title: &str, doc_type: &str, status: DocumentStatus) -> NewDocument {
    NewDocument {
        doc_type: doc_type.to_string(),
        status,
        title: title.to_string(),
        excerpt: String::new(),
        body: format!("{title} body"),
        author_id: 1,
        author_name: "Editor".to_string(),
        published_at: NaiveDate::from_ymd_opt(2024, 5, 1)
            .expect("valid date")
            .and_hms_opt(9, 0, 0)
            .expect("valid time"),
        permalink: format!("https://example.com/{}", title.to_lowercase()),
        thumbnail_url: None,
    }
}

async fn seed_document(
    content: &SqliteContentStore,
    title: &str,
    status: DocumentStatus,
) -> i64 {
    content
        .insert_document(make_document(title, "post", status))
        .await
        .expect("Failed to seed document")
        .id
}

fn post_types() -> Vec<String> {
    vec!["post".to_string()]
}

mod similarity {
    use super::*;

    #[test]
    fn identical_vectors_score_one() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn orthogonal_vectors_score_zero() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn opposite_vectors_score_negative_one() {
        let a = vec![1.0, 0.0];
        let b = vec![-1.0, 0.0];
        assert!((cosine_similarity(&a, &b) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn zero_magnitude_scores_zero() {
        let a = vec![0.0, 0.0, 0.0];
        let b = vec![1.0, 2.0, 3.0];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
        assert_eq!(cosine_similarity(&b, &a), 0.0);
    }

    #[test]
    fn length_mismatch_scores_zero() {
        let a = vec![1.0, 2.0];
        let b = vec![1.0, 2.0, 3.0];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
    }

    #[test]
    fn empty_vectors_score_zero() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }

    #[test]
    fn blob_round_trip() {
        let vector = vec![1.0f32, -2.5, 3.125, 0.0, -0.001];
        assert_eq!(blob_to_vec(&vec_to_blob(&vector)), vector);
    }

    #[test]
    fn truncated_blob_drops_partial_value() {
        let mut blob = vec_to_blob(&[1.0, 2.0]);
        blob.pop();
        assert_eq!(blob_to_vec(&blob), vec![1.0]);
    }
}

#[tokio::test]
async fn store_rejects_empty_vector() {
    let (_temp_dir, store, _content, _cache) = create_test_store().await;

    let result = store.store(1, &[], "fp").await;
    assert!(matches!(result, Err(StoreError::EmptyVector)));
}

#[tokio::test]
async fn store_rejects_dimension_mismatch() {
    let (_temp_dir, store, _content, _cache) = create_test_store().await;

    let result = store.store(1, &[1.0, 0.0], "fp").await;
    assert!(matches!(
        result,
        Err(StoreError::DimensionMismatch {
            expected: DIMS,
            actual: 2
        })
    ));
}

#[tokio::test]
async fn store_twice_keeps_one_record_with_latest_data() {
    let (_temp_dir, store, _content, _cache) = create_test_store().await;

    store.store(1, &[1.0, 0.0, 0.0], "fp-1").await.expect("store");
    store.store(1, &[0.0, 1.0, 0.0], "fp-2").await.expect("store");

    assert_eq!(store.count().await.expect("count"), 1);

    let record = store.get(1).await.expect("get").expect("record exists");
    assert_eq!(record.vector, vec![0.0, 1.0, 0.0]);
    assert_eq!(record.content_fingerprint, "fp-2");
}

#[tokio::test]
async fn get_missing_record_is_none() {
    let (_temp_dir, store, _content, _cache) = create_test_store().await;
    assert!(store.get(404).await.expect("get").is_none());
}

#[tokio::test]
async fn needs_reindex_tracks_fingerprint() {
    let (_temp_dir, store, _content, _cache) = create_test_store().await;

    assert!(store.needs_reindex(1, "fp").await.expect("check"));

    store.store(1, &[1.0, 0.0, 0.0], "fp").await.expect("store");
    assert!(!store.needs_reindex(1, "fp").await.expect("check"));
    assert!(store.needs_reindex(1, "other").await.expect("check"));
}

#[tokio::test]
async fn delete_is_idempotent() {
    let (_temp_dir, store, _content, _cache) = create_test_store().await;

    store.store(1, &[1.0, 0.0, 0.0], "fp").await.expect("store");
    store.delete(1).await.expect("delete");
    store.delete(1).await.expect("repeat delete");

    assert!(store.get(1).await.expect("get").is_none());
}

#[tokio::test]
async fn get_repopulates_cache_and_store_invalidates_it() {
    let (_temp_dir, store, _content, cache) = create_test_store().await;

    store.store(1, &[1.0, 0.0, 0.0], "fp-1").await.expect("store");

    assert!(cache.get("embedding:1").is_none());
    store.get(1).await.expect("get");
    assert!(cache.get("embedding:1").is_some());

    store.store(1, &[0.0, 1.0, 0.0], "fp-2").await.expect("store");
    assert!(cache.get("embedding:1").is_none());

    let record = store.get(1).await.expect("get").expect("record exists");
    assert_eq!(record.content_fingerprint, "fp-2");
}

#[tokio::test]
async fn corrupt_cache_entry_falls_through_to_storage() {
    let (_temp_dir, store, _content, cache) = create_test_store().await;

    store.store(1, &[1.0, 0.0, 0.0], "fp").await.expect("store");
    cache.set("embedding:1", "garbage".to_string(), Duration::from_secs(60));

    let record = store.get(1).await.expect("get").expect("record exists");
    assert_eq!(record.content_fingerprint, "fp");
}

#[tokio::test]
async fn find_similar_basic_scenario() {
    let (_temp_dir, store, content, _cache) = create_test_store().await;

    let a = seed_document(&content, "A", DocumentStatus::Published).await;
    let b = seed_document(&content, "B", DocumentStatus::Published).await;

    store.store(a, &[1.0, 0.0, 0.0], "fp-a").await.expect("store");
    store.store(b, &[0.0, 1.0, 0.0], "fp-b").await.expect("store");

    let matches = store
        .find_similar(&[1.0, 0.0, 0.0], 10, 0.9, &post_types())
        .await
        .expect("search");

    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].document_id, a);
    assert!((matches[0].similarity - 1.0).abs() < 1e-6);
}

#[tokio::test]
async fn find_similar_respects_threshold_and_ordering() {
    let (_temp_dir, store, content, _cache) = create_test_store().await;

    let exact = seed_document(&content, "Exact", DocumentStatus::Published).await;
    let close = seed_document(&content, "Close", DocumentStatus::Published).await;
    let far = seed_document(&content, "Far", DocumentStatus::Published).await;

    store.store(exact, &[1.0, 0.0, 0.0], "fp").await.expect("store");
    store.store(close, &[0.9, 0.1, 0.0], "fp").await.expect("store");
    store.store(far, &[0.0, 0.0, 1.0], "fp").await.expect("store");

    let matches = store
        .find_similar(&[1.0, 0.0, 0.0], 10, 0.5, &post_types())
        .await
        .expect("search");

    assert_eq!(matches.len(), 2);
    assert_eq!(matches[0].document_id, exact);
    assert_eq!(matches[1].document_id, close);
    assert!(matches.windows(2).all(|w| w[0].similarity >= w[1].similarity));
    assert!(matches.iter().all(|m| m.similarity >= 0.5));
}

#[tokio::test]
async fn find_similar_truncates_to_limit() {
    let (_temp_dir, store, content, _cache) = create_test_store().await;

    for i in 0..5 {
        let id = seed_document(&content, &format!("Doc{i}"), DocumentStatus::Published).await;
        store.store(id, &[1.0, 0.0, 0.0], "fp").await.expect("store");
    }

    let matches = store
        .find_similar(&[1.0, 0.0, 0.0], 3, 0.0, &post_types())
        .await
        .expect("search");

    assert_eq!(matches.len(), 3);
}

#[tokio::test]
async fn find_similar_breaks_ties_by_ascending_id() {
    let (_temp_dir, store, content, _cache) = create_test_store().await;

    let first = seed_document(&content, "First", DocumentStatus::Published).await;
    let second = seed_document(&content, "Second", DocumentStatus::Published).await;

    // Identical vectors, identical scores.
    store.store(second, &[1.0, 0.0, 0.0], "fp").await.expect("store");
    store.store(first, &[1.0, 0.0, 0.0], "fp").await.expect("store");

    let matches = store
        .find_similar(&[1.0, 0.0, 0.0], 10, 0.5, &post_types())
        .await
        .expect("search");

    assert_eq!(matches.len(), 2);
    assert!(matches[0].document_id < matches[1].document_id);
    assert_eq!(matches[0].document_id, first);
}

#[tokio::test]
async fn find_similar_filters_unpublished_and_missing_documents() {
    let (_temp_dir, store, content, _cache) = create_test_store().await;

    let published = seed_document(&content, "Published", DocumentStatus::Published).await;
    let draft = seed_document(&content, "Draft", DocumentStatus::Draft).await;
    let deleted = seed_document(&content, "Deleted", DocumentStatus::Published).await;

    for id in [published, draft, deleted] {
        store.store(id, &[1.0, 0.0, 0.0], "fp").await.expect("store");
    }

    content.delete_document(deleted).await.expect("delete doc");

    let matches = store
        .find_similar(&[1.0, 0.0, 0.0], 10, 0.5, &post_types())
        .await
        .expect("search");

    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].document_id, published);
}

#[tokio::test]
async fn find_similar_filters_disallowed_types() {
    let (_temp_dir, store, content, _cache) = create_test_store().await;

    let post = seed_document(&content, "Post", DocumentStatus::Published).await;
    let page = content
        .insert_document(make_document("Page", "page", DocumentStatus::Published))
        .await
        .expect("insert")
        .id;

    store.store(post, &[1.0, 0.0, 0.0], "fp").await.expect("store");
    store.store(page, &[1.0, 0.0, 0.0], "fp").await.expect("store");

    let matches = store
        .find_similar(&[1.0, 0.0, 0.0], 10, 0.5, &post_types())
        .await
        .expect("search");

    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].document_id, post);
}

#[tokio::test]
async fn deleted_record_never_surfaces_even_with_stale_cache() {
    let (_temp_dir, store, content, cache) = create_test_store().await;

    let id = seed_document(&content, "Doomed", DocumentStatus::Published).await;
    store.store(id, &[1.0, 0.0, 0.0], "fp").await.expect("store");

    // Populate the read cache, then delete the record.
    store.get(id).await.expect("get");
    store.delete(id).await.expect("delete");

    let matches = store
        .find_similar(&[1.0, 0.0, 0.0], 10, 0.0, &post_types())
        .await
        .expect("search");

    assert!(matches.is_empty());
    assert!(cache.get(&format!("embedding:{id}")).is_none());
    assert!(store.get(id).await.expect("get").is_none());
}

#[tokio::test]
async fn documents_needing_index_skips_indexed_and_respects_limit() {
    let (_temp_dir, store, content, _cache) = create_test_store().await;

    let mut ids = Vec::new();
    for i in 0..4 {
        ids.push(seed_document(&content, &format!("Doc{i}"), DocumentStatus::Published).await);
    }
    let _draft = seed_document(&content, "Draft", DocumentStatus::Draft).await;

    store.store(ids[0], &[1.0, 0.0, 0.0], "fp").await.expect("store");

    let needing = store
        .documents_needing_index(&post_types(), 10)
        .await
        .expect("scan");
    assert_eq!(needing, ids[1..].to_vec());

    let bounded = store
        .documents_needing_index(&post_types(), 2)
        .await
        .expect("scan");
    assert_eq!(bounded.len(), 2);
    assert_eq!(bounded, ids[1..3].to_vec());
}

#[tokio::test]
async fn clear_all_empties_store_and_cache() {
    let (_temp_dir, store, content, cache) = create_test_store().await;

    let id = seed_document(&content, "Doc", DocumentStatus::Published).await;
    store.store(id, &[1.0, 0.0, 0.0], "fp").await.expect("store");
    store.get(id).await.expect("get");

    store.clear_all().await.expect("clear");

    assert_eq!(store.count().await.expect("count"), 0);
    assert!(cache.get(&format!("embedding:{id}")).is_none());
}
