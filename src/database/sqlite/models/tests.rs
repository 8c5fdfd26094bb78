use super::*;
use chrono::NaiveDate;

fn timestamp() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 6, 1)
        .expect("valid date")
        .and_hms_opt(8, 30, 0)
        .expect("valid time")
}

#[test]
fn stored_embedding_cache_round_trip() {
    let record = StoredEmbedding {
        document_id: 42,
        vector: vec![0.1, -0.5, 1.0],
        model_version: "text-embedding-3-small".to_string(),
        content_fingerprint: "abc123".to_string(),
        created_at: timestamp(),
        updated_at: timestamp(),
    };

    let encoded = serde_json::to_string(&record).expect("encode");
    let decoded: StoredEmbedding = serde_json::from_str(&encoded).expect("decode");

    assert_eq!(decoded, record);
}

#[test]
fn corrupt_cached_record_fails_decode() {
    let result = serde_json::from_str::<StoredEmbedding>("{\"document_id\": \"oops\"}");
    assert!(result.is_err());
}

#[test]
fn usage_stats_serialize_shape() {
    let stats = UsageStats {
        monthly_searches: 12,
        monthly_search_limit: 1000,
        indexed_documents: 34,
        index_limit: 500,
        last_reset: None,
    };

    let value = serde_json::to_value(&stats).expect("serialize");
    assert_eq!(value["monthly_searches"], 12);
    assert_eq!(value["monthly_search_limit"], 1000);
    assert_eq!(value["index_limit"], 500);
    assert!(value["last_reset"].is_null());
}
