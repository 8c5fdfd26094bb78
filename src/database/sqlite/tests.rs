use super::*;
use anyhow::Result;
use std::collections::HashSet;
use tempfile::TempDir;

async fn create_test_database() -> Result<(TempDir, Database)> {
    let temp_dir = TempDir::new()?;
    let database = Database::initialize_from_config_dir(temp_dir.path()).await?;
    Ok((temp_dir, database))
}

#[tokio::test]
async fn integration_schema_migration() -> Result<()> {
    let (_temp_dir, database) = create_test_database().await?;

    let tables: Vec<String> = sqlx::query_scalar(
        "SELECT name FROM sqlite_master WHERE type='table' \
         AND name NOT LIKE 'sqlite_%' AND name != '_sqlx_migrations'",
    )
    .fetch_all(database.pool())
    .await?;

    let expected_tables: HashSet<&'static str> =
        ["embeddings", "search_analytics", "meta", "documents"]
            .into_iter()
            .collect();

    let actual_tables: HashSet<&str> = tables.iter().map(|t| t.as_str()).collect();
    assert_eq!(actual_tables, expected_tables);

    Ok(())
}

#[tokio::test]
async fn integration_migrations_are_idempotent() -> Result<()> {
    let (_temp_dir, database) = create_test_database().await?;

    // Re-running on an up-to-date database is a no-op, not an error.
    database.run_migrations().await?;

    Ok(())
}

#[tokio::test]
async fn integration_unique_document_constraint() -> Result<()> {
    let (_temp_dir, database) = create_test_database().await?;

    sqlx::query(
        "INSERT INTO embeddings \
         (document_id, embedding, content_fingerprint, created_at, updated_at) \
         VALUES (1, X'0000803F', 'fp', DATETIME('now'), DATETIME('now'))",
    )
    .execute(database.pool())
    .await?;

    let duplicate = sqlx::query(
        "INSERT INTO embeddings \
         (document_id, embedding, content_fingerprint, created_at, updated_at) \
         VALUES (1, X'0000803F', 'fp2', DATETIME('now'), DATETIME('now'))",
    )
    .execute(database.pool())
    .await;

    assert!(duplicate.is_err());

    Ok(())
}
