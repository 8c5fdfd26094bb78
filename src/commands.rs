use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use dialoguer::{Confirm, Password};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use crate::cache::{MemoryCache, ObjectCache};
use crate::config::{Config, get_config_dir};
use crate::content::{ContentStore, SqliteContentStore};
use crate::credentials::ApiKeyStore;
use crate::database::sqlite::Database;
use crate::database::vector_store::VectorStore;
use crate::embeddings::openai::{KeyValidation, OpenAiClient};
use crate::indexer::Indexer;
use crate::search::{SearchHandler, SearchOptions};

/// Everything a command needs, assembled from the persisted configuration.
struct Engine {
    config: Config,
    database: Database,
    content: SqliteContentStore,
    client: OpenAiClient,
    store: VectorStore,
}

async fn build_engine() -> Result<Engine> {
    let config_dir = get_config_dir()?;
    let config = Config::load(&config_dir).context("Failed to load configuration")?;

    let database = Database::initialize_from_config_dir(config.get_base_dir())
        .await
        .context("Failed to initialize database")?;

    let content = SqliteContentStore::new(database.pool().clone());
    let cache: Arc<dyn ObjectCache> = Arc::new(MemoryCache::new());
    let credentials = ApiKeyStore::new(config.get_base_dir());

    let client = OpenAiClient::new(&config.provider, credentials, Arc::clone(&cache))
        .context("Failed to create embedding client")?;

    let store = VectorStore::new(
        database.clone(),
        Arc::new(content.clone()) as Arc<dyn ContentStore>,
        cache,
        client.dimensions(),
        client.model_name(),
        Duration::from_secs(config.provider.cache_ttl_secs),
    );

    Ok(Engine {
        config,
        database,
        content,
        client,
        store,
    })
}

impl Engine {
    fn search_handler(&self) -> SearchHandler {
        SearchHandler::new(
            self.client.clone(),
            self.store.clone(),
            Arc::new(self.content.clone()) as Arc<dyn ContentStore>,
            self.database.clone(),
            self.config.search.clone(),
        )
    }

    fn indexer(&self) -> Indexer {
        Indexer::new(
            self.client.clone(),
            self.store.clone(),
            Arc::new(self.content.clone()) as Arc<dyn ContentStore>,
            self.config.search.clone(),
        )
    }
}

/// Run a search and print the result envelope.
#[inline]
pub async fn run_search(
    query: String,
    page: Option<usize>,
    per_page: Option<usize>,
    threshold: Option<f32>,
    doc_types: Option<Vec<String>>,
    json: bool,
) -> Result<()> {
    let engine = build_engine().await?;
    let handler = engine.search_handler();

    let options = SearchOptions {
        page,
        per_page,
        threshold,
        doc_types,
        user_id: None,
    };

    let response = handler.search(&query, &options).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    match response.search_type {
        crate::search::SearchType::Semantic => {
            println!(
                "{} results for \"{}\" (semantic, {:.3}s)",
                response.total, response.query, response.execution_time
            );
        }
        crate::search::SearchType::Keyword => {
            println!(
                "{} results for \"{}\" (keyword fallback: {:?}, {:.3}s)",
                response.total,
                response.query,
                response.fallback_reason,
                response.execution_time
            );
        }
    }
    println!();

    if response.results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    let offset = (response.page - 1) * response.per_page;
    for (i, result) in response.results.iter().enumerate() {
        match result.similarity {
            Some(similarity) => println!(
                "{}. [{:.4}] {}",
                offset + i + 1,
                similarity,
                result.title
            ),
            None => println!("{}. {}", offset + i + 1, result.title),
        }
        println!("   {} | {} | {}", result.doc_type, result.date, result.url);
        if !result.excerpt.is_empty() {
            println!("   {}", result.excerpt);
        }
    }

    Ok(())
}

/// Index a batch of documents, showing a spinner while the batch runs.
#[inline]
pub async fn run_index(document_ids: Vec<i64>, batch_size: usize) -> Result<()> {
    let engine = build_engine().await?;

    if engine.search_handler().has_reached_index_limit().await {
        println!("Index limit reached; delete embeddings or raise the limit before indexing more.");
        return Ok(());
    }

    let indexer = engine.indexer();

    let ids = if document_ids.is_empty() {
        None
    } else {
        Some(document_ids)
    };

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner} {msg}")
            .context("Invalid spinner template")?,
    );
    spinner.set_message("Generating embeddings...");
    spinner.enable_steady_tick(Duration::from_millis(100));

    let outcome = indexer.index_batch(ids, batch_size).await;

    spinner.finish_and_clear();

    let outcome = outcome?;

    println!("Indexed {} documents.", outcome.indexed);

    if !outcome.errors.is_empty() {
        println!("{} documents failed:", outcome.errors.len());
        for error in &outcome.errors {
            println!("  #{}: {}", error.document_id, error.message);
        }
    }

    Ok(())
}

/// Show index coverage for the configured document types.
#[inline]
pub async fn show_status() -> Result<()> {
    let engine = build_engine().await?;
    let status = engine.indexer().index_status().await?;

    println!("Index status:");
    println!("  Indexed: {}/{} ({}%)", status.indexed, status.total, status.percentage);
    println!("  Awaiting indexing: {}", status.needs_indexing);
    println!("  Index limit: {}", status.limit);

    if status.limit_reached {
        println!("  Index limit reached; new documents will not be indexed.");
    }

    Ok(())
}

/// Show usage counters against their quotas.
#[inline]
pub async fn show_stats() -> Result<()> {
    let engine = build_engine().await?;
    let handler = engine.search_handler();
    let stats = handler.get_usage_stats().await?;

    if handler.is_enabled() {
        println!("Semantic search: enabled");
    } else {
        println!("Semantic search: disabled (no API key configured)");
    }
    println!("Usage:");
    println!(
        "  Searches this month: {}/{}",
        stats.monthly_searches, stats.monthly_search_limit
    );
    println!(
        "  Indexed documents: {}/{}",
        stats.indexed_documents, stats.index_limit
    );
    match stats.last_reset {
        Some(reset) => println!("  Counter last reset: {}", reset),
        None => println!("  Counter never reset."),
    }

    Ok(())
}

/// Show aggregated search analytics for a trailing window.
#[inline]
pub async fn show_analytics(days: i64) -> Result<()> {
    let engine = build_engine().await?;
    let summary = engine.search_handler().analytics_summary(days).await?;

    println!("Search analytics (last {} days):", days);
    println!("  Total searches: {}", summary.total_searches);
    println!(
        "  Avg execution time: {:.3}s",
        summary.avg_execution_time
    );
    println!("  Avg results: {:.1}", summary.avg_results);
    println!("  Fallback rate: {:.1}%", summary.fallback_rate * 100.0);

    if !summary.top_queries.is_empty() {
        println!();
        println!("Top queries:");
        for top in &summary.top_queries {
            println!("  {:>5}  {}", top.count, top.query_text);
        }
    }

    if !summary.daily.is_empty() {
        println!();
        println!("Daily:");
        for day in &summary.daily {
            println!("  {}  {}", day.date, day.searches);
        }
    }

    Ok(())
}

/// Delete every stored embedding after confirmation.
#[inline]
pub async fn clear_index(skip_confirm: bool) -> Result<()> {
    if !skip_confirm
        && !Confirm::new()
            .with_prompt("Delete ALL stored embeddings?")
            .default(false)
            .interact()?
    {
        println!("Aborted.");
        return Ok(());
    }

    let engine = build_engine().await?;
    engine.indexer().clear_index().await?;

    println!("Index cleared.");
    Ok(())
}

/// Validate an API key against the provider and optionally store it.
#[inline]
pub async fn validate_key(api_key: Option<String>, store: bool) -> Result<()> {
    let engine = build_engine().await?;

    let api_key = match api_key {
        Some(key) => key,
        None => Password::new().with_prompt("API key").interact()?,
    };

    match engine.client.validate_api_key(&api_key) {
        KeyValidation::Valid => {
            println!("API key is valid.");
            if store {
                engine
                    .client
                    .credentials()
                    .store_api_key(&api_key)
                    .context("Failed to store API key")?;
                info!("Stored validated API key");
                println!("API key stored.");
            }
        }
        KeyValidation::InvalidFormat(message) => {
            println!("Invalid key format: {}", message);
        }
        KeyValidation::InvalidCredential(message) => {
            println!("Key rejected by provider: {}", message);
        }
        KeyValidation::ConnectionError(message) => {
            println!("Could not validate key: {}", message);
        }
    }

    Ok(())
}

/// Reset the monthly search counter (scheduler entry point).
#[inline]
pub async fn reset_usage() -> Result<()> {
    let engine = build_engine().await?;
    engine.search_handler().reset_monthly_counter().await?;

    println!("Monthly search counter reset.");
    Ok(())
}

/// Re-sync one document after an edit, publish, or unpublish.
#[inline]
pub async fn sync_document(document_id: i64) -> Result<()> {
    let engine = build_engine().await?;
    engine.indexer().sync_document(document_id).await?;

    println!("Document {} synced.", document_id);
    Ok(())
}

/// Drop a deleted document's embedding.
#[inline]
pub async fn remove_document(document_id: i64) -> Result<()> {
    let engine = build_engine().await?;
    engine.indexer().remove_document(document_id).await?;

    println!("Document {} removed from the index.", document_id);
    Ok(())
}
