use clap::{Parser, Subcommand};
use semsearch::Result;
use semsearch::commands::{
    clear_index, remove_document, reset_usage, run_index, run_search, show_analytics, show_stats,
    show_status, sync_document, validate_key,
};
use semsearch::config::{run_interactive_config, show_config};

#[derive(Parser)]
#[command(name = "semsearch")]
#[command(about = "Semantic search and indexing engine with keyword fallback")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure the embedding provider and search settings
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Search indexed documents
    Search {
        /// The query text
        query: String,
        /// Result page to return
        #[arg(long, default_value_t = 1)]
        page: usize,
        /// Results per page
        #[arg(long)]
        per_page: Option<usize>,
        /// Minimum similarity score (0-1)
        #[arg(long)]
        threshold: Option<f32>,
        /// Restrict to these document types
        #[arg(long = "type")]
        doc_types: Option<Vec<String>>,
        /// Print the raw response envelope as JSON
        #[arg(long)]
        json: bool,
    },
    /// Embed and index documents that need it
    Index {
        /// Specific document ids to index; defaults to whatever needs indexing
        #[arg(long = "id")]
        document_ids: Vec<i64>,
        /// Maximum documents to process in this batch
        #[arg(long, default_value_t = 10)]
        batch_size: usize,
    },
    /// Show index coverage
    Status,
    /// Show usage counters against their quotas
    Stats,
    /// Show aggregated search analytics
    Analytics {
        /// Trailing window in days
        #[arg(long, default_value_t = 7)]
        days: i64,
    },
    /// Delete all stored embeddings
    ClearIndex {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Validate an API key against the provider
    ValidateKey {
        /// Key to validate; prompts when omitted
        api_key: Option<String>,
        /// Store the key after successful validation
        #[arg(long)]
        store: bool,
    },
    /// Reset the monthly search counter (scheduler entry point)
    ResetUsage,
    /// Re-sync one document after an edit, publish, or unpublish
    Sync {
        /// Document id
        document_id: i64,
    },
    /// Drop a deleted document's embedding
    Remove {
        /// Document id
        document_id: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config()?;
            } else {
                run_interactive_config()?;
            }
        }
        Commands::Search {
            query,
            page,
            per_page,
            threshold,
            doc_types,
            json,
        } => {
            run_search(query, Some(page), per_page, threshold, doc_types, json).await?;
        }
        Commands::Index {
            document_ids,
            batch_size,
        } => {
            run_index(document_ids, batch_size).await?;
        }
        Commands::Status => {
            show_status().await?;
        }
        Commands::Stats => {
            show_stats().await?;
        }
        Commands::Analytics { days } => {
            show_analytics(days).await?;
        }
        Commands::ClearIndex { yes } => {
            clear_index(yes).await?;
        }
        Commands::ValidateKey { api_key, store } => {
            validate_key(api_key, store).await?;
        }
        Commands::ResetUsage => {
            reset_usage().await?;
        }
        Commands::Sync { document_id } => {
            sync_document(document_id).await?;
        }
        Commands::Remove { document_id } => {
            remove_document(document_id).await?;
        }
    }

    Ok(())
}
