//! # Ragdex CLI
//!
//! The `ragdex` binary keeps a vector index synchronized with a PDF corpus
//! and answers questions against it.
//!
//! ## Usage
//!
//! ```bash
//! ragdex --config ./ragdex.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ragdex init` | Create the SQLite databases and schemas |
//! | `ragdex index` | Run one synchronization pass over the corpus |
//! | `ragdex watch` | Index, then re-index on corpus changes |
//! | `ragdex ask "<question>"` | Answer a question from the indexed corpus |

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use ragdex::config;
use ragdex::context::AppContext;
use ragdex::indexer;
use ragdex::pipeline;
use ragdex::watch;

/// Ragdex — retrieval-augmented question answering over a PDF corpus.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file.
#[derive(Parser)]
#[command(
    name = "ragdex",
    about = "Retrieval-augmented question answering over a PDF corpus",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./ragdex.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Create the SQLite databases and schemas.
    ///
    /// Idempotent; running it against an existing index is safe.
    Init,

    /// Run one synchronization pass over the corpus.
    ///
    /// Loads every PDF under `sync.source_path`, chunks and embeds what
    /// changed, and applies the configured cleanup policy.
    Index,

    /// Run an indexing pass, then re-index whenever the corpus changes.
    ///
    /// Watches `sync.source_path` recursively for PDF create/modify/delete
    /// events. Runs until interrupted.
    Watch,

    /// Answer a question from the indexed corpus.
    ///
    /// Retrieves the most similar chunks and asks the configured LLM to
    /// answer from them. Prints the answer followed by its sources.
    Ask {
        /// The question to answer.
        question: String,

        /// Number of chunks to retrieve (defaults to `llm.default_k`).
        #[arg(long)]
        k: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            AppContext::init(cfg).await?;
            println!("Index initialized successfully.");
        }
        Commands::Index => {
            let ctx = AppContext::init(cfg).await?;
            let stats = indexer::run_indexing(&ctx).await?;
            println!(
                "Indexed: {} added, {} skipped, {} deleted, {} failed",
                stats.added, stats.skipped, stats.deleted, stats.failed
            );
        }
        Commands::Watch => {
            let ctx = AppContext::init(cfg).await?;
            watch::watch(&ctx).await?;
        }
        Commands::Ask { question, k } => {
            let k = k.unwrap_or(cfg.llm.default_k);
            let ctx = AppContext::init(cfg).await?;
            let answer = pipeline::answer_question(&ctx, &question, k).await?;
            println!("{}", answer.answer);
            if !answer.sources.is_empty() {
                println!("\nSources:");
                for source in &answer.sources {
                    println!("  {} (page {})", source.source, source.page);
                }
            }
        }
    }

    Ok(())
}
