//! Shared application state, constructed once at startup.

use anyhow::{Context, Result};
use tracing::info;

use crate::config::Config;
use crate::db;
use crate::embedding::OpenAiEmbedder;
use crate::llm::OpenAiChat;
use crate::record_manager::RecordManager;
use crate::vector_store::SqliteVectorStore;

/// Everything the indexing and answering paths share: configuration, the
/// record ledger, the vector store, and the provider clients. Built once and
/// passed by reference; all handles are internally pooled or stateless, so a
/// single context serves concurrent questions.
pub struct AppContext {
    pub config: Config,
    pub records: RecordManager,
    pub store: SqliteVectorStore,
    pub embedder: OpenAiEmbedder,
    pub llm: OpenAiChat,
}

impl AppContext {
    /// Open both databases under `sync.vectorstore_path` and ensure their
    /// schemas exist. Any failure here is fatal; nothing may run against a
    /// half-initialized store.
    pub async fn init(config: Config) -> Result<Self> {
        let records_path = config.sync.vectorstore_path.join("records.sqlite");
        let vectors_path = config.sync.vectorstore_path.join("vectors.sqlite");

        let records_pool = db::connect(&records_path)
            .await
            .with_context(|| format!("failed to open record ledger at {}", records_path.display()))?;
        let vectors_pool = db::connect(&vectors_path)
            .await
            .with_context(|| format!("failed to open vector store at {}", vectors_path.display()))?;

        let records = RecordManager::new(records_pool, &config.namespace());
        records
            .create_schema()
            .await
            .context("failed to create record ledger schema")?;

        let store = SqliteVectorStore::new(vectors_pool, &config.sync.collection_name);
        store
            .create_schema()
            .await
            .context("failed to create vector store schema")?;

        let embedder = OpenAiEmbedder::new(&config.embedding)?;
        let llm = OpenAiChat::new(&config.llm)?;

        info!(
            collection = %config.sync.collection_name,
            vectorstore = %config.sync.vectorstore_path.display(),
            embedding_model = %config.embedding.model,
            llm_model = %config.llm.model,
            "application context initialized"
        );

        Ok(Self {
            config,
            records,
            store,
            embedder,
            llm,
        })
    }
}
