//! Library-level flow over file-backed databases: chunk a corpus, sync it,
//! answer a question, change the corpus, sync again.

use anyhow::Result;
use async_trait::async_trait;
use tempfile::TempDir;

use ragdex::chunk::chunk_documents;
use ragdex::db;
use ragdex::embedding::Embedder;
use ragdex::llm::LlmClient;
use ragdex::models::{CleanupMode, Document};
use ragdex::pipeline::Pipeline;
use ragdex::record_manager::RecordManager;
use ragdex::sync::SyncEngine;
use ragdex::vector_store::{SqliteVectorStore, VectorStore};

/// Word-bag embedder: similar texts get similar vectors, deterministically.
struct BagEmbedder;

#[async_trait]
impl Embedder for BagEmbedder {
    fn model_name(&self) -> &str {
        "bag"
    }

    fn dims(&self) -> usize {
        8
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|t| {
                let mut v = vec![0.0f32; 8];
                for word in t.split_whitespace() {
                    let mut h = 0usize;
                    for b in word.bytes() {
                        h = h.wrapping_mul(31).wrapping_add(b as usize);
                    }
                    v[h % 8] += 1.0;
                }
                v
            })
            .collect())
    }
}

struct EchoLlm;

#[async_trait]
impl LlmClient for EchoLlm {
    async fn complete(&self, prompt: &str) -> Result<String> {
        Ok(prompt.to_string())
    }
}

struct Harness {
    _tmp: TempDir,
    records: RecordManager,
    store: SqliteVectorStore,
}

async fn harness() -> Harness {
    let tmp = TempDir::new().unwrap();
    let records_pool = db::connect(&tmp.path().join("records.sqlite")).await.unwrap();
    let vectors_pool = db::connect(&tmp.path().join("vectors.sqlite")).await.unwrap();

    let records = RecordManager::new(records_pool, "sqlite/e2e");
    records.create_schema().await.unwrap();
    let store = SqliteVectorStore::new(vectors_pool, "e2e");
    store.create_schema().await.unwrap();

    Harness {
        _tmp: tmp,
        records,
        store,
    }
}

fn doc(source: &str, page: i64, content: &str) -> Document {
    Document {
        content: content.to_string(),
        source: source.to_string(),
        page,
    }
}

#[tokio::test]
async fn indexed_corpus_answers_with_sources() {
    let hx = harness().await;
    let embedder = BagEmbedder;
    let llm = EchoLlm;

    let corpus = vec![
        doc("rust.pdf", 1, "the borrow checker enforces ownership rules"),
        doc("brewing.pdf", 4, "espresso extraction takes about thirty seconds"),
    ];
    let chunks = chunk_documents(&corpus, 200, 20);

    let engine = SyncEngine::new(&hx.records, &hx.store, &embedder, 16, false);
    let stats = engine.sync(&chunks, CleanupMode::Full).await.unwrap();
    assert_eq!(stats.added, 2);

    let pipeline = Pipeline::new(&hx.store, &embedder, &llm, 10);
    let answer = pipeline
        .answer("the borrow checker enforces ownership rules", 1)
        .await
        .unwrap();

    // The echo LLM returns the rendered prompt, so the retrieved context and
    // question are both visible in the answer text.
    assert!(answer.answer.contains("borrow checker"));
    assert_eq!(answer.sources.len(), 1);
    assert_eq!(answer.sources[0].source, "rust.pdf");
    assert_eq!(answer.sources[0].page, 1);
}

#[tokio::test]
async fn removed_document_disappears_after_full_sync() {
    let hx = harness().await;
    let embedder = BagEmbedder;
    let llm = EchoLlm;

    let corpus = vec![
        doc("keep.pdf", 1, "alpine climbing requires an early start"),
        doc("drop.pdf", 1, "this document is about to be deleted"),
    ];
    let chunks = chunk_documents(&corpus, 200, 20);
    let engine = SyncEngine::new(&hx.records, &hx.store, &embedder, 16, false);
    engine.sync(&chunks, CleanupMode::Full).await.unwrap();
    assert_eq!(hx.store.count().await.unwrap(), 2);

    let shrunk = chunk_documents(&corpus[..1], 200, 20);
    let stats = engine.sync(&shrunk, CleanupMode::Full).await.unwrap();
    assert_eq!(stats.skipped, 1);
    assert_eq!(stats.deleted, 1);
    assert_eq!(hx.store.count().await.unwrap(), 1);

    let pipeline = Pipeline::new(&hx.store, &embedder, &llm, 10);
    let answer = pipeline
        .answer("this document is about to be deleted", 5)
        .await
        .unwrap();
    assert!(answer
        .sources
        .iter()
        .all(|s| s.source != "drop.pdf"));
}

#[tokio::test]
async fn reopened_databases_retain_the_index() {
    let tmp = TempDir::new().unwrap();
    let embedder = BagEmbedder;

    {
        let records_pool = db::connect(&tmp.path().join("records.sqlite")).await.unwrap();
        let vectors_pool = db::connect(&tmp.path().join("vectors.sqlite")).await.unwrap();
        let records = RecordManager::new(records_pool.clone(), "sqlite/e2e");
        records.create_schema().await.unwrap();
        let store = SqliteVectorStore::new(vectors_pool.clone(), "e2e");
        store.create_schema().await.unwrap();

        let corpus = vec![doc("persist.pdf", 1, "state survives process restarts")];
        let chunks = chunk_documents(&corpus, 200, 20);
        let engine = SyncEngine::new(&records, &store, &embedder, 16, false);
        engine.sync(&chunks, CleanupMode::Full).await.unwrap();

        records_pool.close().await;
        vectors_pool.close().await;
    }

    let records_pool = db::connect(&tmp.path().join("records.sqlite")).await.unwrap();
    let vectors_pool = db::connect(&tmp.path().join("vectors.sqlite")).await.unwrap();
    let records = RecordManager::new(records_pool, "sqlite/e2e");
    records.create_schema().await.unwrap();
    let store = SqliteVectorStore::new(vectors_pool, "e2e");
    store.create_schema().await.unwrap();

    assert_eq!(store.count().await.unwrap(), 1);

    // A second pass over the same corpus skips everything.
    let corpus = vec![doc("persist.pdf", 1, "state survives process restarts")];
    let chunks = chunk_documents(&corpus, 200, 20);
    let engine = SyncEngine::new(&records, &store, &embedder, 16, false);
    let stats = engine.sync(&chunks, CleanupMode::Full).await.unwrap();
    assert_eq!(stats.added, 0);
    assert_eq!(stats.skipped, 1);
}
