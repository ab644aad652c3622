//! Knowledge answers against a real SQLite store, with Ollama embeddings and
//! the chat model served by wiremock.

use std::sync::Arc;
use std::time::Duration;

use gitmate_core::ai::{AiClient, AiClientConfig, ProviderId};
use gitmate_core::index::{
    ingest_folder, ChunkConfig, KnowledgeAssistant, NewChunk, OllamaEmbedder, RetrievalConfig,
    Retriever, SqliteVectorStore, VectorStore,
};
use gitmate_core::{KnowledgeError, RetrievalError};
use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Embedding server that maps every input to `[1, 0]`
async fn mount_embeddings(server: &MockServer, inputs: usize) {
    let embeddings: Vec<_> = (0..inputs).map(|_| json!([1.0, 0.0])).collect();
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "bge",
            "embeddings": embeddings
        })))
        .mount(server)
        .await;
}

async fn mount_chat(server: &MockServer, answer: &str) {
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": answer}}]
        })))
        .mount(server)
        .await;
}

fn chat_client(server: &MockServer) -> Arc<AiClient> {
    let mut config = AiClientConfig::new(ProviderId::Ollama, "llama3.2");
    config.base_url = Some(format!("{}/v1/chat/completions", server.uri()));
    Arc::new(AiClient::new(config))
}

/// A stored chunk whose cosine distance from `[1, 0]` is `distance`
fn chunk_at(id: &str, source: &str, distance: f32) -> NewChunk {
    let cos = 1.0 - distance;
    NewChunk {
        id: id.to_string(),
        text: format!("passage {id}"),
        source: source.to_string(),
        embedding: vec![cos, (1.0 - cos * cos).sqrt()],
    }
}

async fn store_with(chunks: Vec<NewChunk>) -> (tempfile::TempDir, Arc<SqliteVectorStore>) {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteVectorStore::open(&dir.path().join("knowledge.db")).unwrap();
    store.ensure_collection("kb_collection", "bge").await.unwrap();
    store.upsert("kb_collection", chunks).await.unwrap();
    (dir, Arc::new(store))
}

fn retriever(server: &MockServer, store: Arc<SqliteVectorStore>, threshold: Option<f32>) -> Arc<Retriever> {
    Arc::new(Retriever::new(
        Arc::new(OllamaEmbedder::new(server.uri(), "bge")),
        store,
        RetrievalConfig {
            similarity_threshold: threshold,
            ..RetrievalConfig::default()
        },
    ))
}

#[tokio::test]
async fn distant_match_falls_back_without_citation() {
    let server = MockServer::start().await;
    mount_embeddings(&server, 1).await;
    mount_chat(&server, "Rust 1.0 was released in May 2015.").await;

    let (_dir, store) = store_with(vec![chunk_at("0_chunk_0", "onboarding.md", 0.9)]).await;
    let assistant = KnowledgeAssistant::new(
        retriever(&server, store, Some(0.7)),
        chat_client(&server),
    );

    let answer = assistant.answer("When was Rust 1.0 released?", &[]).await.unwrap();

    assert!(!answer.found);
    assert_eq!(answer.citations, None);
    assert!(!answer.text.contains("Source Docs"));
    assert!(!answer.text.contains("onboarding.md"));
    assert_eq!(answer.text, "Rust 1.0 was released in May 2015.");
}

#[tokio::test]
async fn close_match_is_cited() {
    let server = MockServer::start().await;
    mount_embeddings(&server, 1).await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_string_contains("Context: passage 0_chunk_0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "Ask in #platform."}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (_dir, store) = store_with(vec![
        chunk_at("0_chunk_0", "onboarding.md", 0.05),
        chunk_at("1_chunk_0", "faq.md", 0.95),
    ])
    .await;
    let assistant = KnowledgeAssistant::new(
        retriever(&server, store, Some(0.7)),
        chat_client(&server),
    );

    let answer = assistant.answer("Where do I ask for access?", &[]).await.unwrap();
    assert!(answer.found);
    assert_eq!(answer.citations.as_deref(), Some("onboarding.md"));
    assert_eq!(answer.text, "Source Docs: onboarding.md\n\nAsk in #platform.");
}

#[tokio::test]
async fn unreachable_embedder_is_an_error_not_a_fallback() {
    let chat = MockServer::start().await;
    mount_chat(&chat, "should not be asked").await;

    let (_dir, store) = store_with(vec![chunk_at("0_chunk_0", "onboarding.md", 0.1)]).await;
    let embedder = OllamaEmbedder::new("http://127.0.0.1:1", "bge").with_timeout(Duration::from_secs(2));
    let retriever = Retriever::new(Arc::new(embedder), store, RetrievalConfig::default());
    let assistant = KnowledgeAssistant::new(Arc::new(retriever), chat_client(&chat));

    let err = assistant.answer("anything", &[]).await.unwrap_err();
    assert!(matches!(
        err,
        KnowledgeError::Retrieval(RetrievalError::Embedding(_))
    ));
    assert!(chat.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn ingested_folder_is_retrievable() {
    let server = MockServer::start().await;
    // one request per document; each document here is a single chunk
    mount_embeddings(&server, 1).await;

    let docs = tempfile::tempdir().unwrap();
    std::fs::write(docs.path().join("deploy.md"), "Deploys run from the release branch.").unwrap();

    let dir = tempfile::tempdir().unwrap();
    let store = SqliteVectorStore::open(&dir.path().join("knowledge.db")).unwrap();
    let embedder = OllamaEmbedder::new(server.uri(), "bge");

    let report = ingest_folder(docs.path(), &embedder, &store, "kb_collection", ChunkConfig::default())
        .await
        .unwrap();
    assert_eq!((report.documents, report.chunks), (1, 1));

    let bundle = retriever(&server, Arc::new(store), None)
        .retrieve("how do deploys work?", None)
        .await
        .unwrap();
    assert!(bundle.found);
    assert_eq!(bundle.chunks, vec!["Deploys run from the release branch."]);
    assert_eq!(bundle.citation_text(), "deploy.md");
}
