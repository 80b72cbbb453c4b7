//! Integration tests for the full ingest → retrieve → answer pipeline,
//! using stub model backends so no external services are needed.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use policy_rag::{
    Assistant, Category, ChatModel, EMBEDDING_DIM, FALLBACK_ANSWER, ModelError, TextEmbedder,
};
use tracing_subscriber::EnvFilter;

/// Route tracing output through the test harness; `RUST_LOG` controls
/// verbosity. Safe to call from every test, only the first init wins.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_test_writer()
        .compact()
        .try_init();
}

/// Deterministic stub embedder: identical text always produces the same
/// vector, so a query equal to a chunk retrieves it at distance zero.
struct StubEmbedder;

fn embed_text(text: &str) -> Vec<f32> {
    let mut v = vec![0.0f32; EMBEDDING_DIM];
    for (i, b) in text.bytes().enumerate() {
        v[(i * 31 + b as usize) % EMBEDDING_DIM] += f32::from(b) / 255.0;
    }
    v
}

impl TextEmbedder for StubEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ModelError> {
        Ok(texts.iter().map(|t| embed_text(t)).collect())
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, ModelError> {
        Ok(embed_text(text))
    }
}

/// Stub chat model that counts calls and echoes a canned answer.
struct StubChat {
    calls: AtomicUsize,
    last_prompt: Mutex<String>,
}

impl StubChat {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            last_prompt: Mutex::new(String::new()),
        }
    }
}

impl ChatModel for &StubChat {
    async fn chat(&self, _system: &str, user: &str) -> Result<String, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_prompt.lock().unwrap() = user.to_string();
        Ok("Employees get 20 vacation days per year, per policy.txt.".to_string())
    }
}

#[tokio::test]
async fn full_pipeline_answers_from_ingested_documents() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let policy = dir.path().join("policy.txt");
    std::fs::write(
        &policy,
        "LEAVE POLICY:\nEmployees get 20 vacation days per year.\n\
         REMOTE WORK POLICY:\nRemote work is allowed two days per week.",
    )
    .unwrap();

    let chat = StubChat::new();
    let mut assistant = Assistant::new(StubEmbedder, &chat);

    let report = assistant.ingest_files(&[policy]).await.unwrap();
    assert_eq!(report.documents_indexed, 1);
    assert!(report.chunks_indexed >= 2, "headings should split the document");
    assert!(report.skipped.is_empty());

    let response = assistant
        .query("How many vacation days do I have?", 3)
        .await
        .unwrap();

    assert_eq!(response.category, Category::Leave);
    assert!(!response.citations.is_empty());
    assert!(response.citations.iter().all(|c| c.source == "policy.txt"));
    assert!(
        response
            .citations
            .iter()
            .all(|c| c.similarity > 0.0 && c.similarity <= 1.0)
    );
    assert_eq!(chat.calls.load(Ordering::SeqCst), 1);

    // The prompt handed to the model carries the source-labelled context.
    let prompt = chat.last_prompt.lock().unwrap().clone();
    assert!(prompt.contains("[Source: policy.txt]"));

    // Conversation history records the exchange.
    assert_eq!(assistant.history().len(), 1);
    assert_eq!(assistant.history()[0].question, "How many vacation days do I have?");
}

#[tokio::test]
async fn querying_before_ingestion_never_calls_the_model() {
    init_tracing();
    let chat = StubChat::new();
    let mut assistant = Assistant::new(StubEmbedder, &chat);

    let response = assistant.query("What's the weather?", 3).await.unwrap();

    assert_eq!(response.answer, FALLBACK_ANSWER);
    assert_eq!(response.category, Category::General);
    assert!(response.citations.is_empty());
    assert_eq!(chat.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn directory_ingestion_skips_unsupported_and_broken_files() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("handbook.txt"), "Dress code is casual.").unwrap();
    std::fs::write(dir.path().join("image.png"), b"\x89PNG").unwrap();
    // Invalid UTF-8 in a supported format: extraction fails, batch continues.
    std::fs::write(dir.path().join("garbled.txt"), [0xff, 0xfe, 0xfd]).unwrap();

    let chat = StubChat::new();
    let mut assistant = Assistant::new(StubEmbedder, &chat);
    let report = assistant.ingest_dir(dir.path()).await.unwrap();

    assert_eq!(report.documents_indexed, 1);
    assert_eq!(report.skipped.len(), 1);
    assert!(report.skipped[0].0.ends_with("garbled.txt"));

    let response = assistant.query("what is the dress code", 3).await.unwrap();
    assert_eq!(response.citations.len(), 1);
    assert_eq!(response.citations[0].source, "handbook.txt");
}

#[tokio::test]
async fn reingestion_covers_all_session_documents() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let doc_a = dir.path().join("a.txt");
    std::fs::write(&doc_a, "Alpha policy body.").unwrap();

    let chat = StubChat::new();
    let mut assistant = Assistant::new(StubEmbedder, &chat);
    assistant.ingest_files(&[doc_a]).await.unwrap();

    let doc_b = dir.path().join("b.txt");
    std::fs::write(&doc_b, "Beta policy body.").unwrap();
    assistant.ingest_files(&[doc_b]).await.unwrap();

    // Querying for the exact text of each document retrieves it: both
    // generations are present because the session re-indexes all documents.
    let response = assistant.query("Alpha policy body.", 1).await.unwrap();
    assert_eq!(response.citations[0].source, "a.txt");
    let response = assistant.query("Beta policy body.", 1).await.unwrap();
    assert_eq!(response.citations[0].source, "b.txt");
}
