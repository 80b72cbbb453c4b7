//! Session context and query orchestration.
//!
//! An `Assistant` owns the embedding index, the answer generator, the list
//! of ingested documents, and the conversation history as one unit, built
//! per session and passed by reference. Ingestion rebuilds the index
//! wholesale over every document seen so far; queries run one at a time
//! through retrieve → generate → classify → assemble.

use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::categories::Category;
use crate::chunker::{Chunk, DocumentChunker};
use crate::embeddings::{EMBEDDING_DIM, TextEmbedder};
use crate::error::ModelError;
use crate::extract;
use crate::generator::{AnswerGenerator, ChatModel};
use crate::index::EmbeddingIndex;

/// Number of chunks retrieved per query unless the caller overrides it.
pub const DEFAULT_TOP_K: usize = 3;

/// A source passage backing an answer, in retrieval order.
#[derive(Debug, Clone, Serialize)]
pub struct Citation {
    pub source: String,
    pub text: String,
    pub similarity: f32,
}

/// Everything the presentation layer needs to render one answer.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResponse {
    pub answer: String,
    pub category: Category,
    pub citations: Vec<Citation>,
}

/// One question/answer turn kept in the session history.
#[derive(Debug, Clone, Serialize)]
pub struct Exchange {
    pub question: String,
    pub response: QueryResponse,
}

/// Outcome of one ingestion batch. Every skipped document carries the cause
/// so nothing disappears silently.
#[derive(Debug, Default)]
pub struct IngestReport {
    pub documents_indexed: usize,
    pub chunks_indexed: usize,
    pub skipped: Vec<(PathBuf, String)>,
}

/// Per-session assistant over a set of policy documents.
pub struct Assistant<E, C> {
    chunker: DocumentChunker,
    index: EmbeddingIndex<E>,
    generator: AnswerGenerator<C>,
    documents: Vec<PathBuf>,
    history: Vec<Exchange>,
}

impl<E: TextEmbedder, C: ChatModel> Assistant<E, C> {
    pub fn new(embedder: E, chat: C) -> Self {
        Self::with_chunker(embedder, chat, DocumentChunker::default())
    }

    pub fn with_chunker(embedder: E, chat: C, chunker: DocumentChunker) -> Self {
        Self {
            chunker,
            index: EmbeddingIndex::new(embedder, EMBEDDING_DIM),
            generator: AnswerGenerator::new(chat),
            documents: Vec::new(),
            history: Vec::new(),
        }
    }

    /// Documents registered with this session, in ingestion order.
    pub fn documents(&self) -> &[PathBuf] {
        &self.documents
    }

    /// Conversation history, oldest first.
    pub fn history(&self) -> &[Exchange] {
        &self.history
    }

    pub fn chunk_count(&self) -> usize {
        self.index.chunk_count()
    }

    /// Ingest new documents and rebuild the index over every document the
    /// session has seen. A failure extracting one document skips that
    /// document and continues the batch; an embedding failure aborts the
    /// rebuild and leaves the prior index usable.
    pub async fn ingest_files(&mut self, paths: &[PathBuf]) -> Result<IngestReport, ModelError> {
        for path in paths {
            if !self.documents.contains(path) {
                self.documents.push(path.clone());
            }
        }

        let mut report = IngestReport::default();
        let mut all_chunks: Vec<Chunk> = Vec::new();

        for path in &self.documents {
            let source = path
                .file_name()
                .and_then(|name| name.to_str())
                .unwrap_or("unknown")
                .to_string();

            let text = match extract::extract_text(path).await {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!(path = %path.display(), "skipping document: {e}");
                    report.skipped.push((path.clone(), e.to_string()));
                    continue;
                }
            };

            let chunks = self.chunker.chunk(&text, &source);
            tracing::info!(source = %source, chunks = chunks.len(), "document chunked");
            report.documents_indexed += 1;
            all_chunks.extend(chunks);
        }

        report.chunks_indexed = self.index.build(all_chunks).await?;
        tracing::info!(
            documents = report.documents_indexed,
            chunks = report.chunks_indexed,
            skipped = report.skipped.len(),
            "ingestion complete"
        );
        Ok(report)
    }

    /// Ingest every supported document under a directory.
    pub async fn ingest_dir(&mut self, dir: &Path) -> Result<IngestReport, ModelError> {
        let paths = extract::collect_documents(dir);
        tracing::info!(dir = %dir.display(), files = paths.len(), "ingesting directory");
        self.ingest_files(&paths).await
    }

    /// Answer a question with [`DEFAULT_TOP_K`] retrieved passages.
    pub async fn ask(&mut self, question: &str) -> Result<QueryResponse, ModelError> {
        self.query(question, DEFAULT_TOP_K).await
    }

    /// Retrieve context, generate a grounded answer, classify the query, and
    /// assemble citations in retrieval order. Zero retrieval results is not
    /// an error: the answer falls back to a fixed string, the category is
    /// still computed, and the citation list is empty. Only infrastructure
    /// failures (the query embedding call) propagate.
    pub async fn query(
        &mut self,
        question: &str,
        top_k: usize,
    ) -> Result<QueryResponse, ModelError> {
        let results = self.index.retrieve(question, top_k).await?;
        tracing::debug!(question, results = results.len(), "retrieved context");

        let answer = self.generator.generate(question, &results).await;
        let category = Category::classify(question);

        let citations = results
            .into_iter()
            .map(|result| Citation {
                source: result.chunk.source,
                text: result.chunk.text,
                similarity: result.similarity,
            })
            .collect();

        let response = QueryResponse {
            answer,
            category,
            citations,
        };
        self.history.push(Exchange {
            question: question.to_string(),
            response: response.clone(),
        });
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::FALLBACK_ANSWER;

    struct ConstEmbedder;

    impl TextEmbedder for ConstEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ModelError> {
            Ok(texts.iter().map(|_| vec![0.1; EMBEDDING_DIM]).collect())
        }

        async fn embed_query(&self, _text: &str) -> Result<Vec<f32>, ModelError> {
            Ok(vec![0.1; EMBEDDING_DIM])
        }
    }

    struct CannedChat(&'static str);

    impl ChatModel for CannedChat {
        async fn chat(&self, _system: &str, _user: &str) -> Result<String, ModelError> {
            Ok(self.0.to_string())
        }
    }

    struct FailingChat;

    impl ChatModel for FailingChat {
        async fn chat(&self, _system: &str, _user: &str) -> Result<String, ModelError> {
            Err(ModelError::EmptyResponse)
        }
    }

    #[tokio::test]
    async fn query_without_documents_returns_fallback_and_category() {
        let mut assistant = Assistant::new(ConstEmbedder, CannedChat("unused"));

        let response = assistant.ask("How many vacation days do I have?").await.unwrap();

        assert_eq!(response.answer, FALLBACK_ANSWER);
        assert_eq!(response.category, Category::Leave);
        assert!(response.citations.is_empty());
        assert_eq!(assistant.history().len(), 1);
    }

    #[tokio::test]
    async fn ingest_skips_unreadable_files_and_continues() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("policy.txt");
        std::fs::write(&good, "Employees get 20 vacation days per year.").unwrap();
        let missing = dir.path().join("ghost.txt");

        let mut assistant = Assistant::new(ConstEmbedder, CannedChat("answer"));
        let report = assistant
            .ingest_files(&[good, missing.clone()])
            .await
            .unwrap();

        assert_eq!(report.documents_indexed, 1);
        assert_eq!(report.chunks_indexed, 1);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].0, missing);
        assert!(!report.skipped[0].1.is_empty());
    }

    #[tokio::test]
    async fn end_to_end_vacation_question() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policy.txt");
        std::fs::write(&path, "Employees get 20 vacation days per year.").unwrap();

        let mut assistant = Assistant::new(ConstEmbedder, CannedChat("You get 20 days."));
        assistant.ingest_files(&[path]).await.unwrap();

        let response = assistant
            .ask("How many vacation days do I have?")
            .await
            .unwrap();

        assert_eq!(response.answer, "You get 20 days.");
        assert_eq!(response.category, Category::Leave);
        assert_eq!(response.citations.len(), 1);
        assert_eq!(response.citations[0].source, "policy.txt");
        // Identical vectors for query and chunk give distance 0, score 1.
        assert!((response.citations[0].similarity - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn model_failure_is_recorded_in_history_as_answer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policy.txt");
        std::fs::write(&path, "Employees get 20 vacation days per year.").unwrap();

        let mut assistant = Assistant::new(ConstEmbedder, FailingChat);
        assistant.ingest_files(&[path]).await.unwrap();

        let response = assistant.query("How many vacation days?", 3).await.unwrap();

        // Generation failure surfaces as a readable answer, not an error,
        // and the exchange still lands in the history.
        assert!(response.answer.starts_with("Error generating response:"));
        assert!(!response.citations.is_empty());
        assert_eq!(assistant.history().len(), 1);
        assert_eq!(assistant.history()[0].question, "How many vacation days?");
        assert!(
            assistant.history()[0]
                .response
                .answer
                .starts_with("Error generating response:")
        );
    }

    #[tokio::test]
    async fn reingesting_replaces_index_contents() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("old.txt");
        std::fs::write(&first, "Old policy content.").unwrap();

        let mut assistant = Assistant::new(ConstEmbedder, CannedChat("answer"));
        assistant.ingest_files(&[first.clone()]).await.unwrap();
        assert_eq!(assistant.chunk_count(), 1);

        let second = dir.path().join("new.txt");
        std::fs::write(&second, "New policy content.").unwrap();
        let report = assistant.ingest_files(&[second]).await.unwrap();

        // Rebuild covers both session documents, not just the new batch.
        assert_eq!(report.documents_indexed, 2);
        assert_eq!(assistant.chunk_count(), 2);

        let response = assistant.ask("what changed?").await.unwrap();
        let sources: Vec<_> = response.citations.iter().map(|c| c.source.as_str()).collect();
        assert!(sources.contains(&"old.txt"));
        assert!(sources.contains(&"new.txt"));
    }
}
