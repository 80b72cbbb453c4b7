//! Retrieval-augmented question answering over office policy documents.
//!
//! Documents are extracted, split into semantically-bounded chunks, and
//! indexed as dense embeddings; questions retrieve the nearest passages and
//! an external chat model composes an answer grounded in them. The crate is
//! a library invoked in-process: the presentation layer supplies file paths
//! and query strings and renders the [`QueryResponse`] it gets back.

pub mod assistant;
pub mod categories;
pub mod chunker;
pub mod embeddings;
pub mod error;
pub mod extract;
pub mod generator;
pub mod index;

pub use assistant::{Assistant, Citation, DEFAULT_TOP_K, Exchange, IngestReport, QueryResponse};
pub use categories::Category;
pub use chunker::{Chunk, ChunkKind, DocumentChunker};
pub use embeddings::{EMBEDDING_DIM, OllamaEmbedder, TextEmbedder};
pub use error::{ExtractError, ModelError};
pub use generator::{AnswerGenerator, ChatModel, FALLBACK_ANSWER, OllamaChat};
pub use index::{EmbeddingIndex, RetrievalResult};
