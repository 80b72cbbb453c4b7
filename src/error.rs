use std::path::PathBuf;

/// Failure extracting text from a single document.
///
/// Extraction errors are always recoverable at the batch level: the ingestion
/// driver logs the failure, skips the file, and continues with the rest.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to extract text from PDF {}: {reason}", path.display())]
    Pdf { path: PathBuf, reason: String },

    #[error("failed to extract text from DOCX {}: {reason}", path.display())]
    Docx { path: PathBuf, reason: String },

    #[error("unsupported file type: '{extension}'")]
    UnsupportedFormat { extension: String },

    #[error("no text extracted from {}", path.display())]
    Empty { path: PathBuf },
}

/// Failure communicating with an external model backend (embedding or chat).
///
/// During index build these propagate to the caller and the prior index stays
/// intact. At answer-generation time they are converted to a user-visible
/// answer string instead; only the generator does that conversion.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("model API error: {status} - {body}")]
    Api {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("JSON parse failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("empty response from model backend")]
    EmptyResponse,

    #[error("received {got} embeddings for {expected} inputs")]
    EmbeddingCountMismatch { expected: usize, got: usize },

    #[error("embedding dimension {got} does not match index dimension {expected}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("model '{model}' not found; available: {available:?}")]
    ModelMissing {
        model: String,
        available: Vec<String>,
    },
}
