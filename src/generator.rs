//! Grounded answer generation over retrieved context.
//!
//! The generator is the only place where a model failure becomes a
//! user-visible answer string instead of an error: the conversational caller
//! treats it as a normal, if unhappy, answer so chat history stays coherent.
//! No other component adopts that string-as-error channel.

use serde::Deserialize;
use serde_json::json;

use crate::error::ModelError;
use crate::index::RetrievalResult;

/// Answer returned when retrieval produced no context; the model is not
/// called in that case.
pub const FALLBACK_ANSWER: &str = "I don't have enough information in the knowledge base to \
answer this question. Please make sure the relevant policy documents have been uploaded, or try \
rephrasing your question.";

const SYSTEM_PROMPT: &str = "You are a helpful assistant that answers questions based only on \
provided company documents. Never make up information.";

/// Sampling temperature; low to favor factual, deterministic answers.
const TEMPERATURE: f32 = 0.3;

/// Output-length budget in tokens.
const MAX_OUTPUT_TOKENS: u32 = 1000;

/// Chat-style text generation: one system message, one user message, one
/// text reply.
pub trait ChatModel: Send + Sync {
    fn chat(
        &self,
        system: &str,
        user: &str,
    ) -> impl Future<Output = Result<String, ModelError>> + Send;
}

/// Composes grounded prompts and delegates to the chat model.
pub struct AnswerGenerator<C> {
    model: C,
}

impl<C: ChatModel> AnswerGenerator<C> {
    pub fn new(model: C) -> Self {
        Self { model }
    }

    /// Generate an answer grounded in the retrieved context. With empty
    /// context the fixed fallback string is returned and the model is never
    /// invoked. Model failures come back as a readable answer string.
    pub async fn generate(&self, query: &str, context: &[RetrievalResult]) -> String {
        if context.is_empty() {
            return FALLBACK_ANSWER.to_string();
        }

        let prompt = build_prompt(query, context);
        match self.model.chat(SYSTEM_PROMPT, &prompt).await {
            Ok(answer) => answer,
            Err(e) => {
                tracing::warn!("answer generation failed: {e}");
                format!("Error generating response: {e}")
            }
        }
    }
}

/// Concatenate retrieved chunks into a source-labelled context block and wrap
/// it in the grounding instructions.
fn build_prompt(query: &str, context: &[RetrievalResult]) -> String {
    let context_block = context
        .iter()
        .map(|result| format!("[Source: {}]\n{}", result.chunk.source, result.chunk.text))
        .collect::<Vec<_>>()
        .join("\n\n---\n\n");

    format!(
        "You are an office policy assistant. Your role is to answer employee questions based \
ONLY on the provided company documents.

IMPORTANT RULES:
1. Answer ONLY based on the context provided below
2. If the answer is not in the context, say \"I don't have this information in the uploaded documents\"
3. Be specific and cite which document the information comes from
4. If there are step-by-step processes, list them clearly
5. Be helpful but concise

CONTEXT FROM POLICY DOCUMENTS:
{context_block}

EMPLOYEE QUESTION:
{query}

ANSWER (based only on the context above):"
    )
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    message: Option<OllamaChatResponseMessage>,
}

#[derive(Deserialize)]
struct OllamaChatResponseMessage {
    content: String,
}

/// Chat model backed by the Ollama `/api/chat` endpoint.
pub struct OllamaChat {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl OllamaChat {
    /// Build a chat client from the environment: `OLLAMA_URL` (default
    /// `http://localhost:11434`) and `OLLAMA_CHAT_MODEL` (default
    /// `llama3.2`).
    pub fn from_env() -> Result<Self, ModelError> {
        let base_url =
            std::env::var("OLLAMA_URL").unwrap_or_else(|_| "http://localhost:11434".to_string());
        let model =
            std::env::var("OLLAMA_CHAT_MODEL").unwrap_or_else(|_| "llama3.2".to_string());
        Self::new(base_url, model)
    }

    pub fn new(base_url: String, model: String) -> Result<Self, ModelError> {
        tracing::info!("Chat model: {}", model);
        Ok(Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(300))
                .build()?,
            base_url,
            model,
        })
    }

    pub fn model_name(&self) -> &str {
        &self.model
    }
}

impl ChatModel for OllamaChat {
    async fn chat(&self, system: &str, user: &str) -> Result<String, ModelError> {
        let request = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user },
            ],
            "stream": false,
            "options": {
                "temperature": TEMPERATURE,
                "num_predict": MAX_OUTPUT_TOKENS,
            },
        });

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ModelError::Api {
                status: response.status(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let body: OllamaChatResponse = response.json().await?;
        body.message
            .map(|m| m.content)
            .filter(|content| !content.is_empty())
            .ok_or(ModelError::EmptyResponse)
    }
}
