//! Ollama client for embeddings and text generation.
//!
//! This module is only available when the `ollama` feature is enabled.
//!
//! One [`OllamaClient`] implements both [`EmbeddingProvider`] (via
//! `POST /api/embed`) and [`TextGenerator`] (via `POST /api/generate`), each
//! bound to its own model name.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::embedding::EmbeddingProvider;
use crate::error::{LaqError, Result};
use crate::generation::{GenerationOptions, TextGenerator};

const SERVICE: &str = "ollama";

/// The default local Ollama endpoint.
pub const DEFAULT_HOST: &str = "http://localhost:11434";

/// An [`EmbeddingProvider`] and [`TextGenerator`] backed by an Ollama server.
///
/// # Example
///
/// ```rust,ignore
/// use laq_rag::ollama::OllamaClient;
///
/// let client = OllamaClient::new("http://localhost:11434", "nomic-embed-text", 768, "mistral");
/// let vector = client.embed("hello").await?;
/// ```
#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: reqwest::Client,
    host: String,
    embedding_model: String,
    dimensions: usize,
    generation_model: String,
}

impl OllamaClient {
    /// Create a client for the server at `host`.
    pub fn new(
        host: impl Into<String>,
        embedding_model: impl Into<String>,
        dimensions: usize,
        generation_model: impl Into<String>,
    ) -> Self {
        let host = host.into().trim_end_matches('/').to_string();
        Self {
            client: reqwest::Client::new(),
            host,
            embedding_model: embedding_model.into(),
            dimensions,
            generation_model: generation_model.into(),
        }
    }

    /// Create a client from a [`LaqConfig`](crate::LaqConfig).
    pub fn from_config(config: &crate::LaqConfig) -> Self {
        Self::new(
            &config.ollama_host,
            &config.embedding_model,
            config.embedding_dimensions,
            &config.generation_model,
        )
    }

    /// The model used for embeddings.
    pub fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    /// The model used for generation.
    pub fn generation_model(&self) -> &str {
        &self.generation_model
    }

    async fn post<B, R>(&self, path: &str, model: &str, body: &B) -> Result<R>
    where
        B: Serialize + Sync + ?Sized,
        R: DeserializeOwned,
    {
        let url = format!("{}{path}", self.host);
        let response = self.client.post(&url).json(body).send().await.map_err(|e| {
            error!(service = SERVICE, %url, error = %e, "request failed");
            if e.is_connect() || e.is_timeout() {
                LaqError::ServiceConnection {
                    service: SERVICE.into(),
                    message: format!("{url}: {e}. Is `ollama serve` running?"),
                }
            } else {
                LaqError::ServiceConnection { service: SERVICE.into(), message: e.to_string() }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail =
                serde_json::from_str::<ErrorResponse>(&body).map(|e| e.error).unwrap_or(body);
            error!(service = SERVICE, %status, model, "API error");
            if status == reqwest::StatusCode::NOT_FOUND && detail.contains("not found") {
                return Err(LaqError::ModelMissing {
                    service: SERVICE.into(),
                    model: model.to_string(),
                });
            }
            return Err(LaqError::ServiceResponse {
                service: SERVICE.into(),
                message: format!("{path} returned {status}: {detail}"),
            });
        }

        response.json::<R>().await.map_err(|e| {
            error!(service = SERVICE, error = %e, "failed to parse response");
            LaqError::ServiceResponse {
                service: SERVICE.into(),
                message: format!("failed to parse {path} response: {e}"),
            }
        })
    }
}

// ── Ollama API request/response types ──────────────────────────────

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: &'a GenerationOptions,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: String,
}

// ── Trait implementations ──────────────────────────────────────────

#[async_trait]
impl EmbeddingProvider for OllamaClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let results = self.embed_batch(&[text]).await?;
        results.into_iter().next().ok_or_else(|| LaqError::ServiceResponse {
            service: SERVICE.into(),
            message: "embedding response was empty".into(),
        })
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        debug!(service = SERVICE, batch_size = texts.len(), model = %self.embedding_model, "embedding batch");

        let request = EmbedRequest { model: &self.embedding_model, input: texts };
        let response: EmbedResponse = self.post("/api/embed", &self.embedding_model, &request).await?;

        if response.embeddings.len() != texts.len() {
            return Err(LaqError::ServiceResponse {
                service: SERVICE.into(),
                message: format!(
                    "expected {} embeddings, received {}",
                    texts.len(),
                    response.embeddings.len()
                ),
            });
        }
        Ok(response.embeddings)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[async_trait]
impl TextGenerator for OllamaClient {
    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<String> {
        debug!(
            service = SERVICE,
            model = %self.generation_model,
            prompt_len = prompt.len(),
            temperature = ?options.temperature,
            "generating"
        );
        let request =
            GenerateRequest { model: &self.generation_model, prompt, stream: false, options };
        let response: GenerateResponse =
            self.post("/api/generate", &self.generation_model, &request).await?;
        Ok(response.response.trim().to_string())
    }
}
