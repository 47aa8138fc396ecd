//! Configuration for the LAQ pipeline.

use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{LaqError, Result};
use crate::generation::GenerationOptions;

/// Configuration parameters for the LAQ pipeline.
///
/// Relevance thresholds are expressed on the percentage scale produced by
/// [`relevance_score`](crate::relevance::relevance_score).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LaqConfig {
    /// Directory holding the persistent vector store.
    pub db_path: PathBuf,
    /// Name of the collection records are stored in.
    pub collection_name: String,
    /// Base URL of the Ollama server.
    pub ollama_host: String,
    /// Model used for embeddings.
    pub embedding_model: String,
    /// Dimensionality of vectors produced by `embedding_model`.
    pub embedding_dimensions: usize,
    /// Model used for extraction and chat.
    pub generation_model: String,
    /// Sampling temperature for structured extraction.
    pub extraction_temperature: f32,
    /// Sampling temperature for chat answers.
    pub chat_temperature: f32,
    /// Nucleus sampling cutoff; `None` leaves the server default.
    pub top_p: Option<f32>,
    /// Cap on generated tokens per call; `None` leaves the server default.
    pub num_predict: Option<u32>,
    /// Number of matches returned by search.
    pub search_top_k: usize,
    /// Number of matches fed into a chat prompt.
    pub chat_top_k: usize,
    /// Minimum relevance score (percent) for a match to be kept.
    pub similarity_threshold: f32,
    /// Character budget for the assembled chat context.
    pub max_context_chars: usize,
    /// Maximum characters of converted document text sent to the extractor.
    pub max_prompt_chars: usize,
    /// Largest accepted input file, in megabytes.
    pub max_file_size_mb: u64,
    /// External program used for PDF-to-text conversion.
    pub converter_program: String,
    /// Characters of raw model output kept in parse-failure diagnostics.
    pub error_preview_chars: usize,
}

impl Default for LaqConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./laq_db"),
            collection_name: "laqs".to_string(),
            ollama_host: "http://localhost:11434".to_string(),
            embedding_model: "nomic-embed-text".to_string(),
            embedding_dimensions: 768,
            generation_model: "mistral".to_string(),
            extraction_temperature: 0.1,
            chat_temperature: 0.3,
            top_p: None,
            num_predict: None,
            search_top_k: 5,
            chat_top_k: 3,
            similarity_threshold: 30.0,
            max_context_chars: 6000,
            max_prompt_chars: 10_000,
            max_file_size_mb: 50,
            converter_program: "pdftotext".to_string(),
            error_preview_chars: 200,
        }
    }
}

impl LaqConfig {
    /// Create a new builder for constructing a [`LaqConfig`].
    pub fn builder() -> LaqConfigBuilder {
        LaqConfigBuilder::default()
    }

    /// Build a configuration from `LAQ_*` environment variables, falling back
    /// to defaults for anything unset.
    ///
    /// # Errors
    ///
    /// Returns [`LaqError::Config`] if a variable cannot be parsed or the
    /// resulting configuration is invalid.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env) but reads variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut builder = Self::builder();
        let cfg = &mut builder.config;

        if let Some(v) = lookup("LAQ_DB_PATH") {
            cfg.db_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("LAQ_COLLECTION") {
            cfg.collection_name = v;
        }
        if let Some(v) = lookup("LAQ_OLLAMA_HOST") {
            cfg.ollama_host = v;
        }
        if let Some(v) = lookup("LAQ_EMBEDDING_MODEL") {
            cfg.embedding_model = v;
        }
        if let Some(v) = lookup("LAQ_GENERATION_MODEL") {
            cfg.generation_model = v;
        }
        if let Some(v) = lookup("LAQ_CONVERTER") {
            cfg.converter_program = v;
        }
        set_parsed(&lookup, "LAQ_EMBEDDING_DIMENSIONS", &mut cfg.embedding_dimensions)?;
        set_parsed(&lookup, "LAQ_EXTRACTION_TEMPERATURE", &mut cfg.extraction_temperature)?;
        set_parsed(&lookup, "LAQ_CHAT_TEMPERATURE", &mut cfg.chat_temperature)?;
        if let Some(v) = parse_var(&lookup, "LAQ_TOP_P")? {
            cfg.top_p = Some(v);
        }
        if let Some(v) = parse_var(&lookup, "LAQ_NUM_PREDICT")? {
            cfg.num_predict = Some(v);
        }
        set_parsed(&lookup, "LAQ_SEARCH_TOP_K", &mut cfg.search_top_k)?;
        set_parsed(&lookup, "LAQ_CHAT_TOP_K", &mut cfg.chat_top_k)?;
        set_parsed(&lookup, "LAQ_SIMILARITY_THRESHOLD", &mut cfg.similarity_threshold)?;
        set_parsed(&lookup, "LAQ_MAX_CONTEXT_CHARS", &mut cfg.max_context_chars)?;
        set_parsed(&lookup, "LAQ_MAX_PROMPT_CHARS", &mut cfg.max_prompt_chars)?;
        set_parsed(&lookup, "LAQ_MAX_FILE_SIZE_MB", &mut cfg.max_file_size_mb)?;

        builder.build()
    }

    /// Sampling options for one generation call at `temperature`.
    pub fn generation_options(&self, temperature: f32) -> GenerationOptions {
        GenerationOptions {
            temperature: Some(temperature),
            top_p: self.top_p,
            num_predict: self.num_predict,
        }
    }

    /// Maximum accepted file size in bytes.
    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb.saturating_mul(1024 * 1024)
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|e| LaqError::Config(format!("{key}={raw:?} is not valid: {e}")))
        })
        .transpose()
}

fn set_parsed<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, slot: &mut T) -> Result<()>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    if let Some(value) = parse_var(lookup, key)? {
        *slot = value;
    }
    Ok(())
}

/// Builder for constructing a validated [`LaqConfig`].
#[derive(Debug, Clone, Default)]
pub struct LaqConfigBuilder {
    config: LaqConfig,
}

impl LaqConfigBuilder {
    /// Set the vector store directory.
    pub fn db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.db_path = path.into();
        self
    }

    /// Set the collection name.
    pub fn collection_name(mut self, name: impl Into<String>) -> Self {
        self.config.collection_name = name.into();
        self
    }

    /// Set the Ollama base URL.
    pub fn ollama_host(mut self, host: impl Into<String>) -> Self {
        self.config.ollama_host = host.into();
        self
    }

    /// Set the embedding model and its output dimensionality.
    pub fn embedding_model(mut self, model: impl Into<String>, dimensions: usize) -> Self {
        self.config.embedding_model = model.into();
        self.config.embedding_dimensions = dimensions;
        self
    }

    /// Set the generation model.
    pub fn generation_model(mut self, model: impl Into<String>) -> Self {
        self.config.generation_model = model.into();
        self
    }

    /// Set the extraction temperature.
    pub fn extraction_temperature(mut self, temperature: f32) -> Self {
        self.config.extraction_temperature = temperature;
        self
    }

    /// Set the chat temperature.
    pub fn chat_temperature(mut self, temperature: f32) -> Self {
        self.config.chat_temperature = temperature;
        self
    }

    /// Set the nucleus sampling cutoff for every generation call.
    pub fn top_p(mut self, top_p: f32) -> Self {
        self.config.top_p = Some(top_p);
        self
    }

    /// Cap the number of tokens generated per call.
    pub fn num_predict(mut self, tokens: u32) -> Self {
        self.config.num_predict = Some(tokens);
        self
    }

    /// Set the number of search results.
    pub fn search_top_k(mut self, k: usize) -> Self {
        self.config.search_top_k = k;
        self
    }

    /// Set the number of matches used as chat context.
    pub fn chat_top_k(mut self, k: usize) -> Self {
        self.config.chat_top_k = k;
        self
    }

    /// Set the minimum relevance score (percent).
    pub fn similarity_threshold(mut self, threshold: f32) -> Self {
        self.config.similarity_threshold = threshold;
        self
    }

    /// Set the chat context character budget.
    pub fn max_context_chars(mut self, chars: usize) -> Self {
        self.config.max_context_chars = chars;
        self
    }

    /// Set how much converted text is sent to the extractor.
    pub fn max_prompt_chars(mut self, chars: usize) -> Self {
        self.config.max_prompt_chars = chars;
        self
    }

    /// Set the maximum input file size in megabytes.
    pub fn max_file_size_mb(mut self, mb: u64) -> Self {
        self.config.max_file_size_mb = mb;
        self
    }

    /// Set the external converter program.
    pub fn converter_program(mut self, program: impl Into<String>) -> Self {
        self.config.converter_program = program.into();
        self
    }

    /// Set the diagnostic preview length for parse failures.
    pub fn error_preview_chars(mut self, chars: usize) -> Self {
        self.config.error_preview_chars = chars;
        self
    }

    /// Build the [`LaqConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`LaqError::Config`] if:
    /// - `search_top_k == 0` or `chat_top_k == 0`
    /// - `max_context_chars == 0` or `max_prompt_chars == 0`
    /// - `max_file_size_mb == 0` or `embedding_dimensions == 0`
    /// - a temperature is outside `[0, 2]`
    /// - `top_p` is outside `(0, 1]` or `num_predict == 0`
    /// - `collection_name` is blank
    pub fn build(self) -> Result<LaqConfig> {
        let c = &self.config;
        if c.search_top_k == 0 || c.chat_top_k == 0 {
            return Err(LaqError::Config("top_k values must be greater than zero".to_string()));
        }
        if c.max_context_chars == 0 || c.max_prompt_chars == 0 {
            return Err(LaqError::Config("character budgets must be greater than zero".to_string()));
        }
        if c.max_file_size_mb == 0 {
            return Err(LaqError::Config("max_file_size_mb must be greater than zero".to_string()));
        }
        if c.embedding_dimensions == 0 {
            return Err(LaqError::Config(
                "embedding_dimensions must be greater than zero".to_string(),
            ));
        }
        for (name, t) in
            [("extraction_temperature", c.extraction_temperature), ("chat_temperature", c.chat_temperature)]
        {
            if !(0.0..=2.0).contains(&t) {
                return Err(LaqError::Config(format!("{name} ({t}) must be within [0, 2]")));
            }
        }
        if let Some(p) = c.top_p {
            if !(p > 0.0 && p <= 1.0) {
                return Err(LaqError::Config(format!("top_p ({p}) must be within (0, 1]")));
            }
        }
        if c.num_predict == Some(0) {
            return Err(LaqError::Config("num_predict must be greater than zero".to_string()));
        }
        if c.collection_name.trim().is_empty() {
            return Err(LaqError::Config("collection_name must not be empty".to_string()));
        }
        Ok(self.config)
    }
}
