//! LAQ pipeline orchestrator.
//!
//! [`LaqPipeline`] composes a [`DocumentConverter`], a [`TextGenerator`], an
//! [`EmbeddingProvider`] and a [`VectorStore`] into the user-facing
//! operations: upload (process + store), search, chat, info and clear.
//!
//! # Example
//!
//! ```rust,ignore
//! use laq_rag::{LaqConfig, LaqPipeline, InMemoryVectorStore, CommandConverter};
//!
//! let pipeline = LaqPipeline::builder()
//!     .config(LaqConfig::default())
//!     .converter(Arc::new(CommandConverter::default()))
//!     .generator(ollama.clone())
//!     .embedding_provider(ollama)
//!     .vector_store(Arc::new(InMemoryVectorStore::new()))
//!     .build()?;
//!
//! pipeline.ensure_collection().await?;
//! let doc = pipeline.process_document(Path::new("010C.pdf")).await?;
//! let report = pipeline.store(&doc).await?;
//! let matches = pipeline.search("jetty tenders", 5).await?;
//! ```

use std::path::Path;
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::config::LaqConfig;
use crate::context::{ContextAssembler, chat_prompt};
use crate::convert::{DocumentConverter, validate_document_file};
use crate::embedding::EmbeddingProvider;
use crate::error::{LaqError, Result};
use crate::extractor::Extractor;
use crate::generation::TextGenerator;
use crate::ingest::{IngestReport, ingest_extraction};
use crate::normalize::ExtractionNormalizer;
use crate::record::ExtractionResult;
use crate::relevance::{RelevanceMatch, rank};
use crate::vectorstore::VectorStore;

/// A converted and extracted document awaiting storage.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedDocument {
    /// File name of the source, including extension.
    pub file_name: String,
    pub extraction: ExtractionResult,
}

/// A generated chat answer with the matches it was grounded on.
#[derive(Debug, Clone)]
pub struct ChatAnswer {
    pub answer: String,
    /// Matches whose sections made it into the prompt, best first.
    pub sources: Vec<RelevanceMatch>,
    /// Matches left out of the prompt to respect the context budget.
    pub dropped_sections: usize,
}

/// The LAQ pipeline orchestrator. Construct one via [`LaqPipeline::builder()`].
pub struct LaqPipeline {
    config: LaqConfig,
    converter: Arc<dyn DocumentConverter>,
    generator: Arc<dyn TextGenerator>,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    vector_store: Arc<dyn VectorStore>,
    extractor: Extractor,
    assembler: ContextAssembler,
}

impl LaqPipeline {
    /// Create a new [`LaqPipelineBuilder`].
    pub fn builder() -> LaqPipelineBuilder {
        LaqPipelineBuilder::default()
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &LaqConfig {
        &self.config
    }

    /// Return a reference to the vector store.
    pub fn vector_store(&self) -> &Arc<dyn VectorStore> {
        &self.vector_store
    }

    fn collection(&self) -> &str {
        &self.config.collection_name
    }

    /// Create the configured collection if it does not exist yet.
    pub async fn ensure_collection(&self) -> Result<()> {
        let dimensions = self.embedding_provider.dimensions();
        self.vector_store.create_collection(self.collection(), dimensions).await.map_err(|e| {
            error!(collection = self.collection(), error = %e, "failed to create collection");
            e
        })
    }

    /// Validate, convert and extract one document. Nothing is stored.
    ///
    /// # Errors
    ///
    /// [`LaqError::FileValidation`], [`LaqError::Conversion`], generator
    /// failures, [`LaqError::ExtractionParse`] or [`LaqError::SchemaValidation`].
    pub async fn process_document(&self, path: &Path) -> Result<ProcessedDocument> {
        validate_document_file(path, self.config.max_file_size_bytes()).await?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| LaqError::FileValidation {
                path: path.to_path_buf(),
                reason: "file name is not valid UTF-8".to_string(),
            })?
            .to_string();

        let text = self.converter.convert(path).await?;
        let extraction = self.extractor.extract(&text).await?;

        info!(file = %file_name, qa_pairs = extraction.qa_pairs().len(), "processed document");
        Ok(ProcessedDocument { file_name, extraction })
    }

    /// Embed and store a processed document, skipping records already present.
    pub async fn store(&self, document: &ProcessedDocument) -> Result<IngestReport> {
        ingest_extraction(
            &document.extraction,
            &document.file_name,
            self.collection(),
            self.embedding_provider.as_ref(),
            self.vector_store.as_ref(),
        )
        .await
    }

    /// Retrieve up to `top_k` matches scoring at least the configured threshold.
    ///
    /// # Errors
    ///
    /// [`LaqError::InvalidInput`] for a blank query; embedding and storage
    /// failures propagate unchanged.
    pub async fn search(&self, query: &str, top_k: usize) -> Result<Vec<RelevanceMatch>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(LaqError::InvalidInput("query cannot be empty".to_string()));
        }
        if top_k == 0 {
            return Err(LaqError::InvalidInput("top_k must be greater than zero".to_string()));
        }

        let embedding = self.embedding_provider.embed(query).await?;
        let hits =
            self.vector_store.query(self.collection(), &embedding, top_k).await.map_err(|e| {
                error!(collection = self.collection(), error = %e, "vector store query failed");
                e
            })?;

        let matches = rank(hits, self.config.similarity_threshold, top_k);
        info!(result_count = matches.len(), "search completed");
        Ok(matches)
    }

    /// Answer `query` from the best matching records.
    ///
    /// Returns `Ok(None)` when nothing clears the relevance threshold; the
    /// generator is not called in that case.
    ///
    /// # Errors
    ///
    /// [`LaqError::Config`] when even the best match does not fit in
    /// `max_context_chars`, plus everything [`search`](Self::search) and the
    /// generator return.
    pub async fn chat(&self, query: &str) -> Result<Option<ChatAnswer>> {
        let matches = self.search(query, self.config.chat_top_k).await?;
        if matches.is_empty() {
            return Ok(None);
        }

        let context = self.assembler.assemble(&matches);
        if context.included == 0 {
            let budget = self.config.max_context_chars;
            warn!(dropped = context.dropped, budget, "no section fits the context budget");
            return Err(LaqError::Config(format!(
                "max_context_chars ({budget}) is too small for the best match; \
                 {} matching section(s) dropped, raise LAQ_MAX_CONTEXT_CHARS",
                context.dropped
            )));
        }

        let prompt = chat_prompt(&context.text, query.trim());
        let options = self.config.generation_options(self.config.chat_temperature);
        let answer = self.generator.generate(&prompt, &options).await?;

        let mut sources = matches;
        sources.truncate(context.included);
        info!(sources = sources.len(), dropped = context.dropped, "chat answered");
        Ok(Some(ChatAnswer { answer, sources, dropped_sections: context.dropped }))
    }

    /// Number of records in the collection.
    pub async fn count(&self) -> Result<usize> {
        self.vector_store.count(self.collection()).await
    }

    /// Delete every record by dropping and recreating the collection.
    pub async fn clear(&self) -> Result<()> {
        self.vector_store.delete_collection(self.collection()).await?;
        self.ensure_collection().await?;
        info!(collection = self.collection(), "collection cleared");
        Ok(())
    }
}

/// Builder for constructing a [`LaqPipeline`].
///
/// Every component except `config` is required; `config` defaults to
/// [`LaqConfig::default()`].
#[derive(Default)]
pub struct LaqPipelineBuilder {
    config: Option<LaqConfig>,
    converter: Option<Arc<dyn DocumentConverter>>,
    generator: Option<Arc<dyn TextGenerator>>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    vector_store: Option<Arc<dyn VectorStore>>,
}

impl LaqPipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: LaqConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the document converter.
    pub fn converter(mut self, converter: Arc<dyn DocumentConverter>) -> Self {
        self.converter = Some(converter);
        self
    }

    /// Set the text generator used for extraction and chat.
    pub fn generator(mut self, generator: Arc<dyn TextGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the vector store backend.
    pub fn vector_store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.vector_store = Some(store);
        self
    }

    /// Build the [`LaqPipeline`], validating that all required fields are set.
    ///
    /// # Errors
    ///
    /// Returns [`LaqError::Config`] if any required component is missing.
    pub fn build(self) -> Result<LaqPipeline> {
        let config = self.config.unwrap_or_default();
        let converter =
            self.converter.ok_or_else(|| LaqError::Config("converter is required".to_string()))?;
        let generator =
            self.generator.ok_or_else(|| LaqError::Config("generator is required".to_string()))?;
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| LaqError::Config("embedding_provider is required".to_string()))?;
        let vector_store = self
            .vector_store
            .ok_or_else(|| LaqError::Config("vector_store is required".to_string()))?;

        let extractor = Extractor::new(
            generator.clone(),
            ExtractionNormalizer::new(config.error_preview_chars),
            config.generation_options(config.extraction_temperature),
            config.max_prompt_chars,
        );
        let assembler = ContextAssembler::new(config.max_context_chars);

        Ok(LaqPipeline {
            config,
            converter,
            generator,
            embedding_provider,
            vector_store,
            extractor,
            assembler,
        })
    }
}
