//! Question/answer retrieval over Legislative Assembly Question (LAQ) documents.
//!
//! The crate turns converted LAQ PDFs into validated question/answer records,
//! stores them with embeddings under stable IDs, and answers queries from the
//! best matching records.
//!
//! - [`ExtractionNormalizer`] recovers structured JSON from free-form model output
//! - [`validate_extraction`] checks it against the record schema
//! - [`ingest_extraction`] assigns IDs and stores only records not seen before
//! - [`rank`] scores and filters search hits
//! - [`ContextAssembler`] renders matches into a bounded prompt context
//! - [`LaqPipeline`] wires everything together
//!
//! # Feature flags
//!
//! | Feature  | Enables                          |
//! |----------|----------------------------------|
//! | `ollama` | [`OllamaClient`] (default)       |
//! | `sqlite` | [`SqliteVectorStore`] (default)  |

pub mod config;
pub mod context;
pub mod convert;
pub mod embedding;
pub mod error;
pub mod extractor;
pub mod generation;
pub mod ingest;
pub mod inmemory;
pub mod normalize;
pub mod pipeline;
pub mod record;
pub mod relevance;
pub mod schema;
pub mod vectorstore;

#[cfg(feature = "ollama")]
pub mod ollama;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use config::{LaqConfig, LaqConfigBuilder};
pub use context::{AssembledContext, CONTEXT_HEADER, ContextAssembler, chat_prompt};
pub use convert::{CommandConverter, DocumentConverter, validate_document_file};
pub use embedding::EmbeddingProvider;
pub use error::{FailedInsert, FieldViolation, LaqError, Result};
pub use extractor::{Extractor, extraction_prompt};
pub use generation::{GenerationOptions, TextGenerator};
pub use ingest::{IngestReport, PendingRecord, build_records, ingest_extraction, record_id};
pub use inmemory::InMemoryVectorStore;
pub use normalize::{ExtractionNormalizer, truncate_chars};
pub use pipeline::{ChatAnswer, LaqPipeline, LaqPipelineBuilder, ProcessedDocument};
pub use record::{ExtractionResult, QaPair, RecordMetadata, SearchHit, StoredRecord};
pub use relevance::{MatchQuality, QualityStats, RelevanceMatch, rank, relevance_score};
pub use schema::validate_extraction;
pub use vectorstore::{VectorStore, cosine_distance};

#[cfg(feature = "ollama")]
pub use ollama::OllamaClient;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteVectorStore;
