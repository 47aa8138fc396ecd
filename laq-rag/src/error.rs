//! Error types for the `laq-rag` crate.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// A single field-level schema violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldViolation {
    /// Path of the offending field, e.g. `qa_pairs[1].answer`.
    pub field: String,
    /// What was wrong with it.
    pub message: String,
}

impl FieldViolation {
    /// Create a violation for `field`.
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self { field: field.into(), message: message.into() }
    }
}

impl fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// A record that could not be written during a non-atomic batch insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedInsert {
    /// ID of the record that failed.
    pub id: String,
    /// Why the store refused it.
    pub reason: String,
}

/// Errors that can occur anywhere in the LAQ pipeline.
///
/// Each variant is one independently matchable failure kind. Callers decide
/// how to present them; the library never retries or hides a failure.
#[derive(Debug, Error)]
pub enum LaqError {
    /// The extracted structure did not satisfy the record schema.
    #[error("Schema validation failed: {}", join_violations(.violations))]
    SchemaValidation {
        /// Every violation found, in rule order.
        violations: Vec<FieldViolation>,
    },

    /// No JSON object could be recovered from the model output.
    #[error("Extraction parse failure: {reason} (response: {preview})")]
    ExtractionParse {
        /// Last parser error encountered.
        reason: String,
        /// The raw model output, truncated for diagnostics.
        preview: String,
    },

    /// The vector store could not be reached or failed an operation.
    #[error("Storage unavailable ({backend}): {message}")]
    StorageUnavailable {
        /// The storage backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// A sequential batch insert only partly succeeded.
    #[error("Storage partial failure: {inserted} inserted, {} failed", .failures.len())]
    StoragePartialFailure {
        /// Number of records that were written.
        inserted: usize,
        /// Records that were not written, with reasons.
        failures: Vec<FailedInsert>,
    },

    /// A record with this ID already exists in the collection.
    #[error("Duplicate record id '{id}' in collection '{collection}'")]
    DuplicateRecord {
        /// The target collection.
        collection: String,
        /// The conflicting record ID.
        id: String,
    },

    /// An external service could not be reached.
    #[error("Cannot connect to {service}: {message}")]
    ServiceConnection {
        /// The service that failed (e.g. `ollama`).
        service: String,
        /// A description of the failure.
        message: String,
    },

    /// An external service does not have the requested model.
    #[error("Model '{model}' not found in {service}")]
    ModelMissing {
        /// The service that reported the missing model.
        service: String,
        /// The model name, so callers can suggest a pull command.
        model: String,
    },

    /// An external service answered with an unexpected status or body.
    #[error("Unexpected response from {service}: {message}")]
    ServiceResponse {
        /// The service that answered.
        service: String,
        /// A description of the problem.
        message: String,
    },

    /// The input file is missing, has the wrong type, or is too large.
    #[error("Invalid file {}: {reason}", .path.display())]
    FileValidation {
        /// The offending path.
        path: PathBuf,
        /// Why it was rejected.
        reason: String,
    },

    /// Document-to-text conversion failed.
    #[error("Conversion failed for {}: {message}", .path.display())]
    Conversion {
        /// The document being converted.
        path: PathBuf,
        /// A description of the failure.
        message: String,
    },

    /// A caller-supplied argument was rejected.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    Config(String),
}

fn join_violations(violations: &[FieldViolation]) -> String {
    violations.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

impl LaqError {
    pub(crate) fn storage(backend: &str, message: impl fmt::Display) -> Self {
        Self::StorageUnavailable { backend: backend.to_string(), message: message.to_string() }
    }
}

/// A convenience result type for LAQ operations.
pub type Result<T> = std::result::Result<T, LaqError>;
