//! Data types for extracted records, stored records, and search hits.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Placeholder rendered for metadata values that were never recorded.
pub const NOT_AVAILABLE: &str = "N/A";

/// Metadata keys persisted with every record.
///
/// These names are part of the on-disk format: changing them breaks
/// idempotent re-ingestion of previously stored collections.
pub mod keys {
    pub const PDF: &str = "pdf";
    pub const PDF_TITLE: &str = "pdf_title";
    pub const LAQ_NUM: &str = "laq_num";
    pub const QA_PAIR_NUM: &str = "qa_pair_num";
    pub const TYPE: &str = "type";
    pub const QUESTION: &str = "question";
    pub const ANSWER: &str = "answer";
    pub const MINISTER: &str = "minister";
    pub const DATE: &str = "date";
    pub const ATTACHMENTS: &str = "attachments";
    pub const TABLED_BY: &str = "tabled_by";
}

/// One question with its answer. Both sides are non-empty once validated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaPair {
    pub question: String,
    pub answer: String,
}

impl QaPair {
    /// Canonical text used for embedding and retrieval.
    pub fn document_text(&self) -> String {
        format!("Q: {}\nA: {}", self.question, self.answer)
    }
}

/// The validated structure extracted from one source document.
///
/// Only [`validate_extraction`](crate::schema::validate_extraction) constructs
/// this type, so every instance holds at least one non-empty pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractionResult {
    pub(crate) title: String,
    pub(crate) record_type: String,
    pub(crate) record_number: String,
    pub(crate) issuer: String,
    pub(crate) date: String,
    pub(crate) qa_pairs: Vec<QaPair>,
    pub(crate) submitted_by: Option<String>,
    pub(crate) attachments: Vec<String>,
}

impl ExtractionResult {
    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn record_type(&self) -> &str {
        &self.record_type
    }

    pub fn record_number(&self) -> &str {
        &self.record_number
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn date(&self) -> &str {
        &self.date
    }

    /// The extracted pairs, in source order. Never empty.
    pub fn qa_pairs(&self) -> &[QaPair] {
        &self.qa_pairs
    }

    pub fn submitted_by(&self) -> Option<&str> {
        self.submitted_by.as_deref()
    }

    pub fn attachments(&self) -> &[String] {
        &self.attachments
    }
}

/// Typed view of the flat metadata map stored alongside each record.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RecordMetadata {
    /// Source filename, including extension.
    pub pdf: String,
    pub pdf_title: String,
    pub laq_num: String,
    /// One-based position of the pair within its document.
    pub qa_pair_num: usize,
    pub laq_type: String,
    pub question: String,
    pub answer: String,
    pub minister: String,
    pub date: String,
    pub attachments: Vec<String>,
    pub tabled_by: Option<String>,
}

impl RecordMetadata {
    /// Flatten into string key/value pairs; attachments become a JSON array.
    pub fn to_map(&self) -> BTreeMap<String, String> {
        let attachments =
            serde_json::to_string(&self.attachments).unwrap_or_else(|_| "[]".to_string());
        let mut map = BTreeMap::from([
            (keys::PDF.to_string(), self.pdf.clone()),
            (keys::PDF_TITLE.to_string(), self.pdf_title.clone()),
            (keys::LAQ_NUM.to_string(), self.laq_num.clone()),
            (keys::QA_PAIR_NUM.to_string(), self.qa_pair_num.to_string()),
            (keys::TYPE.to_string(), self.laq_type.clone()),
            (keys::QUESTION.to_string(), self.question.clone()),
            (keys::ANSWER.to_string(), self.answer.clone()),
            (keys::MINISTER.to_string(), self.minister.clone()),
            (keys::DATE.to_string(), self.date.clone()),
            (keys::ATTACHMENTS.to_string(), attachments),
        ]);
        if let Some(tabled_by) = &self.tabled_by {
            map.insert(keys::TABLED_BY.to_string(), tabled_by.clone());
        }
        map
    }

    /// Rebuild from a flat map. Missing keys become [`NOT_AVAILABLE`] and
    /// unreadable attachment lists become empty.
    pub fn from_map(map: &BTreeMap<String, String>) -> Self {
        let text = |key: &str| map.get(key).cloned().unwrap_or_else(|| NOT_AVAILABLE.to_string());
        Self {
            pdf: text(keys::PDF),
            pdf_title: text(keys::PDF_TITLE),
            laq_num: text(keys::LAQ_NUM),
            qa_pair_num: map.get(keys::QA_PAIR_NUM).and_then(|v| v.parse().ok()).unwrap_or(0),
            laq_type: text(keys::TYPE),
            question: text(keys::QUESTION),
            answer: text(keys::ANSWER),
            minister: text(keys::MINISTER),
            date: text(keys::DATE),
            attachments: map
                .get(keys::ATTACHMENTS)
                .and_then(|raw| serde_json::from_str(raw).ok())
                .unwrap_or_default(),
            tabled_by: map.get(keys::TABLED_BY).cloned(),
        }
    }
}

/// A persisted question/answer record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredRecord {
    /// Deterministic identifier, unique within a collection.
    pub id: String,
    /// `"Q: …\nA: …"` rendering used for embedding.
    pub document: String,
    /// The vector embedding of `document`.
    pub embedding: Vec<f32>,
    /// Flat metadata map, see [`keys`].
    pub metadata: BTreeMap<String, String>,
}

/// One nearest-neighbour result returned by a vector store query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchHit {
    pub id: String,
    pub document: String,
    pub metadata: BTreeMap<String, String>,
    /// Raw distance reported by the store (cosine distance, lower is closer).
    pub distance: f32,
}

impl SearchHit {
    /// Typed view of this hit's metadata.
    pub fn record_metadata(&self) -> RecordMetadata {
        RecordMetadata::from_map(&self.metadata)
    }
}
