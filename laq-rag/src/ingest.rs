//! Identity assignment and deduplicated persistence of extracted records.
//!
//! Record IDs are a pure function of the source stem, the record number and
//! the pair position, so uploading the same document twice yields the same
//! IDs and the second upload inserts nothing.

use std::collections::HashSet;

use tracing::{error, info, warn};

use crate::embedding::EmbeddingProvider;
use crate::error::{FailedInsert, LaqError, Result};
use crate::record::{ExtractionResult, RecordMetadata, StoredRecord};
use crate::vectorstore::VectorStore;

/// Rendered in IDs when the extraction has a blank record number.
const UNKNOWN_RECORD_NUMBER: &str = "unknown";

/// Stable identifier for the pair at zero-based `index`.
///
/// Format: `{stem}_{record_number}_qa{index + 1}`.
pub fn record_id(stem: &str, record_number: &str, index: usize) -> String {
    let number = record_number.trim();
    let number = if number.is_empty() { UNKNOWN_RECORD_NUMBER } else { number };
    format!("{stem}_{number}_qa{}", index + 1)
}

/// A record ready for embedding and storage.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingRecord {
    pub id: String,
    pub document: String,
    pub metadata: RecordMetadata,
}

impl PendingRecord {
    /// Attach an embedding, producing the persisted form.
    pub fn into_stored(self, embedding: Vec<f32>) -> StoredRecord {
        StoredRecord {
            id: self.id,
            document: self.document,
            embedding,
            metadata: self.metadata.to_map(),
        }
    }
}

/// Expand an extraction into one pending record per pair.
///
/// `file_name` is the source document's file name; its stem seeds the IDs.
pub fn build_records(extraction: &ExtractionResult, file_name: &str) -> Vec<PendingRecord> {
    let stem = std::path::Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file_name);

    extraction
        .qa_pairs()
        .iter()
        .enumerate()
        .map(|(index, pair)| PendingRecord {
            id: record_id(stem, extraction.record_number(), index),
            document: pair.document_text(),
            metadata: RecordMetadata {
                pdf: file_name.to_string(),
                pdf_title: extraction.title().to_string(),
                laq_num: extraction.record_number().to_string(),
                qa_pair_num: index + 1,
                laq_type: extraction.record_type().to_string(),
                question: pair.question.clone(),
                answer: pair.answer.clone(),
                minister: extraction.issuer().to_string(),
                date: extraction.date().to_string(),
                attachments: extraction.attachments().to_vec(),
                tabled_by: extraction.submitted_by().map(str::to_string),
            },
        })
        .collect()
}

/// Split `records` into those not yet stored and the IDs already present.
pub fn partition_new(
    records: Vec<PendingRecord>,
    existing: &HashSet<String>,
) -> (Vec<PendingRecord>, Vec<String>) {
    let (skipped, fresh): (Vec<_>, Vec<_>) =
        records.into_iter().partition(|record| existing.contains(&record.id));
    (fresh, skipped.into_iter().map(|r| r.id).collect())
}

/// Outcome of one ingestion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// IDs written by this run, in pair order.
    pub inserted: Vec<String>,
    /// IDs that were already stored and left untouched.
    pub skipped: Vec<String>,
}

impl IngestReport {
    /// Total pairs considered.
    pub fn total(&self) -> usize {
        self.inserted.len() + self.skipped.len()
    }
}

/// Embed and store `extraction`, skipping records that already exist.
///
/// # Errors
///
/// - Embedding failures propagate unchanged; nothing is written.
/// - [`LaqError::StoragePartialFailure`] if a non-atomic store accepted only
///   part of the batch.
/// - Any other storage error from an atomic batch.
pub async fn ingest_extraction(
    extraction: &ExtractionResult,
    file_name: &str,
    collection: &str,
    embedder: &dyn EmbeddingProvider,
    store: &dyn VectorStore,
) -> Result<IngestReport> {
    let candidates = build_records(extraction, file_name);
    let existing = store.list_ids(collection).await?;
    let (fresh, skipped) = partition_new(candidates, &existing);

    if !skipped.is_empty() {
        info!(file = file_name, skipped = skipped.len(), "records already stored, skipping");
    }
    if fresh.is_empty() {
        return Ok(IngestReport { inserted: Vec::new(), skipped });
    }

    let texts: Vec<&str> = fresh.iter().map(|r| r.document.as_str()).collect();
    let embeddings = embedder.embed_batch(&texts).await.map_err(|e| {
        error!(file = file_name, error = %e, "embedding failed during ingestion");
        e
    })?;
    if embeddings.len() != fresh.len() {
        return Err(LaqError::ServiceResponse {
            service: "embedding".to_string(),
            message: format!("expected {} embeddings, received {}", fresh.len(), embeddings.len()),
        });
    }

    let records: Vec<StoredRecord> =
        fresh.into_iter().zip(embeddings).map(|(pending, emb)| pending.into_stored(emb)).collect();
    let inserted = persist(store, collection, &records).await?;

    info!(file = file_name, inserted = inserted.len(), skipped = skipped.len(), "ingested document");
    Ok(IngestReport { inserted, skipped })
}

/// Write `records` in one batch when the store supports it, otherwise one by
/// one, collecting per-record failures.
pub async fn persist(
    store: &dyn VectorStore,
    collection: &str,
    records: &[StoredRecord],
) -> Result<Vec<String>> {
    if store.atomic_batches() {
        store.insert(collection, records).await.map_err(|e| {
            error!(collection, backend = store.backend(), error = %e, "batch insert failed");
            e
        })?;
        return Ok(records.iter().map(|r| r.id.clone()).collect());
    }

    let mut inserted = Vec::with_capacity(records.len());
    let mut failures = Vec::new();
    for record in records {
        match store.insert(collection, std::slice::from_ref(record)).await {
            Ok(()) => inserted.push(record.id.clone()),
            Err(e) => {
                warn!(collection, id = %record.id, error = %e, "record insert failed");
                failures.push(FailedInsert { id: record.id.clone(), reason: e.to_string() });
            }
        }
    }

    if failures.is_empty() {
        Ok(inserted)
    } else {
        Err(LaqError::StoragePartialFailure { inserted: inserted.len(), failures })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::schema::validate_extraction;

    fn extraction(number: &str) -> ExtractionResult {
        validate_extraction(&json!({
            "pdf_title": "JETTY SPACE",
            "laq_type": "Starred",
            "laq_number": number,
            "minister": "Shri. A",
            "date": "08-08-2025",
            "qa_pairs": [
                { "question": "(a) spots?", "answer": "Twelve." },
                { "question": "(b) tenders?", "answer": "Nil" }
            ],
            "attachments": ["Annexure - I"]
        }))
        .unwrap()
    }

    #[test]
    fn ids_are_deterministic() {
        assert_eq!(record_id("010C", "010C", 0), "010C_010C_qa1");
        assert_eq!(record_id("doc", "  ", 2), "doc_unknown_qa3");
        assert_eq!(record_id("doc", "7", 1), record_id("doc", "7", 1));
    }

    #[test]
    fn builds_one_record_per_pair() {
        let records = build_records(&extraction("010C"), "jetty.pdf");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, "jetty_010C_qa1");
        assert_eq!(records[1].id, "jetty_010C_qa2");
        assert_eq!(records[1].document, "Q: (b) tenders?\nA: Nil");
        assert_eq!(records[1].metadata.qa_pair_num, 2);
        assert_eq!(records[0].metadata.pdf, "jetty.pdf");
        assert_eq!(records[0].metadata.attachments, vec!["Annexure - I"]);
    }

    #[test]
    fn partition_separates_existing_ids() {
        let records = build_records(&extraction("9"), "a.pdf");
        let existing = HashSet::from(["a_9_qa1".to_string()]);
        let (fresh, skipped) = partition_new(records, &existing);
        assert_eq!(skipped, vec!["a_9_qa1"]);
        assert_eq!(fresh.len(), 1);
        assert_eq!(fresh[0].id, "a_9_qa2");
    }

    #[test]
    fn stored_metadata_uses_compatibility_keys() {
        let record = build_records(&extraction("9"), "a.pdf").remove(0).into_stored(vec![1.0]);
        for key in ["pdf", "pdf_title", "laq_num", "qa_pair_num", "type", "question", "answer", "minister", "date", "attachments"] {
            assert!(record.metadata.contains_key(key), "missing {key}");
        }
    }
}
