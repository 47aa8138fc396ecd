//! End-to-end pipeline tests with scripted converter, generator and embedder.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use laq_rag::{
    DocumentConverter, EmbeddingProvider, GenerationOptions, InMemoryVectorStore, LaqConfig,
    LaqError, LaqPipeline, Result, SearchHit, StoredRecord, TextGenerator, VectorStore,
};

const EXTRACTION_REPLY: &str = r#"Here is the extracted data:
```json
{
  "pdf_title": "TENDER ISSUED FOR LEASING OF JETTY SPACE",
  "laq_type": "Starred",
  "laq_number": "010C",
  "minister": "Shri. Aleixo Sequeira",
  "tabled_by": "Shri Digambar Kamat",
  "date": "08-08-2025",
  "qa_pairs": [
    {
      "question": "(a) the details with the total number of jetty spots available in the river Mandovi for use by Casino vessels;",
      "answer": "Sir, there are total 12 number of jetty spots in river Mandovi."
    },
    {
      "question": "(b) the details of all tender issued for leasing jetty space in river Mandovi;",
      "answer": "Nil"
    }
  ],
  "attachments": ["Annexure - I"]
}
```"#;

const CHAT_REPLY: &str = "There are 12 jetty spots (LAQ 010C).";

/// Returns fixed text and counts calls.
#[derive(Default)]
struct FixedConverter {
    calls: AtomicUsize,
}

#[async_trait]
impl DocumentConverter for FixedConverter {
    async fn convert(&self, _path: &Path) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok("LEGISLATIVE ASSEMBLY STARRED QUESTION NO. 010C ...".to_string())
    }
}

/// Answers extraction prompts with `extraction` and everything else with a
/// canned chat reply.
struct ScriptedGenerator {
    extraction: String,
    prompts: Mutex<Vec<String>>,
    options: Mutex<Vec<GenerationOptions>>,
}

impl ScriptedGenerator {
    fn new(extraction: &str) -> Self {
        Self {
            extraction: extraction.to_string(),
            prompts: Mutex::default(),
            options: Mutex::default(),
        }
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    fn options(&self) -> Vec<GenerationOptions> {
        self.options.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.options.lock().unwrap().push(*options);
        if prompt.starts_with("You are a structured data extraction assistant") {
            Ok(self.extraction.clone())
        } else {
            Ok(CHAT_REPLY.to_string())
        }
    }
}

/// Bag-of-keywords embedder: one dimension per keyword.
struct KeywordEmbedder;

const KEYWORDS: [&str; 8] = ["jetty", "mandovi", "casino", "tender", "spots", "river", "nil", "school"];

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0; KEYWORDS.len()];
        for word in text.to_lowercase().split(|c: char| !c.is_alphanumeric()) {
            if let Some(i) = KEYWORDS.iter().position(|k| *k == word) {
                vector[i] += 1.0;
            }
        }
        Ok(vector)
    }

    fn dimensions(&self) -> usize {
        KEYWORDS.len()
    }
}

/// A sequential store that refuses records whose ID ends with `reject_suffix`.
struct FlakyStore {
    inner: InMemoryVectorStore,
    reject_suffix: &'static str,
}

#[async_trait]
impl VectorStore for FlakyStore {
    async fn create_collection(&self, name: &str, dimensions: usize) -> Result<()> {
        self.inner.create_collection(name, dimensions).await
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        self.inner.delete_collection(name).await
    }

    async fn insert(&self, collection: &str, records: &[StoredRecord]) -> Result<()> {
        if records.iter().any(|r| r.id.ends_with(self.reject_suffix)) {
            return Err(LaqError::StorageUnavailable {
                backend: "flaky".to_string(),
                message: "disk full".to_string(),
            });
        }
        self.inner.insert(collection, records).await
    }

    async fn list_ids(&self, collection: &str) -> Result<std::collections::HashSet<String>> {
        self.inner.list_ids(collection).await
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        self.inner.count(collection).await
    }

    async fn query(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchHit>> {
        self.inner.query(collection, embedding, top_k).await
    }

    fn atomic_batches(&self) -> bool {
        false
    }

    fn backend(&self) -> &'static str {
        "flaky"
    }
}

struct Harness {
    pipeline: LaqPipeline,
    generator: Arc<ScriptedGenerator>,
    converter: Arc<FixedConverter>,
    _dir: tempfile::TempDir,
    pdf: PathBuf,
}

fn keyword_config() -> laq_rag::LaqConfigBuilder {
    LaqConfig::builder().embedding_model("keywords", KEYWORDS.len())
}

async fn harness_with(extraction: &str, store: Arc<dyn VectorStore>) -> Harness {
    harness_configured(extraction, store, keyword_config().build().unwrap()).await
}

async fn harness_configured(
    extraction: &str,
    store: Arc<dyn VectorStore>,
    config: LaqConfig,
) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let pdf = dir.path().join("010C.pdf");
    std::fs::write(&pdf, b"%PDF-1.4 fake").unwrap();

    let generator = Arc::new(ScriptedGenerator::new(extraction));
    let converter = Arc::new(FixedConverter::default());

    let pipeline = LaqPipeline::builder()
        .config(config)
        .converter(converter.clone())
        .generator(generator.clone())
        .embedding_provider(Arc::new(KeywordEmbedder))
        .vector_store(store)
        .build()
        .unwrap();
    pipeline.ensure_collection().await.unwrap();

    Harness { pipeline, generator, converter, _dir: dir, pdf }
}

async fn harness() -> Harness {
    harness_with(EXTRACTION_REPLY, Arc::new(InMemoryVectorStore::new())).await
}

#[tokio::test]
async fn upload_is_idempotent() {
    let h = harness().await;

    let doc = h.pipeline.process_document(&h.pdf).await.unwrap();
    assert_eq!(doc.file_name, "010C.pdf");
    assert_eq!(doc.extraction.qa_pairs().len(), 2);
    assert_eq!(doc.extraction.submitted_by(), Some("Shri Digambar Kamat"));

    let first = h.pipeline.store(&doc).await.unwrap();
    assert_eq!(first.inserted, vec!["010C_010C_qa1", "010C_010C_qa2"]);
    assert!(first.skipped.is_empty());

    let again = h.pipeline.process_document(&h.pdf).await.unwrap();
    let second = h.pipeline.store(&again).await.unwrap();
    assert!(second.inserted.is_empty());
    assert_eq!(second.skipped.len(), 2);
    assert_eq!(second.total(), 2);

    assert_eq!(h.pipeline.count().await.unwrap(), 2);
}

#[tokio::test]
async fn search_ranks_best_match_first() {
    let h = harness().await;
    let doc = h.pipeline.process_document(&h.pdf).await.unwrap();
    h.pipeline.store(&doc).await.unwrap();

    let matches = h.pipeline.search("jetty spots in Mandovi", 5).await.unwrap();
    assert_eq!(matches.len(), 2);
    assert_eq!(matches[0].hit.id, "010C_010C_qa1");
    assert!(matches[0].score > matches[1].score);
    assert!(matches.iter().all(|m| m.score >= 30.0));

    let meta = matches[0].metadata();
    assert_eq!(meta.laq_num, "010C");
    assert_eq!(meta.qa_pair_num, 1);
    assert_eq!(meta.attachments, vec!["Annexure - I"]);

    let limited = h.pipeline.search("jetty spots in Mandovi", 1).await.unwrap();
    assert_eq!(limited.len(), 1);
}

#[tokio::test]
async fn unrelated_query_finds_nothing() {
    let h = harness().await;
    let doc = h.pipeline.process_document(&h.pdf).await.unwrap();
    h.pipeline.store(&doc).await.unwrap();

    assert!(h.pipeline.search("weather forecast", 5).await.unwrap().is_empty());

    let calls_before = h.generator.prompts().len();
    assert!(h.pipeline.chat("weather forecast").await.unwrap().is_none());
    assert_eq!(h.generator.prompts().len(), calls_before);
}

#[tokio::test]
async fn blank_query_is_invalid_input() {
    let h = harness().await;
    let err = h.pipeline.search("   ", 5).await.unwrap_err();
    assert!(matches!(err, LaqError::InvalidInput(_)));
}

#[tokio::test]
async fn chat_answers_from_assembled_context() {
    let h = harness().await;
    let doc = h.pipeline.process_document(&h.pdf).await.unwrap();
    h.pipeline.store(&doc).await.unwrap();

    let answer = h.pipeline.chat("how many jetty spots in Mandovi?").await.unwrap().unwrap();
    assert_eq!(answer.answer, CHAT_REPLY);
    assert_eq!(answer.sources.len(), 2);
    assert_eq!(answer.dropped_sections, 0);

    let prompts = h.generator.prompts();
    let chat_prompt = prompts.last().unwrap();
    assert!(chat_prompt.starts_with("Relevant LAQs:\n[Source 1] 010C.pdf"));
    assert!(chat_prompt.contains("Attachments: Annexure - I"));
    assert!(chat_prompt.ends_with("Query: how many jetty spots in Mandovi?"));
}

#[tokio::test]
async fn context_budget_too_small_for_any_match_is_an_error() {
    let config = keyword_config().max_context_chars(40).build().unwrap();
    let h = harness_configured(EXTRACTION_REPLY, Arc::new(InMemoryVectorStore::new()), config).await;
    let doc = h.pipeline.process_document(&h.pdf).await.unwrap();
    h.pipeline.store(&doc).await.unwrap();

    let calls_before = h.generator.prompts().len();
    let err = h.pipeline.chat("how many jetty spots in Mandovi?").await.unwrap_err();
    match err {
        LaqError::Config(message) => {
            assert!(message.contains("max_context_chars (40)"));
            assert!(message.contains("2 matching section(s) dropped"));
        }
        other => panic!("expected Config, got {other:?}"),
    }
    assert_eq!(h.generator.prompts().len(), calls_before);
}

#[tokio::test]
async fn configured_sampling_reaches_the_generator() {
    let config = keyword_config().top_p(0.8).num_predict(256).build().unwrap();
    let h = harness_configured(EXTRACTION_REPLY, Arc::new(InMemoryVectorStore::new()), config).await;
    let doc = h.pipeline.process_document(&h.pdf).await.unwrap();
    h.pipeline.store(&doc).await.unwrap();
    h.pipeline.chat("jetty spots").await.unwrap().unwrap();

    let options = h.generator.options();
    assert_eq!(options.len(), 2);
    assert_eq!(options[0].temperature, Some(0.1));
    assert_eq!(options[1].temperature, Some(0.3));
    assert!(options.iter().all(|o| o.top_p == Some(0.8) && o.num_predict == Some(256)));
}

#[tokio::test]
async fn changed_embedding_dimensions_fail_instead_of_scoring() {
    let store = Arc::new(InMemoryVectorStore::new());
    store.create_collection("laqs", 768).await.unwrap();
    let h = harness_with(EXTRACTION_REPLY, store).await;
    let doc = h.pipeline.process_document(&h.pdf).await.unwrap();

    let err = h.pipeline.store(&doc).await.unwrap_err();
    assert!(matches!(err, LaqError::StorageUnavailable { .. }));
    let err = h.pipeline.search("jetty spots", 5).await.unwrap_err();
    assert!(matches!(err, LaqError::StorageUnavailable { .. }));
    assert_eq!(h.pipeline.count().await.unwrap(), 0);
}

#[tokio::test]
async fn clear_empties_collection() {
    let h = harness().await;
    let doc = h.pipeline.process_document(&h.pdf).await.unwrap();
    h.pipeline.store(&doc).await.unwrap();

    h.pipeline.clear().await.unwrap();
    assert_eq!(h.pipeline.count().await.unwrap(), 0);

    // The collection is usable again after clearing.
    let report = h.pipeline.store(&doc).await.unwrap();
    assert_eq!(report.inserted.len(), 2);
}

#[tokio::test]
async fn invalid_file_never_reaches_converter() {
    let h = harness().await;
    let err = h.pipeline.process_document(Path::new("/no/such/dir/010C.pdf")).await.unwrap_err();
    assert!(matches!(err, LaqError::FileValidation { .. }));
    assert_eq!(h.converter.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unparsable_reply_stores_nothing() {
    let h = harness_with("I could not find any questions.", Arc::new(InMemoryVectorStore::new()))
        .await;
    let err = h.pipeline.process_document(&h.pdf).await.unwrap_err();
    match err {
        LaqError::ExtractionParse { preview, .. } => {
            assert!(preview.contains("could not find"));
        }
        other => panic!("expected ExtractionParse, got {other:?}"),
    }
    assert_eq!(h.pipeline.count().await.unwrap(), 0);
}

#[tokio::test]
async fn schema_violations_are_reported_together() {
    let reply = r#"{"pdf_title": "", "laq_type": "", "laq_number": "", "minister": "", "date": "", "qa_pairs": []}"#;
    let h = harness_with(reply, Arc::new(InMemoryVectorStore::new())).await;
    let err = h.pipeline.process_document(&h.pdf).await.unwrap_err();
    match err {
        LaqError::SchemaValidation { violations } => assert_eq!(violations[0].field, "qa_pairs"),
        other => panic!("expected SchemaValidation, got {other:?}"),
    }
}

#[tokio::test]
async fn sequential_store_reports_partial_failure() {
    let store = Arc::new(FlakyStore { inner: InMemoryVectorStore::new(), reject_suffix: "_qa2" });
    let h = harness_with(EXTRACTION_REPLY, store).await;
    let doc = h.pipeline.process_document(&h.pdf).await.unwrap();

    let err = h.pipeline.store(&doc).await.unwrap_err();
    match err {
        LaqError::StoragePartialFailure { inserted, failures } => {
            assert_eq!(inserted, 1);
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].id, "010C_010C_qa2");
        }
        other => panic!("expected StoragePartialFailure, got {other:?}"),
    }
    assert_eq!(h.pipeline.count().await.unwrap(), 1);
}

#[tokio::test]
async fn builder_requires_components() {
    let err = LaqPipeline::builder().build().err().unwrap();
    assert!(matches!(err, LaqError::Config(_)));
}
