//! Structured extraction of LAQ records from converted document text.

use std::sync::Arc;

use tracing::{error, info};

use crate::error::Result;
use crate::generation::{GenerationOptions, TextGenerator};
use crate::normalize::ExtractionNormalizer;
use crate::record::ExtractionResult;

const PROMPT_PREAMBLE: &str = r#"You are a structured data extraction assistant. Extract Legislative Assembly Question (LAQ) details from the following text.

The text comes from an official LAQ PDF and may include multi-line tables, line breaks, and subparts (a), (b), (c), etc.

Output well-structured JSON where:
- Each sub-question (a), (b), (c) becomes a separate Q&A pair in the "qa_pairs" list.
- Questions and answers are complete, not truncated.
- Original wording is preserved exactly; do not paraphrase or summarize.
- Subparts are never merged into a single question.

### REQUIRED OUTPUT FORMAT

{
  "pdf_title": "TENDER ISSUED FOR LEASING OF JETTY SPACE",
  "laq_type": "Starred",
  "laq_number": "010C",
  "minister": "Shri. Aleixo Sequeira, Minister for Captain of Ports Department",
  "tabled_by": "Shri Digambar Kamat",
  "date": "08-08-2025",
  "qa_pairs": [
    {
      "question": "(a) the details with the total number of jetty spots available in the river Mandovi for use by Casino and cruises vessels;",
      "answer": "Sir, there are total 12 number of jetty spots in river Mandovi for use by Casino and cruises vessels. The details are enclosed at Annexure - I."
    },
    {
      "question": "(b) the details of all tender issued for leasing jetty space in river Mandovi from the year 2020 till date;",
      "answer": "Nil"
    }
  ],
  "attachments": ["Annexure - I"]
}

### RULES
1. Detect and reconstruct the full text of each sub-question and its matching answer.
2. Treat text like "(a) ...", "(b) ...", "(c) ..." as boundaries for new Q&A pairs.
3. Combine lines until a new sub-question or section begins.
4. Keep punctuation and line breaks (as "\n") intact.
5. Use "" for any field that is not present in the text.
6. Output only valid JSON. Do not include explanations or extra commentary.

Now extract the structured data in this format from the following text:

"#;

/// Build the extraction prompt, including at most `max_chars` characters of
/// `document_text`.
pub fn extraction_prompt(document_text: &str, max_chars: usize) -> String {
    let excerpt = match document_text.char_indices().nth(max_chars) {
        Some((cut, _)) => &document_text[..cut],
        None => document_text,
    };
    format!("{PROMPT_PREAMBLE}{excerpt}\n")
}

/// Asks a [`TextGenerator`] for a structured extraction and normalizes the
/// reply.
#[derive(Clone)]
pub struct Extractor {
    generator: Arc<dyn TextGenerator>,
    normalizer: ExtractionNormalizer,
    options: GenerationOptions,
    max_prompt_chars: usize,
}

impl Extractor {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        normalizer: ExtractionNormalizer,
        options: GenerationOptions,
        max_prompt_chars: usize,
    ) -> Self {
        Self { generator, normalizer, options, max_prompt_chars }
    }

    /// Extract records from converted document text.
    ///
    /// # Errors
    ///
    /// Propagates generator failures, `ExtractionParse` and `SchemaValidation`.
    pub async fn extract(&self, document_text: &str) -> Result<ExtractionResult> {
        let prompt = extraction_prompt(document_text, self.max_prompt_chars);
        let raw = self.generator.generate(&prompt, &self.options).await?;

        let result = self.normalizer.normalize(&raw).map_err(|e| {
            error!(error = %e, "model output could not be normalized");
            e
        })?;
        info!(
            laq_number = result.record_number(),
            qa_pairs = result.qa_pairs().len(),
            "extracted structured data"
        );
        Ok(result)
    }
}
