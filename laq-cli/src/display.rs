//! Terminal rendering of pipeline results and errors.

use std::path::Path;

use laq_rag::{
    ChatAnswer, IngestReport, LaqConfig, LaqError, ProcessedDocument, QualityStats,
    RelevanceMatch, truncate_chars,
};

const WIDTH: usize = 100;
const PREVIEW_CHARS: usize = 200;
const RESULT_CHARS: usize = 300;

pub fn rule() -> String {
    "=".repeat(WIDTH)
}

pub fn heading(title: &str) {
    println!("\n{}\n{title}\n{}", rule(), rule());
}

pub fn extraction(doc: &ProcessedDocument) {
    let ex = &doc.extraction;
    heading("EXTRACTED LAQ DATA");
    println!("PDF:        {}", doc.file_name);
    println!("Title:      {}", ex.title());
    println!("LAQ Type:   {}", ex.record_type());
    println!("LAQ Number: {}", ex.record_number());
    println!("Minister:   {}", ex.issuer());
    println!("Date:       {}", ex.date());
    if let Some(tabled_by) = ex.submitted_by() {
        println!("Tabled by:  {tabled_by}");
    }

    println!("\nQuestion-Answer Pairs: {}", ex.qa_pairs().len());
    println!("{}", "-".repeat(WIDTH));
    for (i, pair) in ex.qa_pairs().iter().enumerate() {
        println!("\n[Q&A Pair {}]", i + 1);
        println!("  Q: {}", truncate_chars(&pair.question, PREVIEW_CHARS));
        println!("  A: {}", truncate_chars(&pair.answer, PREVIEW_CHARS));
    }

    if !ex.attachments().is_empty() {
        println!("\nAttachments:");
        for attachment in ex.attachments() {
            println!("  - {attachment}");
        }
    }
    println!("{}", rule());
}

pub fn ingest_report(report: &IngestReport, file_name: &str) {
    println!("Stored {}/{} Q&A pairs from {file_name}", report.inserted.len(), report.total());
    if !report.skipped.is_empty() {
        println!("Skipped {} pair(s) already in the database", report.skipped.len());
    }
}

pub fn search_results(query: &str, matches: &[RelevanceMatch]) {
    heading(&format!("SEARCH RESULTS FOR: {}", query.to_uppercase()));
    println!("Found {} matching LAQs", matches.len());
    let stats = QualityStats::from_matches(matches);
    println!(
        "Match quality: {} strong | {} moderate | {} weak",
        stats.strong, stats.moderate, stats.weak
    );

    for (i, m) in matches.iter().enumerate() {
        search_result(i + 1, m);
    }
}

fn search_result(position: usize, m: &RelevanceMatch) {
    let meta = m.metadata();
    let source = source_label(&meta.pdf);

    println!("\n+{}+", "-".repeat(WIDTH - 2));
    println!("| RESULT #{position:<width$}|", width = WIDTH - 11);
    println!("+{}+", "-".repeat(WIDTH - 2));

    println!("\nSOURCE: {source}");
    println!(
        "   LAQ #{} ({}) | Date: {} | {} ({:.2}%)",
        meta.laq_num,
        meta.laq_type,
        meta.date,
        m.quality(),
        m.display_score()
    );
    println!("\nMinister: {}", meta.minister);
    println!("\nQUESTION:\n   {}", truncate_chars(&meta.question, RESULT_CHARS));
    println!("\nANSWER:\n   {}", truncate_chars(&meta.answer, RESULT_CHARS));
    if !meta.attachments.is_empty() {
        println!("\nATTACHMENTS: {}", meta.attachments.join(", "));
    }
    println!("\n{}", "-".repeat(WIDTH));
}

/// Upper-cased file stem of a stored PDF name, whatever the extension's case.
fn source_label(pdf: &str) -> String {
    Path::new(pdf).file_stem().and_then(|s| s.to_str()).unwrap_or(pdf).to_uppercase()
}

pub fn chat_answer(answer: &ChatAnswer) {
    heading("RESPONSE");
    println!("{}", answer.answer);
    println!("{}", rule());

    println!("\nBased on {} LAQ(s):", answer.sources.len());
    for (i, source) in answer.sources.iter().enumerate() {
        let meta = source.metadata();
        println!("  {}. LAQ #{} ({:.2}% match)", i + 1, meta.laq_num, source.display_score());
    }
    if answer.dropped_sections > 0 {
        println!("  ({} lower-ranked match(es) left out to fit the context)", answer.dropped_sections);
    }
}

pub fn info(config: &LaqConfig, count: usize) {
    heading("DATABASE INFO");
    println!("Total documents:      {count}");
    println!("Database path:        {}", config.db_path.display());
    println!("Collection name:      {}", config.collection_name);
    println!("Similarity threshold: {}", config.similarity_threshold);
    println!("Embedding model:      {}", config.embedding_model);
    println!("Generation model:     {}", config.generation_model);
}

/// Print `err` with a remediation hint when one is known.
pub fn error(err: &anyhow::Error) {
    let Some(laq) = err.downcast_ref::<LaqError>() else {
        eprintln!("Error: {err:#}");
        return;
    };

    eprintln!("Error: {laq}");
    match laq {
        LaqError::ModelMissing { model, .. } => {
            eprintln!("Pull the model first: ollama pull {model}");
        }
        LaqError::ServiceConnection { .. } => {
            eprintln!("Make sure the Ollama server is running: ollama serve");
        }
        LaqError::SchemaValidation { violations } => {
            for violation in violations {
                eprintln!("  - {violation}");
            }
        }
        LaqError::ExtractionParse { preview, .. } => {
            eprintln!("Model output was:\n{preview}");
        }
        LaqError::StoragePartialFailure { failures, .. } => {
            for failure in failures {
                eprintln!("  - {}: {}", failure.id, failure.reason);
            }
        }
        LaqError::Conversion { .. } => {
            eprintln!("Check that the converter (LAQ_CONVERTER, default pdftotext) is installed");
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_label_drops_extension_in_any_case() {
        assert_eq!(source_label("010c.pdf"), "010C");
        assert_eq!(source_label("010C.PDF"), "010C");
        assert_eq!(source_label("report.v2.Pdf"), "REPORT.V2");
        assert_eq!(source_label("notes"), "NOTES");
    }
}
