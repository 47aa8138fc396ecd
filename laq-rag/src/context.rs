//! Assembly of ranked matches into a bounded prompt context.

use crate::relevance::RelevanceMatch;

/// First line of every assembled context.
pub const CONTEXT_HEADER: &str = "Relevant LAQs:";

/// Separator placed between sections.
pub const SECTION_DELIMITER: &str = "\n---\n";

/// The assembled context and how much of the input made it in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledContext {
    pub text: String,
    /// Number of leading matches rendered into `text`.
    pub included: usize,
    /// Number of trailing (lowest-ranked) matches left out for size.
    pub dropped: usize,
}

/// Renders matches as labelled sections under a character budget.
#[derive(Debug, Clone, Copy)]
pub struct ContextAssembler {
    max_chars: usize,
}

impl ContextAssembler {
    /// Create an assembler that adds sections only while the output, header
    /// included, stays within `max_chars` characters. The header itself is
    /// always emitted.
    pub fn new(max_chars: usize) -> Self {
        Self { max_chars }
    }

    /// Render `matches` (best first). Whole sections are dropped from the end
    /// until the text fits; a section is never cut in half.
    pub fn assemble(&self, matches: &[RelevanceMatch]) -> AssembledContext {
        let sections: Vec<String> =
            matches.iter().enumerate().map(|(i, m)| render_section(i + 1, m)).collect();

        let mut used = CONTEXT_HEADER.chars().count();
        let mut included = 0;
        for section in &sections {
            // The first section follows the header after a newline, later ones after the delimiter.
            let joiner = if included == 0 { 1 } else { SECTION_DELIMITER.chars().count() };
            let cost = joiner + section.chars().count();
            if used + cost > self.max_chars {
                break;
            }
            used += cost;
            included += 1;
        }

        let mut text = String::from(CONTEXT_HEADER);
        if included > 0 {
            text.push('\n');
            text.push_str(&sections[..included].join(SECTION_DELIMITER));
        }

        AssembledContext { text, included, dropped: sections.len() - included }
    }
}

fn render_section(position: usize, m: &RelevanceMatch) -> String {
    let meta = m.metadata();
    let mut out = format!(
        "[Source {position}] {pdf}\nLAQ Type: {laq_type}\nLAQ No: {laq_num}\nMinister: {minister}\nDate: {date}\nQ: {question}\nA: {answer}",
        pdf = meta.pdf,
        laq_type = meta.laq_type,
        laq_num = meta.laq_num,
        minister = meta.minister,
        date = meta.date,
        question = meta.question,
        answer = meta.answer,
    );
    if !meta.attachments.is_empty() {
        out.push_str("\nAttachments: ");
        out.push_str(&meta.attachments.join(", "));
    }
    out
}

/// Prompt asking the generator to answer `query` from `context`.
pub fn chat_prompt(context: &str, query: &str) -> String {
    format!(
        "{context}\n\nAnswer this query based on the LAQs above. Cite the LAQ number of every \
         source you rely on, and say so if the LAQs do not contain the answer.\n\nQuery: {query}"
    )
}
