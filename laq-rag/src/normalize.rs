//! Recovery of structured extractions from free-form model output.
//!
//! Generation models wrap JSON in prose or markdown fences, leave trailing
//! commas, emit raw line breaks inside strings, and sometimes use typographic
//! quotes as delimiters. [`ExtractionNormalizer`] tries, in order:
//!
//! 1. a strict parse of the whole response,
//! 2. a strict parse of each embedded top-level `{…}` span,
//! 3. the same two attempts after lenient repair passes,
//!
//! and hands the first JSON object it finds to
//! [`validate_extraction`](crate::schema::validate_extraction).

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{LaqError, Result};
use crate::record::ExtractionResult;
use crate::schema::validate_extraction;

/// Default number of characters of raw output kept in parse-failure errors.
pub const DEFAULT_PREVIEW_CHARS: usize = 200;

/// Turns raw model output into a validated [`ExtractionResult`].
#[derive(Debug, Clone, Copy)]
pub struct ExtractionNormalizer {
    preview_chars: usize,
}

impl Default for ExtractionNormalizer {
    fn default() -> Self {
        Self { preview_chars: DEFAULT_PREVIEW_CHARS }
    }
}

impl ExtractionNormalizer {
    /// Create a normalizer that keeps `preview_chars` characters of the raw
    /// response in [`LaqError::ExtractionParse`] diagnostics.
    pub fn new(preview_chars: usize) -> Self {
        Self { preview_chars }
    }

    /// Recover and validate an extraction from `raw`.
    ///
    /// # Errors
    ///
    /// - [`LaqError::ExtractionParse`] if no JSON object can be recovered.
    /// - [`LaqError::SchemaValidation`] if the recovered object is invalid.
    pub fn normalize(&self, raw: &str) -> Result<ExtractionResult> {
        let candidate = self.recover(raw)?;
        validate_extraction(&candidate)
    }

    /// Recover the first JSON object from `raw` without validating it.
    ///
    /// # Errors
    ///
    /// Returns [`LaqError::ExtractionParse`] if every attempt fails.
    pub fn recover(&self, raw: &str) -> Result<Value> {
        let mut last_error = String::from("response is empty");

        if let Some(value) = parse_object(raw.trim(), &mut last_error) {
            return Ok(value);
        }
        if let Some(value) = parse_embedded(raw, &mut last_error) {
            debug!("recovered extraction from embedded span");
            return Ok(value);
        }

        let repaired = repair(raw);
        if let Some(value) = parse_object(repaired.trim(), &mut last_error)
            .or_else(|| parse_embedded(&repaired, &mut last_error))
        {
            warn!("model output needed lenient repair before parsing");
            return Ok(value);
        }

        Err(LaqError::ExtractionParse {
            reason: last_error,
            preview: truncate_chars(raw.trim(), self.preview_chars),
        })
    }
}

fn parse_object(text: &str, last_error: &mut String) -> Option<Value> {
    if text.is_empty() {
        return None;
    }
    match serde_json::from_str::<Value>(text) {
        Ok(value @ Value::Object(_)) => Some(value),
        Ok(_) => {
            *last_error = "top-level JSON value is not an object".to_string();
            None
        }
        Err(e) => {
            *last_error = e.to_string();
            None
        }
    }
}

/// Try every balanced top-level span, then the greedy first-`{`-to-last-`}`.
fn parse_embedded(text: &str, last_error: &mut String) -> Option<Value> {
    let mut start = 0;
    while let Some(offset) = text[start..].find('{') {
        let open = start + offset;
        match balanced_end(&text[open..]) {
            Some(len) => {
                if let Some(value) = parse_object(&text[open..open + len], last_error) {
                    return Some(value);
                }
                start = open + len;
            }
            None => start = open + 1,
        }
    }

    let open = text.find('{')?;
    let close = text.rfind('}')?;
    if close > open { parse_object(&text[open..=close], last_error) } else { None }
}

/// Byte length of the object starting at `text[0] == '{'`, honouring strings.
fn balanced_end(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (idx, c) in text.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(idx + 1);
                }
            }
            _ => {}
        }
    }
    None
}

/// Lenient repair passes: drop markdown fences, accept typographic quotes as
/// string delimiters, escape raw control characters inside strings, and
/// remove trailing commas.
fn repair(text: &str) -> String {
    let unfenced: String = text
        .lines()
        .filter(|line| !line.trim_start().starts_with("```"))
        .collect::<Vec<_>>()
        .join("\n");

    let chars: Vec<char> = unfenced.chars().collect();
    let mut out = String::with_capacity(unfenced.len());
    let mut in_string = false;
    let mut typographic = false;
    let mut escaped = false;

    for (i, &c) in chars.iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
                out.push(c);
                continue;
            }
            match c {
                '\\' => {
                    escaped = true;
                    out.push(c);
                }
                '"' if !typographic => {
                    in_string = false;
                    out.push(c);
                }
                '"' => out.push_str("\\\""),
                '\u{201C}' | '\u{201D}' if typographic => {
                    in_string = false;
                    typographic = false;
                    out.push('"');
                }
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                '\t' => out.push_str("\\t"),
                _ => out.push(c),
            }
            continue;
        }

        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            '\u{201C}' | '\u{201D}' => {
                in_string = true;
                typographic = true;
                out.push('"');
            }
            ',' if closes_next(&chars[i + 1..]) => {}
            _ => out.push(c),
        }
    }
    out
}

fn closes_next(rest: &[char]) -> bool {
    matches!(rest.iter().find(|c| !c.is_whitespace()), Some('}') | Some(']'))
}

/// Truncate `text` to at most `max` characters, appending `...` when cut.
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OBJECT: &str = r#"{"pdf_title":"JETTY SPACE","laq_type":"Starred","laq_number":"010C","minister":"Shri. A","date":"08-08-2025","qa_pairs":[{"question":"(a) how many spots?","answer":"Twelve."}],"attachments":["Annexure - I"]}"#;

    fn parse_failure(raw: &str) -> (String, String) {
        match ExtractionNormalizer::default().normalize(raw).unwrap_err() {
            LaqError::ExtractionParse { reason, preview } => (reason, preview),
            other => panic!("expected parse failure, got {other:?}"),
        }
    }

    #[test]
    fn strict_json_parses_directly() {
        let result = ExtractionNormalizer::default().normalize(OBJECT).unwrap();
        assert_eq!(result.record_number(), "010C");
    }

    #[test]
    fn json_embedded_in_prose_is_recovered() {
        let raw = format!("Here is the result: {OBJECT} Thanks!");
        let result = ExtractionNormalizer::default().normalize(&raw).unwrap();
        assert_eq!(result.qa_pairs()[0].answer, "Twelve.");
    }

    #[test]
    fn skips_non_json_brace_spans_in_prose() {
        let raw = format!("Output {{as requested}}:\n{OBJECT}");
        assert!(ExtractionNormalizer::default().normalize(&raw).is_ok());
    }

    #[test]
    fn unmatched_brace_in_prose_does_not_hide_the_object() {
        let raw = format!("Fields use the {{key: value form. Result:\n{OBJECT}");
        let result = ExtractionNormalizer::default().normalize(&raw).unwrap();
        assert_eq!(result.record_number(), "010C");
    }

    #[test]
    fn braces_inside_strings_do_not_end_the_span() {
        let raw = r#"Result: {"pdf_title":"a } b","laq_type":"","laq_number":"1","minister":"","date":"","qa_pairs":[{"question":"q {x}","answer":"a"}]} done"#;
        let result = ExtractionNormalizer::default().normalize(raw).unwrap();
        assert_eq!(result.title(), "a } b");
    }

    #[test]
    fn markdown_fence_is_stripped() {
        let raw = format!("```json\n{OBJECT}\n```");
        assert!(ExtractionNormalizer::default().normalize(&raw).is_ok());
    }

    #[test]
    fn trailing_commas_are_repaired() {
        let raw = r#"{"pdf_title":"t","laq_type":"","laq_number":"7","minister":"","date":"",
            "qa_pairs":[{"question":"q","answer":"a, b",},],"attachments":[],}"#;
        let result = ExtractionNormalizer::default().normalize(raw).unwrap();
        assert_eq!(result.qa_pairs()[0].answer, "a, b");
    }

    #[test]
    fn raw_newlines_inside_strings_are_escaped() {
        let raw = "{\"pdf_title\":\"t\",\"laq_type\":\"\",\"laq_number\":\"7\",\"minister\":\"\",\
                   \"date\":\"\",\"qa_pairs\":[{\"question\":\"q\",\"answer\":\"line one\nline two\"}]}";
        let result = ExtractionNormalizer::default().normalize(raw).unwrap();
        assert_eq!(result.qa_pairs()[0].answer, "line one\nline two");
    }

    #[test]
    fn typographic_quote_delimiters_are_normalized() {
        let raw = "{\u{201C}pdf_title\u{201D}: \u{201C}t\u{201D}, \"laq_type\": \"\", \"laq_number\": \"7\", \
                   \"minister\": \"\", \"date\": \"\", \"qa_pairs\": [{\"question\": \"q\", \"answer\": \"a\"}]}";
        let result = ExtractionNormalizer::default().normalize(raw).unwrap();
        assert_eq!(result.title(), "t");
    }

    #[test]
    fn typographic_quotes_inside_strings_are_preserved() {
        let raw = "{\"pdf_title\": \"the \u{201C}jetty\u{201D} case\", \"laq_type\": \"\", \"laq_number\": \"7\", \
                   \"minister\": \"\", \"date\": \"\", \"qa_pairs\": [{\"question\": \"q\", \"answer\": \"a\"}],}";
        let result = ExtractionNormalizer::default().normalize(raw).unwrap();
        assert_eq!(result.title(), "the \u{201C}jetty\u{201D} case");
    }

    #[test]
    fn garbage_signals_parse_failure() {
        let (_, preview) = parse_failure("I'm sorry, I could not find any questions in this text.");
        assert!(preview.starts_with("I'm sorry"));
    }

    #[test]
    fn empty_response_signals_parse_failure() {
        let (reason, preview) = parse_failure("   ");
        assert_eq!(reason, "response is empty");
        assert!(preview.is_empty());
    }

    #[test]
    fn preview_is_truncated() {
        let garbage = "x".repeat(500);
        let err = ExtractionNormalizer::new(20).normalize(&garbage).unwrap_err();
        let LaqError::ExtractionParse { preview, .. } = err else { panic!("wrong kind") };
        assert_eq!(preview, format!("{}...", "x".repeat(20)));
    }

    #[test]
    fn parsed_but_invalid_is_a_schema_failure() {
        let raw = r#"Sure! {"pdf_title":"t","laq_type":"","laq_number":"7","minister":"","date":"","qa_pairs":[]}"#;
        let err = ExtractionNormalizer::default().normalize(raw).unwrap_err();
        assert!(matches!(err, LaqError::SchemaValidation { .. }));
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé...");
        assert_eq!(truncate_chars("héllo", 5), "héllo");
        assert_eq!(truncate_chars("", 3), "");
    }
}
