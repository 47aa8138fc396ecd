//! Validation of candidate extraction structures.
//!
//! [`validate_extraction`] is the only way to obtain an [`ExtractionResult`].
//! Every rule is checked independently and all violations are reported
//! together, so a caller can show the user everything the model got wrong
//! in one go.

use serde_json::{Map, Value};

use crate::error::{FieldViolation, LaqError, Result};
use crate::record::{ExtractionResult, QaPair};

/// JSON keys of the extraction contract shared with the extraction prompt.
pub mod fields {
    pub const TITLE: &str = "pdf_title";
    pub const RECORD_TYPE: &str = "laq_type";
    pub const RECORD_NUMBER: &str = "laq_number";
    pub const ISSUER: &str = "minister";
    pub const DATE: &str = "date";
    pub const QA_PAIRS: &str = "qa_pairs";
    pub const SUBMITTED_BY: &str = "tabled_by";
    pub const ATTACHMENTS: &str = "attachments";
}

/// Validate a parsed candidate and build an [`ExtractionResult`] from it.
///
/// # Errors
///
/// Returns [`LaqError::SchemaValidation`] carrying every violation found.
pub fn validate_extraction(candidate: &Value) -> Result<ExtractionResult> {
    let Some(obj) = candidate.as_object() else {
        return Err(LaqError::SchemaValidation {
            violations: vec![FieldViolation::new(
                "$",
                format!("expected a JSON object, found {}", kind_of(candidate)),
            )],
        });
    };

    let mut violations = Vec::new();

    let qa_pairs = validate_pairs(obj, &mut violations);
    let title = required_text(obj, fields::TITLE, &mut violations);
    let record_type = required_text(obj, fields::RECORD_TYPE, &mut violations);
    let record_number = required_text(obj, fields::RECORD_NUMBER, &mut violations);
    let issuer = required_text(obj, fields::ISSUER, &mut violations);
    let date = required_text(obj, fields::DATE, &mut violations);
    let attachments = validate_attachments(obj, &mut violations);
    let submitted_by = validate_submitted_by(obj, &mut violations);

    if !violations.is_empty() {
        return Err(LaqError::SchemaValidation { violations });
    }

    Ok(ExtractionResult {
        title,
        record_type,
        record_number,
        issuer,
        date,
        qa_pairs,
        submitted_by,
        attachments,
    })
}

fn validate_pairs(obj: &Map<String, Value>, violations: &mut Vec<FieldViolation>) -> Vec<QaPair> {
    let items = match obj.get(fields::QA_PAIRS) {
        None => {
            violations.push(FieldViolation::new(fields::QA_PAIRS, "is required"));
            return Vec::new();
        }
        Some(Value::Array(items)) => items,
        Some(other) => {
            violations.push(FieldViolation::new(
                fields::QA_PAIRS,
                format!("expected an array, found {}", kind_of(other)),
            ));
            return Vec::new();
        }
    };

    if items.is_empty() {
        violations.push(FieldViolation::new(fields::QA_PAIRS, "must contain at least one pair"));
        return Vec::new();
    }

    let mut pairs = Vec::with_capacity(items.len());
    for (idx, item) in items.iter().enumerate() {
        let path = format!("{}[{idx}]", fields::QA_PAIRS);
        let Some(pair) = item.as_object() else {
            violations.push(FieldViolation::new(
                path,
                format!("expected an object, found {}", kind_of(item)),
            ));
            continue;
        };
        let question = non_blank(pair, "question", &path, violations);
        let answer = non_blank(pair, "answer", &path, violations);
        if let (Some(question), Some(answer)) = (question, answer) {
            pairs.push(QaPair { question, answer });
        }
    }
    pairs
}

fn non_blank(
    pair: &Map<String, Value>,
    key: &str,
    path: &str,
    violations: &mut Vec<FieldViolation>,
) -> Option<String> {
    let field = format!("{path}.{key}");
    match pair.get(key).and_then(scalar_text) {
        Some(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
        Some(_) => {
            violations.push(FieldViolation::new(field, "must not be empty"));
            None
        }
        None => {
            violations.push(FieldViolation::new(field, "is required text"));
            None
        }
    }
}

fn required_text(
    obj: &Map<String, Value>,
    key: &str,
    violations: &mut Vec<FieldViolation>,
) -> String {
    match obj.get(key) {
        None => {
            violations.push(FieldViolation::new(key, "is required"));
            String::new()
        }
        Some(value) => match scalar_text(value) {
            Some(text) => text.trim().to_string(),
            None => {
                violations.push(FieldViolation::new(
                    key,
                    format!("expected text, found {}", kind_of(value)),
                ));
                String::new()
            }
        },
    }
}

fn validate_attachments(
    obj: &Map<String, Value>,
    violations: &mut Vec<FieldViolation>,
) -> Vec<String> {
    let items = match obj.get(fields::ATTACHMENTS) {
        None | Some(Value::Null) => return Vec::new(),
        Some(Value::Array(items)) => items,
        Some(other) => {
            violations.push(FieldViolation::new(
                fields::ATTACHMENTS,
                format!("expected an array, found {}", kind_of(other)),
            ));
            return Vec::new();
        }
    };

    let mut attachments: Vec<String> = Vec::with_capacity(items.len());
    for (idx, item) in items.iter().enumerate() {
        match item.as_str() {
            Some(text) => {
                let text = text.trim();
                if !text.is_empty() && !attachments.iter().any(|a| a == text) {
                    attachments.push(text.to_string());
                }
            }
            None => violations.push(FieldViolation::new(
                format!("{}[{idx}]", fields::ATTACHMENTS),
                format!("expected text, found {}", kind_of(item)),
            )),
        }
    }
    attachments
}

fn validate_submitted_by(
    obj: &Map<String, Value>,
    violations: &mut Vec<FieldViolation>,
) -> Option<String> {
    match obj.get(fields::SUBMITTED_BY) {
        None | Some(Value::Null) => None,
        Some(Value::String(text)) => {
            let text = text.trim();
            (!text.is_empty()).then(|| text.to_string())
        }
        Some(other) => {
            violations.push(FieldViolation::new(
                fields::SUBMITTED_BY,
                format!("expected text, found {}", kind_of(other)),
            ));
            None
        }
    }
}

/// Text rendering of scalar values. Models often emit numbers where text is
/// expected (`"laq_number": 10`), so numbers and booleans are accepted.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
