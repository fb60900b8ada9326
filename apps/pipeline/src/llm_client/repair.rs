//! Layered defensive parsing for LLM output.
//!
//! Strict decode is attempted first, then a fixed set of named repair
//! transforms, then balanced-object extraction with key-based scoring.
//! Each transform is a standalone function so it can be tested on its own.

use serde_json::Value;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum RepairError {
    #[error("response appears truncated ({opens} opening braces, {closes} closing)")]
    Truncated { opens: usize, closes: usize },

    #[error("no parseable JSON object in response")]
    Unparseable,
}

/// Parses LLM output into JSON, repairing the common failure shapes:
/// code fences around the payload, LaTeX-style `\&` escapes, double-escaped
/// characters, and prose wrapped around one or more JSON objects.
///
/// When several complete objects are found, the one carrying the most of
/// `required_keys` wins.
pub fn coerce_json(raw: &str, required_keys: &[&str]) -> Result<Value, RepairError> {
    let stripped = strip_code_fences(raw);
    if let Ok(value) = serde_json::from_str(stripped) {
        return Ok(value);
    }

    let repaired = fix_double_escapes(&fix_escaped_ampersands(stripped));
    if let Ok(value) = serde_json::from_str(&repaired) {
        return Ok(value);
    }

    let candidates: Vec<Value> = extract_balanced_objects(&repaired)
        .into_iter()
        .filter_map(|s| serde_json::from_str(s).ok())
        .collect();

    if !candidates.is_empty() {
        if candidates.len() > 1 {
            warn!(
                "LLM returned {} JSON objects; selecting the most complete one",
                candidates.len()
            );
        }
        let best = candidates
            .into_iter()
            .max_by_key(|v| score_object(v, required_keys))
            .ok_or(RepairError::Unparseable)?;
        return Ok(best);
    }

    let opens = repaired.matches('{').count();
    let closes = repaired.matches('}').count();
    if opens > closes {
        Err(RepairError::Truncated { opens, closes })
    } else {
        Err(RepairError::Unparseable)
    }
}

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output.
pub fn strip_code_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or_else(|| stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or_else(|| stripped.trim_start())
    } else {
        text
    }
}

/// Replaces LaTeX-style `\&` with a plain `&`.
/// `\&` is not a valid JSON escape, so a model that escapes ampersands the
/// LaTeX way produces an unparseable document.
pub fn fix_escaped_ampersands(text: &str) -> String {
    text.replace("\\&", "&")
}

/// Collapses `\\c` to `\c` where `c` is neither a quote nor a backslash.
/// Models that double-escape LaTeX commands inside JSON strings produce
/// sequences like `\\textbf` where `\textbf` was meant.
pub fn fix_double_escapes(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '\\'
            && i + 2 < chars.len()
            && chars[i + 1] == '\\'
            && chars[i + 2] != '"'
            && chars[i + 2] != '\\'
        {
            out.push('\\');
            out.push(chars[i + 2]);
            i += 3;
        } else {
            out.push(chars[i]);
            i += 1;
        }
    }
    out
}

/// Scans for complete top-level `{...}` spans, tracking string literals and
/// escapes so braces inside strings do not count.
pub fn extract_balanced_objects(text: &str) -> Vec<&str> {
    let mut objects = Vec::new();
    let mut depth = 0usize;
    let mut start = None;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, ch) in text.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match ch {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            '}' if !in_string => {
                if depth > 0 {
                    depth -= 1;
                    if depth == 0 {
                        if let Some(s) = start.take() {
                            objects.push(&text[s..=i]);
                        }
                    }
                }
            }
            _ => {}
        }
    }
    objects
}

/// Scores a candidate object by how many of the required keys it carries
/// with non-empty values. Object-valued keys earn extra credit per
/// populated member, so a fully filled sectioned map beats a stub.
fn score_object(value: &Value, required_keys: &[&str]) -> usize {
    let Some(map) = value.as_object() else {
        return 0;
    };
    let mut score = 0;
    for key in required_keys {
        match map.get(*key) {
            Some(v) if !is_empty_value(v) => {
                score += 1;
                if let Some(inner) = v.as_object() {
                    score += inner.values().filter(|v| !is_empty_value(v)).count();
                }
            }
            _ => {}
        }
    }
    score
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}
