//! JSON extraction from free-form provider text.
//!
//! Reasoning providers are asked for a single JSON object but routinely wrap
//! it in prose or markdown code fences. This is the only place that digs the
//! object back out.

use crate::error::OverlayError;
use serde_json::Value;

/// Locate, isolate, and parse the JSON object in a provider response.
pub fn extract_json_object(text: &str) -> Result<Value, OverlayError> {
    let cleaned = strip_code_fences(text);
    let span = outermost_object_span(&cleaned).ok_or_else(|| {
        OverlayError::ParseError(format!(
            "no JSON object found in provider response ({} chars)",
            text.chars().count()
        ))
    })?;

    let value: Value = serde_json::from_str(span)
        .map_err(|e| OverlayError::ParseError(format!("invalid JSON object: {}", e)))?;

    if !value.is_object() {
        return Err(OverlayError::ParseError(
            "provider response JSON is not an object".to_string(),
        ));
    }
    Ok(value)
}

/// Remove markdown fence tokens (```json ... ```) wherever they appear,
/// keeping any content that shares a line with them.
fn strip_code_fences(raw: &str) -> String {
    raw.lines()
        .map(strip_fence_tokens)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Opening marker plus its language tag, and a trailing closing marker.
fn strip_fence_tokens(line: &str) -> &str {
    let mut rest = line.trim();
    if let Some(after) = rest.strip_prefix("```") {
        let tag_len = after
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '-'))
            .unwrap_or(after.len());
        rest = after[tag_len..].trim_start();
    }
    if let Some(before) = rest.strip_suffix("```") {
        rest = before.trim_end();
    }
    rest
}

/// Byte span of the first balanced top-level `{...}` block.
///
/// Braces inside JSON strings (including escaped quotes) do not count toward
/// nesting. Falls back to the first `{` through the last `}` when no balanced
/// block exists, so that serde reports the real syntax error.
fn outermost_object_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }

    let end = text.rfind('}')?;
    if end > start {
        Some(&text[start..=end])
    } else {
        None
    }
}
