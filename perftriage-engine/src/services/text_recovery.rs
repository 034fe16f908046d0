//! Structured text recovery
//!
//! Extracts a JSON value from generator output that is not guaranteed to be
//! well-formed: fenced code blocks, prose around the object, and raw control
//! characters inside string literals are all tolerated.
//!
//! Attempts, first success wins:
//! 1. Strict parse of the whole (trimmed) text
//! 2. Strip one outer code fence and parse its body
//! 3. Take each top-level balanced `{...}` / `[...]` span (quote-aware) in
//!    turn and parse it
//!
//! Every parse is retried once with control characters inside strings
//! escaped. A result is either a complete value or a [`RecoveryError`];
//! nothing is guessed or partially filled.

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

/// Maximum number of characters of the input kept for diagnostics
pub const EXCERPT_CHARS: usize = 160;

const FENCE: &str = "```";

/// Every recovery strategy failed
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Failed to recover structured data: {reason} (input: {excerpt:?})")]
pub struct RecoveryError {
    /// Leading part of the raw input (at most [`EXCERPT_CHARS`] characters)
    pub excerpt: String,
    /// Last parser error or shape mismatch
    pub reason: String,
}

impl RecoveryError {
    fn new(raw: &str, reason: impl Into<String>) -> Self {
        Self {
            excerpt: excerpt(raw),
            reason: reason.into(),
        }
    }
}

/// Character-boundary-safe prefix of `raw`
pub fn excerpt(raw: &str) -> String {
    raw.chars().take(EXCERPT_CHARS).collect()
}

/// Recover a JSON value from free text
///
/// # Errors
/// `RecoveryError` when no strategy yields a valid value.
pub fn recover(raw: &str) -> Result<Value, RecoveryError> {
    let text = raw.trim();

    let mut error = match parse_with_repair(text) {
        Ok(value) => return Ok(value),
        Err(e) => e,
    };

    let unfenced = strip_fence(text);
    if unfenced != text {
        match parse_with_repair(unfenced) {
            Ok(value) => return Ok(value),
            Err(e) => error = e,
        }
    }

    for span in top_level_spans(unfenced) {
        if span == unfenced {
            continue;
        }
        match parse_with_repair(span) {
            Ok(value) => {
                tracing::debug!(
                    input_len = raw.len(),
                    "Recovered value by boundary extraction"
                );
                return Ok(value);
            }
            Err(e) => tracing::debug!(error = %e, "Boundary extraction did not parse"),
        }
    }

    tracing::debug!(error = %error, input_len = raw.len(), "Structured text recovery failed");
    Err(RecoveryError::new(raw, error.to_string()))
}

/// Recover and deserialize into `T`
///
/// # Errors
/// `RecoveryError` when recovery fails or the value does not have `T`'s shape.
pub fn recover_as<T: DeserializeOwned>(raw: &str) -> Result<T, RecoveryError> {
    let value = recover(raw)?;
    serde_json::from_value(value)
        .map_err(|e| RecoveryError::new(raw, format!("unexpected shape: {}", e)))
}

fn parse_with_repair(text: &str) -> Result<Value, serde_json::Error> {
    match serde_json::from_str(text) {
        Ok(value) => Ok(value),
        Err(strict_error) => {
            let repaired = escape_control_chars_in_strings(text);
            if repaired == text {
                return Err(strict_error);
            }
            serde_json::from_str(&repaired)
        }
    }
}

/// Remove one outer fenced code block, with or without a language tag
///
/// A fence only counts as outer when it opens outside any string literal
/// and outside any bracket; fences inside JSON string values are kept.
/// Text without an outer fence is returned trimmed.
pub fn strip_fence(raw: &str) -> &str {
    let text = raw.trim();
    let Some(open) = find_outer_fence(text) else {
        return text;
    };

    let after_open = &text[open + FENCE.len()..];
    // Language tag: word characters directly after the fence
    let tag_len = after_open
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '+'))
        .unwrap_or(after_open.len());
    let body = &after_open[tag_len..];

    let body = match body.rfind(FENCE) {
        Some(close) => &body[..close],
        None => body,
    };
    body.trim()
}

/// Byte offset of the first fence at string depth 0 and bracket depth 0
fn find_outer_fence(text: &str) -> Option<usize> {
    let mut scan = StructureScan::default();

    for (idx, c) in text.char_indices() {
        if !scan.in_string && scan.depth == 0 && text[idx..].starts_with(FENCE) {
            return Some(idx);
        }
        scan.step(c);
    }

    None
}

/// Quote-aware bracket tracking shared by the fence and span scanners
#[derive(Debug, Default)]
struct StructureScan {
    depth: usize,
    in_string: bool,
    escaped: bool,
}

impl StructureScan {
    /// Feed one character; returns true when it closed the outermost bracket
    fn step(&mut self, c: char) -> bool {
        if self.in_string {
            if self.escaped {
                self.escaped = false;
            } else if c == '\\' {
                self.escaped = true;
            } else if c == '"' {
                self.in_string = false;
            }
            return false;
        }

        match c {
            '"' => self.in_string = true,
            '{' | '[' => self.depth += 1,
            '}' | ']' if self.depth > 0 => {
                self.depth -= 1;
                return self.depth == 0;
            }
            _ => {}
        }
        false
    }
}

/// Balanced `{...}` / `[...]` spans that are not nested inside one another
///
/// Scanning stops at the first span that never closes: anything after its
/// opener belongs to it, so no inner element is ever returned on its own.
pub fn top_level_spans(text: &str) -> Vec<&str> {
    let mut spans = Vec::new();
    let mut scan = StructureScan::default();
    let mut start = None;

    for (idx, c) in text.char_indices() {
        if start.is_none() {
            if c != '{' && c != '[' {
                continue;
            }
            start = Some(idx);
        }
        if scan.step(c) {
            if let Some(begin) = start.take() {
                spans.push(&text[begin..idx + c.len_utf8()]);
            }
        }
    }

    spans
}

/// Escape raw control characters that appear inside string literals
///
/// Structural whitespace outside strings is left alone.
pub fn escape_control_chars_in_strings(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 16);
    let mut in_string = false;
    let mut escaped = false;

    for c in text.chars() {
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
                '"' => {
                    in_string = false;
                    out.push(c);
                }
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                '\t' => out.push_str("\\t"),
                c if c.is_control() && (c as u32) < 0x20 => {
                    out.push_str(&format!("\\u{:04x}", c as u32));
                }
                _ => out.push(c),
            }
        } else {
            if c == '"' {
                in_string = true;
            }
            out.push(c);
        }
    }

    out
}

/// First top-level balanced object or array, ignoring brackets inside strings
pub fn extract_balanced_object(text: &str) -> Option<&str> {
    top_level_spans(text).into_iter().next()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plain_json() {
        assert_eq!(recover(r#"{"a": 1}"#).unwrap(), json!({"a": 1}));
        assert_eq!(recover("[1, 2]").unwrap(), json!([1, 2]));
    }

    #[test]
    fn test_fence_with_and_without_language_tag() {
        let tagged = "```json\n{\"a\": true}\n```";
        let bare = "```\n{\"a\": true}\n```";
        assert_eq!(recover(tagged).unwrap(), json!({"a": true}));
        assert_eq!(recover(bare).unwrap(), json!({"a": true}));
    }

    #[test]
    fn test_fenced_literal_newline_is_repaired() {
        let raw = "```json\n{\"title\": \"Fix bug\", \"code\": \"line1\nline2\"}\n```";
        let value = recover(raw).unwrap();
        assert_eq!(value, json!({"title": "Fix bug", "code": "line1\nline2"}));
    }

    #[test]
    fn test_prose_around_object() {
        let raw = "Here is the fix you asked for:\n{\"title\": \"Add index\"}\nHope this helps!";
        assert_eq!(recover(raw).unwrap(), json!({"title": "Add index"}));
    }

    #[test]
    fn test_boundary_extraction_skips_trailing_braces() {
        let raw = "{\"title\": \"Use {braces} carefully\"} and then {not json}";
        assert_eq!(
            recover(raw).unwrap(),
            json!({"title": "Use {braces} carefully"})
        );
    }

    #[test]
    fn test_fence_inside_string_value_is_kept() {
        let original = json!({"title": "Fix", "improved_code": "```python\nx = 1\n```"});
        let raw = serde_json::to_string(&original).unwrap();
        assert_eq!(strip_fence(&raw), raw);
        assert_eq!(recover(&raw).unwrap(), original);

        let with_prose = format!("Suggestion follows: {}", raw);
        assert_eq!(recover(&with_prose).unwrap(), original);
    }

    #[test]
    fn test_outer_fence_around_inner_fence() {
        let raw = "Here you go:\n```json\n{\"code\": \"```sql\nSELECT 1;\n```\"}\n```";
        assert_eq!(recover(raw).unwrap(), json!({"code": "```sql\nSELECT 1;\n```"}));
    }

    #[test]
    fn test_top_level_arrays_are_not_split() {
        assert_eq!(
            recover(r#"[{"a":1},{"b":2}]"#).unwrap(),
            json!([{"a": 1}, {"b": 2}])
        );
        assert_eq!(recover(r#"["a{","b}"]"#).unwrap(), json!(["a{", "b}"]));
        assert_eq!(
            recover("Result: [{\"a\": 1}, {\"b\": 2}] as requested").unwrap(),
            json!([{"a": 1}, {"b": 2}])
        );
        // An unterminated array never yields one of its elements
        assert!(recover(r#"[{"a":1},{"b":2}"#).is_err());
    }

    #[test]
    fn test_spans_skip_prose_brackets() {
        let raw = "Use {braces} like this: {\"a\": 1}";
        assert_eq!(top_level_spans(raw), vec!["{braces}", "{\"a\": 1}"]);
        assert_eq!(recover(raw).unwrap(), json!({"a": 1}));
        assert_eq!(extract_balanced_object("x [1, [2]] y"), Some("[1, [2]]"));
    }

    #[test]
    fn test_structural_whitespace_untouched() {
        let raw = "{\n\t\"a\": \"x\ty\"\n}";
        let repaired = escape_control_chars_in_strings(raw);
        assert_eq!(repaired, "{\n\t\"a\": \"x\\ty\"\n}");
    }

    #[test]
    fn test_other_control_chars_escaped() {
        let raw = "{\"a\": \"bell\u{7}\"}";
        assert_eq!(recover(raw).unwrap(), json!({"a": "bell\u{7}"}));
    }

    #[test]
    fn test_escaped_quote_keeps_string_state() {
        let raw = "{\"a\": \"say \\\"hi\\\"\nthen\"}";
        assert_eq!(recover(raw).unwrap(), json!({"a": "say \"hi\"\nthen"}));
    }

    #[test]
    fn test_failure_carries_bounded_excerpt() {
        let raw = "ü".repeat(400);
        let err = recover(&raw).unwrap_err();
        assert_eq!(err.excerpt.chars().count(), EXCERPT_CHARS);
        assert!(!err.reason.is_empty());
    }

    #[test]
    fn test_truncated_object_fails() {
        assert!(recover("{\"title\": \"unterminated").is_err());
        assert!(recover("").is_err());
    }

    #[test]
    fn test_recover_as_checks_shape() {
        #[derive(Debug, serde::Deserialize)]
        struct Titled {
            title: String,
        }
        let ok: Titled = recover_as("{\"title\": \"x\"}").unwrap();
        assert_eq!(ok.title, "x");
        let err = recover_as::<Titled>("{\"name\": \"x\"}").unwrap_err();
        assert!(err.reason.contains("unexpected shape"));
    }
}
