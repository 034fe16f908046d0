//! Integration tests for structured text recovery

use perftriage_common::Suggestion;
use perftriage_engine::services::text_recovery::{recover, recover_as, EXCERPT_CHARS};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{json, Map, Value};

const ALPHABET: &[char] = &[
    'a', 'b', 'c', 'x', 'y', 'z', ' ', '\n', '\n', '\t', '{', '}', '"', ':', ',', '[', ']', 'é',
    '0', '7', '`', '`', '`',
];

fn random_string(rng: &mut StdRng) -> String {
    let len = rng.gen_range(0..24);
    (0..len)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())])
        .collect()
}

fn random_value(rng: &mut StdRng, depth: u32) -> Value {
    match rng.gen_range(0..if depth == 0 { 4 } else { 6 }) {
        0 => Value::String(random_string(rng)),
        1 => json!(rng.gen_range(-1000..1000)),
        2 => Value::Bool(rng.gen_bool(0.5)),
        3 => Value::Null,
        4 => Value::Array((0..rng.gen_range(0..4)).map(|_| random_value(rng, depth - 1)).collect()),
        _ => {
            let mut map = Map::new();
            for _ in 0..rng.gen_range(0..4) {
                map.insert(random_string(rng), random_value(rng, depth - 1));
            }
            Value::Object(map)
        }
    }
}

/// Serialize with raw newlines and tabs left inside string literals
fn serialize_unescaped(value: &Value) -> String {
    serde_json::to_string(value)
        .unwrap()
        .replace("\\n", "\n")
        .replace("\\t", "\t")
}

#[test]
fn test_fenced_block_with_literal_newline() {
    let raw = "Sure! Here is the suggestion:\n```json\n{\"title\": \"Fix bug\", \"code\": \"line1\nline2\"}\n```\nLet me know.";
    let value = recover(raw).unwrap();
    assert_eq!(value, json!({"title": "Fix bug", "code": "line1\nline2"}));
}

#[test]
fn test_unescaped_newlines_recover_to_original_value() {
    let mut rng = StdRng::seed_from_u64(0xC0FFEE);

    for round in 0..300 {
        let original = match round % 3 {
            0 => {
                let mut root = Map::new();
                for _ in 0..rng.gen_range(1..5) {
                    root.insert(random_string(&mut rng), random_value(&mut rng, 2));
                }
                Value::Object(root)
            }
            1 => Value::Array((0..rng.gen_range(0..5)).map(|_| random_value(&mut rng, 2)).collect()),
            // Scalars and nested containers at the root
            _ => random_value(&mut rng, 2),
        };

        // No backslashes in the alphabet, so only the escapes we undo are affected
        let raw = serialize_unescaped(&original);
        let recovered = recover(&raw).unwrap_or_else(|e| panic!("round {}: {}\n{}", round, e, raw));
        assert_eq!(recovered, original, "round {}", round);

        let fenced = format!("```json\n{}\n```", raw);
        assert_eq!(recover(&fenced).unwrap(), original, "round {} (fenced)", round);
    }
}

#[test]
fn test_valid_json_with_fenced_code_in_values() {
    let original = json!({
        "title": "Fix",
        "improved_code": "```python\nx = 1\n```"
    });
    let raw = serde_json::to_string(&original).unwrap();
    assert_eq!(recover(&raw).unwrap(), original);

    let suggestion: Suggestion = recover_as(&raw).unwrap();
    assert_eq!(suggestion.improved_code, "```python\nx = 1\n```");
}

#[test]
fn test_top_level_arrays_recover_whole() {
    assert_eq!(
        recover(r#"[{"a":1},{"b":2}]"#).unwrap(),
        json!([{"a": 1}, {"b": 2}])
    );
    assert_eq!(recover(r#"["a{","b}"]"#).unwrap(), json!(["a{", "b}"]));
}

#[test]
fn test_generator_style_output_to_suggestion() {
    let raw = r#"Based on the metrics, here is my recommendation.

```json
{
  "title": "Batch order lookups",
  "issue": "N+1 query in list_orders",
  "explanation": "Each order loads its user separately",
  "current_code": "for o in orders:
    o.user = db.get(User, o.user_id)",
  "improved_code": "users = db.query(User).filter(User.id.in_(ids)).all()",
  "expected_improvement": "~80% lower p95",
  "summary": "Load users in one query"
}
```"#;

    let suggestion: Suggestion = recover_as(raw).unwrap();
    assert_eq!(suggestion.title, "Batch order lookups");
    assert_eq!(
        suggestion.current_code,
        "for o in orders:\n    o.user = db.get(User, o.user_id)"
    );
    assert_eq!(suggestion.summary, "Load users in one query");
}

#[test]
fn test_missing_optional_fields_default_to_empty() {
    let suggestion: Suggestion =
        recover_as(r#"{"title": "Add index", "improved_code": "CREATE INDEX idx ON t(c);"}"#).unwrap();
    assert_eq!(suggestion.issue, "");
    assert_eq!(suggestion.expected_improvement, "");
}

#[test]
fn test_missing_required_field_fails() {
    let err = recover_as::<Suggestion>(r#"{"title": "Add index"}"#).unwrap_err();
    assert!(err.reason.contains("improved_code"));
}

#[test]
fn test_never_returns_partial_values() {
    for raw in [
        "{\"title\": \"cut off",
        "{\"a\": 1,}",
        "no structure here",
        "```json\n```",
        "{\"a\": {\"b\": 1}",
        "[{\"a\": 1}, {\"b\": 2}",
    ] {
        let err = recover(raw).unwrap_err();
        assert!(err.excerpt.chars().count() <= EXCERPT_CHARS);
        assert_eq!(err.excerpt, raw.chars().take(EXCERPT_CHARS).collect::<String>());
    }
}
