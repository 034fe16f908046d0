//! Suggestion post-processing
//!
//! Cleans recovered suggestions and drops the ones that would not change
//! anything: import lines are removed from both code blocks, and a suggestion
//! whose improved code is near-identical to the current code (ignoring
//! comments, blank lines, imports and case) is rejected.

use perftriage_common::Suggestion;
use std::fmt;

/// Normalized similarity above which a change counts as trivial
pub const TRIVIAL_SIMILARITY: f64 = 0.95;

/// Why a suggestion was dropped
#[derive(Debug, Clone, PartialEq)]
pub enum RejectReason {
    /// Current or improved code empty once imports are removed
    MissingCode,
    /// Only comments, whitespace or imports differ
    NoSubstantiveCode,
    /// Improved code is too close to the current code
    TrivialChange { similarity: f64 },
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::MissingCode => write!(f, "missing current or improved code"),
            RejectReason::NoSubstantiveCode => write!(f, "no code left after normalization"),
            RejectReason::TrivialChange { similarity } => {
                write!(f, "trivial change ({:.1}% similar)", similarity * 100.0)
            }
        }
    }
}

/// Outcome of [`filter_suggestion`]
#[derive(Debug, Clone, PartialEq)]
pub enum FilterVerdict {
    Accepted(Suggestion),
    Rejected(RejectReason),
}

/// Clean a suggestion and decide whether it is worth keeping
pub fn filter_suggestion(mut suggestion: Suggestion) -> FilterVerdict {
    suggestion.current_code = strip_imports(&suggestion.current_code);
    suggestion.improved_code = strip_imports(&suggestion.improved_code);

    if suggestion.current_code.is_empty() || suggestion.improved_code.is_empty() {
        tracing::debug!(title = %suggestion.title, "Rejected suggestion without code");
        return FilterVerdict::Rejected(RejectReason::MissingCode);
    }

    let current = normalize_code(&suggestion.current_code);
    let improved = normalize_code(&suggestion.improved_code);
    if current.is_empty() || improved.is_empty() {
        return FilterVerdict::Rejected(RejectReason::NoSubstantiveCode);
    }

    let similarity = strsim::normalized_levenshtein(&current, &improved);
    if similarity > TRIVIAL_SIMILARITY {
        tracing::debug!(
            title = %suggestion.title,
            similarity,
            "Rejected trivial suggestion"
        );
        return FilterVerdict::Rejected(RejectReason::TrivialChange { similarity });
    }

    FilterVerdict::Accepted(suggestion)
}

/// True for `import x`, `import x from 'y'` and `from x import y` lines
pub fn is_import_line(line: &str) -> bool {
    let stripped = line.trim();
    stripped.starts_with("import ") || (stripped.starts_with("from ") && stripped.contains(" import "))
}

/// Remove import statements outside triple-quoted strings
///
/// Runs of blank lines collapse to one; the result is trimmed.
pub fn strip_imports(code: &str) -> String {
    if code.trim().is_empty() {
        return String::new();
    }

    let mut kept: Vec<&str> = Vec::new();
    let mut in_multiline_string = false;

    for line in code.lines() {
        let toggles = line.matches("\"\"\"").count() % 2 == 1 || line.matches("'''").count() % 2 == 1;
        let was_in_string = in_multiline_string;
        if toggles {
            in_multiline_string = !in_multiline_string;
        }

        if was_in_string || in_multiline_string || !is_import_line(line) {
            kept.push(line);
        }
    }

    let mut out: Vec<&str> = Vec::with_capacity(kept.len());
    for line in kept {
        let blank = line.trim().is_empty();
        if blank && out.last().is_some_and(|prev| prev.trim().is_empty()) {
            continue;
        }
        out.push(line);
    }

    out.join("\n").trim().to_string()
}

/// Comparison form: comments, imports and blank lines removed, trimmed, lowercased
pub fn normalize_code(code: &str) -> String {
    code.lines()
        .filter(|line| !is_import_line(line))
        .map(|line| strip_line_comment(line).trim())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
        .to_lowercase()
}

/// Drop a trailing `#` or `//` comment that is not inside a quoted string
fn strip_line_comment(line: &str) -> &str {
    let mut quote: Option<char> = None;
    let mut prev: Option<char> = None;

    for (idx, c) in line.char_indices() {
        match quote {
            Some(q) => {
                if c == q && prev != Some('\\') {
                    quote = None;
                }
            }
            None => {
                if c == '"' || c == '\'' || c == '`' {
                    quote = Some(c);
                } else if c == '#' {
                    return &line[..idx];
                } else if c == '/' && prev == Some('/') {
                    return &line[..idx - 1];
                }
            }
        }
        prev = Some(c);
    }

    line
}

#[cfg(test)]
mod tests {
    use super::*;

    fn suggestion(current: &str, improved: &str) -> Suggestion {
        Suggestion {
            title: "Cache user lookups".to_string(),
            issue: String::new(),
            explanation: String::new(),
            current_code: current.to_string(),
            improved_code: improved.to_string(),
            expected_improvement: String::new(),
            summary: String::new(),
        }
    }

    #[test]
    fn test_strip_imports_keeps_docstrings() {
        let code = "import os\nfrom typing import List\n\n\n\ndef f():\n    \"\"\"\n    import inside docstring\n    \"\"\"\n    return 1";
        let stripped = strip_imports(code);
        assert!(!stripped.contains("import os"));
        assert!(!stripped.contains("from typing"));
        assert!(stripped.contains("import inside docstring"));
        assert!(stripped.starts_with("def f():"));
    }

    #[test]
    fn test_strip_imports_collapses_blank_runs() {
        let stripped = strip_imports("a = 1\n\n\n\nb = 2");
        assert_eq!(stripped, "a = 1\n\nb = 2");
    }

    #[test]
    fn test_normalize_code_drops_comments() {
        let code = "x = 1  # counter\n// note\ny = \"#not a comment\"\n\nZ = 3";
        assert_eq!(normalize_code(code), "x = 1\ny = \"#not a comment\"\nz = 3");
    }

    #[test]
    fn test_rejects_missing_code() {
        let verdict = filter_suggestion(suggestion("", "return cache.get(id)"));
        assert_eq!(verdict, FilterVerdict::Rejected(RejectReason::MissingCode));

        let verdict = filter_suggestion(suggestion("return db.get(id)", "import functools"));
        assert_eq!(verdict, FilterVerdict::Rejected(RejectReason::MissingCode));
    }

    #[test]
    fn test_rejects_comment_only_change() {
        let current = "def get_user(id):\n    return db.query(User).filter(User.id == id).first()";
        let improved = "def get_user(id):\n    # fetch user\n    return db.query(User).filter(User.id == id).first()";
        match filter_suggestion(suggestion(current, improved)) {
            FilterVerdict::Rejected(RejectReason::TrivialChange { similarity }) => {
                assert_eq!(similarity, 1.0)
            }
            other => panic!("expected trivial rejection, got {:?}", other),
        }
    }

    #[test]
    fn test_accepts_real_change_and_strips_imports() {
        let current = "def get_user(id):\n    return db.query(User).get(id)";
        let improved = "from functools import lru_cache\n\n@lru_cache(maxsize=1024)\ndef get_user(id):\n    return redis_cache.fetch_or_load(id, loader=lambda: db.query(User).get(id))";
        match filter_suggestion(suggestion(current, improved)) {
            FilterVerdict::Accepted(s) => {
                assert!(s.improved_code.starts_with("@lru_cache"));
                assert!(!s.improved_code.contains("import"));
            }
            other => panic!("expected acceptance, got {:?}", other),
        }
    }
}
