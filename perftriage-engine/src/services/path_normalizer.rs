//! Endpoint path normalization
//!
//! Brings measured endpoint ids (`GET /api/users/123`) and routes declared in
//! source (`/api/users/{id}`, `/api/users/:id`, `/api/users/<int:id>`) onto a
//! common segment form so they can be compared token by token.

/// Placeholder every parameter segment collapses to
pub const PARAM_PLACEHOLDER: &str = "*";

const HTTP_METHODS: [&str; 9] = [
    "GET", "POST", "PUT", "PATCH", "DELETE", "HEAD", "OPTIONS", "TRACE", "CONNECT",
];

/// A path reduced to comparable segments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedPath {
    pub segments: Vec<String>,
}

impl NormalizedPath {
    /// `/`-joined form, always starting with `/`
    pub fn as_route(&self) -> String {
        format!("/{}", self.segments.join("/"))
    }
}

/// Split an optional leading HTTP method token off an endpoint id
///
/// `"GET /users"` → `(Some("GET"), "/users")`; `"/users"` → `(None, "/users")`.
pub fn split_method(raw: &str) -> (Option<String>, &str) {
    let trimmed = raw.trim();
    if let Some((head, rest)) = trimmed.split_once(char::is_whitespace) {
        let upper = head.to_ascii_uppercase();
        if HTTP_METHODS.contains(&upper.as_str()) {
            return (Some(upper), rest.trim_start());
        }
    }
    (None, trimmed)
}

/// True when a method string carries no usable information
pub fn is_unknown_method(method: &str) -> bool {
    let method = method.trim();
    method.is_empty()
        || method.eq_ignore_ascii_case("unknown")
        || method.eq_ignore_ascii_case("any")
        || method == "*"
}

/// Normalize a path (without method) into segments
///
/// Drops scheme/host and query/fragment, lowercases, strips the trailing
/// slash and collapses parameter segments to [`PARAM_PLACEHOLDER`].
pub fn normalize_path(path: &str) -> NormalizedPath {
    let mut path = path.trim();

    if let Some(idx) = path.find("://") {
        let after_scheme = &path[idx + 3..];
        path = after_scheme
            .find('/')
            .map(|slash| &after_scheme[slash..])
            .unwrap_or("");
    }

    if let Some(idx) = path.find(['?', '#']) {
        path = &path[..idx];
    }

    let lowered = path.to_lowercase();
    let segments = lowered
        .trim_end_matches('/')
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|s| {
            if is_parameter_segment(s) {
                PARAM_PLACEHOLDER.to_string()
            } else {
                s.to_string()
            }
        })
        .collect();

    NormalizedPath { segments }
}

/// Parse an endpoint id into (method, normalized path)
pub fn normalize_endpoint(raw: &str) -> (Option<String>, NormalizedPath) {
    let (method, path) = split_method(raw);
    (method, normalize_path(path))
}

fn is_parameter_segment(segment: &str) -> bool {
    (segment.starts_with('{') && segment.ends_with('}'))
        || (segment.starts_with('<') && segment.ends_with('>'))
        || (segment.starts_with(':') && segment.len() > 1)
        || segment == PARAM_PLACEHOLDER
        || segment.chars().all(|c| c.is_ascii_digit())
        || is_guid(segment)
}

fn is_guid(segment: &str) -> bool {
    const GROUPS: [usize; 5] = [8, 4, 4, 4, 12];
    let parts: Vec<&str> = segment.split('-').collect();
    parts.len() == GROUPS.len()
        && parts
            .iter()
            .zip(GROUPS)
            .all(|(part, len)| part.len() == len && part.chars().all(|c| c.is_ascii_hexdigit()))
}

/// Jaccard similarity over the segment sets (both empty → 1.0)
pub fn jaccard(a: &NormalizedPath, b: &NormalizedPath) -> f64 {
    use std::collections::HashSet;

    let left: HashSet<&str> = a.segments.iter().map(String::as_str).collect();
    let right: HashSet<&str> = b.segments.iter().map(String::as_str).collect();

    if left.is_empty() && right.is_empty() {
        return 1.0;
    }

    let intersection = left.intersection(&right).count();
    let union = left.union(&right).count();
    intersection as f64 / union as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segs(path: &str) -> Vec<String> {
        normalize_path(path).segments
    }

    #[test]
    fn test_parameter_styles_collapse() {
        let expected = vec!["api".to_string(), "users".to_string(), "*".to_string()];
        assert_eq!(segs("/api/users/{id}"), expected);
        assert_eq!(segs("/api/users/:id"), expected);
        assert_eq!(segs("/api/users/<int:id>"), expected);
        assert_eq!(segs("/api/users/123"), expected);
        assert_eq!(segs("/api/users/3f2504e0-4f89-11d3-9a0c-0305e82c3301"), expected);
    }

    #[test]
    fn test_case_and_trailing_slash() {
        assert_eq!(segs("/API/Orders/"), vec!["api", "orders"]);
        assert_eq!(segs("/"), Vec::<String>::new());
        assert_eq!(segs(""), Vec::<String>::new());
    }

    #[test]
    fn test_host_and_query_dropped() {
        assert_eq!(segs("https://api.example.com/v1/items?page=2#top"), vec!["v1", "items"]);
        assert_eq!(segs("http://localhost:8080"), Vec::<String>::new());
    }

    #[test]
    fn test_split_method() {
        assert_eq!(split_method("GET /api/users/123"), (Some("GET".to_string()), "/api/users/123"));
        assert_eq!(split_method("post  /orders"), (Some("POST".to_string()), "/orders"));
        assert_eq!(split_method("/health"), (None, "/health"));
        assert_eq!(split_method("Checkout flow"), (None, "Checkout flow"));
    }

    #[test]
    fn test_unknown_methods() {
        assert!(is_unknown_method(""));
        assert!(is_unknown_method("UNKNOWN"));
        assert!(is_unknown_method("any"));
        assert!(!is_unknown_method("GET"));
    }

    #[test]
    fn test_jaccard() {
        let a = normalize_path("/api/users/{id}");
        let b = normalize_path("/api/users");
        assert!((jaccard(&a, &b) - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(jaccard(&a, &a), 1.0);
        assert_eq!(jaccard(&normalize_path("/"), &normalize_path("")), 1.0);
        assert_eq!(jaccard(&normalize_path("/a"), &normalize_path("")), 0.0);
    }
}
