//! Origin validation for state-changing requests.

use axum::http::Method;

/// Origins of the association's own sites and local development servers.
pub const DEFAULT_ALLOWED_ORIGINS: [&str; 4] = [
    "https://cades.org.br",
    "https://www.cades.org.br",
    "http://localhost:3000",
    "http://localhost:3001",
];

/// Methods with create/update/delete semantics.
pub fn is_mutating(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}

/// Allow-list of exact origins and `*` wildcard patterns.
#[derive(Debug, Clone)]
pub struct OriginPolicy {
    allowed: Vec<String>,
}

impl OriginPolicy {
    /// The built-in origins followed by `extra`.
    pub fn new(extra: &[String]) -> Self {
        let allowed = DEFAULT_ALLOWED_ORIGINS
            .iter()
            .map(|o| o.to_string())
            .chain(extra.iter().map(|o| o.trim().to_string()))
            .collect();
        Self { allowed }
    }

    /// An absent or blank origin is allowed: same-origin requests may omit it.
    pub fn is_allowed(&self, origin: Option<&str>) -> bool {
        match origin.map(str::trim).filter(|o| !o.is_empty()) {
            None => true,
            Some(origin) => self
                .allowed
                .iter()
                .any(|pattern| wildcard_match(pattern, origin)),
        }
    }
}

/// Whole-string match where each `*` in `pattern` matches any sequence.
/// A pattern without `*` is an exact comparison.
pub fn wildcard_match(pattern: &str, candidate: &str) -> bool {
    let mut segments = pattern.split('*');
    let head = segments.next().unwrap_or_default();
    let Some(mut rest) = candidate.strip_prefix(head) else {
        return false;
    };

    let tail: Vec<&str> = segments.collect();
    let Some((last, middle)) = tail.split_last() else {
        return rest.is_empty();
    };

    for segment in middle {
        match rest.find(segment) {
            Some(idx) => rest = &rest[idx + segment.len()..],
            None => return false,
        }
    }

    rest.ends_with(last)
}
