//! Content-type validation for API writes.

use axum::http::Method;

/// Methods whose bodies are checked: create and update.
pub fn carries_checked_body(method: &Method) -> bool {
    matches!(*method, Method::POST | Method::PUT)
}

/// The media type without parameters, trimmed and lowercased.
/// `None` when nothing is left.
pub fn essence(content_type: &str) -> Option<String> {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_lowercase();
    (!essence.is_empty()).then_some(essence)
}

#[derive(Debug, Clone)]
pub struct ContentTypePolicy {
    allowed: Vec<String>,
}

impl ContentTypePolicy {
    pub fn new(allowed: &[String]) -> Self {
        Self {
            allowed: allowed.iter().map(|t| t.trim().to_lowercase()).collect(),
        }
    }

    /// A missing or empty content-type is never allowed.
    pub fn is_allowed(&self, content_type: Option<&str>) -> bool {
        content_type
            .and_then(essence)
            .is_some_and(|essence| self.allowed.iter().any(|t| *t == essence))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FilterConfig;

    fn policy() -> ContentTypePolicy {
        ContentTypePolicy::new(&FilterConfig::default().allowed_content_types)
    }

    #[test]
    fn test_essence() {
        assert_eq!(
            essence("Application/JSON; charset=utf-8").as_deref(),
            Some("application/json")
        );
        assert_eq!(essence("  ; charset=utf-8"), None);
        assert_eq!(essence(""), None);
    }

    #[test]
    fn test_allowed_types() {
        let policy = policy();
        assert!(policy.is_allowed(Some("application/json")));
        assert!(policy.is_allowed(Some("application/json; charset=utf-8")));
        assert!(policy.is_allowed(Some("multipart/form-data; boundary=xyz")));
        assert!(policy.is_allowed(Some("APPLICATION/X-WWW-FORM-URLENCODED")));
    }

    #[test]
    fn test_rejected_types() {
        let policy = policy();
        assert!(!policy.is_allowed(None));
        assert!(!policy.is_allowed(Some("")));
        assert!(!policy.is_allowed(Some("application/xml")));
        assert!(!policy.is_allowed(Some("text/plain")));
        assert!(!policy.is_allowed(Some("application/jsonp")));
    }

    #[test]
    fn test_checked_methods() {
        assert!(carries_checked_body(&Method::POST));
        assert!(carries_checked_body(&Method::PUT));
        assert!(!carries_checked_body(&Method::PATCH));
        assert!(!carries_checked_body(&Method::DELETE));
        assert!(!carries_checked_body(&Method::GET));
    }
}
