//! The edge request filter.
//!
//! # Responsibilities
//! - Identify the client and classify the route
//! - Run the gates in order: rate limit, origin, user-agent, content-type
//! - Decorate admitted responses with security headers
//!
//! # Design Decisions
//! - The four rejections fail closed; every other fault fails open
//! - The policy is swapped atomically on reload; the ledger survives reloads
//! - Gates are synchronous: nothing suspends between ledger read and write

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use axum::http::header::{CONTENT_TYPE, ORIGIN, USER_AGENT};
use axum::http::{HeaderMap, Method, Request};

use crate::config::schema::{FilterConfig, RuntimeMode};
use crate::error::Rejection;
use crate::security::client::{client_identifier, header_text};
use crate::security::clock::{Clock, SystemClock};
use crate::security::content_type::{carries_checked_body, ContentTypePolicy};
use crate::security::headers::HeaderSet;
use crate::security::ledger::{LedgerStore, MemoryLedger, StoreError};
use crate::security::origin::{is_mutating, OriginPolicy};
use crate::security::rate_limit::{FixedWindowLimiter, Verdict};
use crate::security::user_agent::UserAgentPolicy;

/// The parts of a request the filter looks at.
#[derive(Debug, Clone, Copy)]
pub struct RequestHead<'a> {
    pub method: &'a Method,
    pub path: &'a str,
    pub headers: &'a HeaderMap,
}

impl<'a> RequestHead<'a> {
    pub fn new(method: &'a Method, path: &'a str, headers: &'a HeaderMap) -> Self {
        Self {
            method,
            path,
            headers,
        }
    }

    pub fn from_request<B>(request: &'a Request<B>) -> Self {
        Self::new(request.method(), request.uri().path(), request.headers())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteCategory {
    Protected,
    Public,
    Other,
}

impl RouteCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            RouteCategory::Protected => "protected",
            RouteCategory::Public => "public",
            RouteCategory::Other => "other",
        }
    }
}

/// What the filter learned about an admitted request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestClass {
    pub client: String,
    pub category: RouteCategory,
    pub rate_limited: bool,
}

/// Everything derived from one `FilterConfig`.
#[derive(Debug)]
pub struct FilterPolicy {
    api_prefix: String,
    protected_prefixes: Vec<String>,
    public_paths: Vec<String>,
    rate_limited_prefixes: Vec<String>,
    origins: OriginPolicy,
    user_agents: UserAgentPolicy,
    content_types: ContentTypePolicy,
    headers: HeaderSet,
    limiter: FixedWindowLimiter,
}

impl FilterPolicy {
    fn build(
        config: &FilterConfig,
        mode: RuntimeMode,
        store: Arc<dyn LedgerStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            api_prefix: config.api_prefix.clone(),
            protected_prefixes: config.protected_prefixes.clone(),
            public_paths: config.public_paths.clone(),
            rate_limited_prefixes: config.rate_limited_prefixes.clone(),
            origins: OriginPolicy::new(&config.allowed_origins),
            user_agents: UserAgentPolicy::new(
                &config.user_agent_allowlist,
                &config.user_agent_denylist,
            ),
            content_types: ContentTypePolicy::new(&config.allowed_content_types),
            headers: HeaderSet::build(&config.csp, mode),
            limiter: FixedWindowLimiter::new(
                store,
                clock,
                config.rate_limit.max_requests,
                Duration::from_secs(config.rate_limit.window_secs),
            ),
        }
    }

    pub fn classify(&self, path: &str) -> RouteCategory {
        if self
            .protected_prefixes
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
        {
            RouteCategory::Protected
        } else if self.public_paths.iter().any(|p| p == path) {
            RouteCategory::Public
        } else {
            RouteCategory::Other
        }
    }

    pub fn is_rate_limited(&self, path: &str) -> bool {
        self.rate_limited_prefixes
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
    }

    pub fn limiter(&self) -> &FixedWindowLimiter {
        &self.limiter
    }
}

/// Gatekeeper in front of every route.
pub struct EdgeFilter {
    policy: ArcSwap<FilterPolicy>,
    mode: RuntimeMode,
    store: Arc<dyn LedgerStore>,
    clock: Arc<dyn Clock>,
}

impl EdgeFilter {
    /// A filter over an in-memory ledger and the system clock.
    pub fn new(config: &FilterConfig, mode: RuntimeMode) -> Self {
        Self::with_parts(
            config,
            mode,
            Arc::new(MemoryLedger::new()),
            Arc::new(SystemClock),
        )
    }

    pub fn with_parts(
        config: &FilterConfig,
        mode: RuntimeMode,
        store: Arc<dyn LedgerStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let policy = FilterPolicy::build(config, mode, store.clone(), clock.clone());
        Self {
            policy: ArcSwap::from_pointee(policy),
            mode,
            store,
            clock,
        }
    }

    /// Replace the policy. Ledger entries and the runtime mode are kept.
    pub fn reload(&self, config: &FilterConfig) {
        let policy = FilterPolicy::build(config, self.mode, self.store.clone(), self.clock.clone());
        self.policy.store(Arc::new(policy));
        tracing::info!(
            max_requests = config.rate_limit.max_requests,
            window_secs = config.rate_limit.window_secs,
            "Filter policy reloaded"
        );
    }

    pub fn policy(&self) -> Arc<FilterPolicy> {
        self.policy.load_full()
    }

    pub fn mode(&self) -> RuntimeMode {
        self.mode
    }

    pub fn ledger(&self) -> &Arc<dyn LedgerStore> {
        &self.store
    }

    /// Run the gates. Only the ledger is mutated.
    pub fn inspect(&self, head: &RequestHead<'_>) -> Result<RequestClass, Rejection> {
        let policy = self.policy.load();
        let class = RequestClass {
            client: client_identifier(head.headers),
            category: policy.classify(head.path),
            rate_limited: policy.is_rate_limited(head.path),
        };

        let result = self.run_gates(&policy, head, &class);
        if let Err(rejection) = &result {
            tracing::warn!(
                client = %class.client,
                method = %head.method,
                path = %head.path,
                category = class.category.as_str(),
                reason = rejection.reason(),
                "Request rejected"
            );
        }
        result.map(|()| class)
    }

    fn run_gates(
        &self,
        policy: &FilterPolicy,
        head: &RequestHead<'_>,
        class: &RequestClass,
    ) -> Result<(), Rejection> {
        if class.rate_limited {
            match policy.limiter.check(&class.client) {
                Ok(Verdict::Allowed { .. }) => {}
                Ok(Verdict::Limited { retry_after }) => {
                    return Err(Rejection::RateLimited { retry_after });
                }
                Err(e) => {
                    tracing::error!(
                        client = %class.client,
                        error = %e,
                        "Rate limiter failed, admitting request"
                    );
                }
            }
        }

        if is_mutating(head.method) {
            let origin = header_text(head.headers, &ORIGIN);
            if !policy.origins.is_allowed(origin.as_deref()) {
                return Err(Rejection::InvalidOrigin);
            }
        }

        let user_agent = header_text(head.headers, &USER_AGENT).unwrap_or_default();
        if policy.user_agents.is_blocked(&user_agent) {
            return Err(Rejection::AccessDenied);
        }

        if carries_checked_body(head.method) && head.path.starts_with(policy.api_prefix.as_str()) {
            let content_type = header_text(head.headers, &CONTENT_TYPE);
            if !policy.content_types.is_allowed(content_type.as_deref()) {
                return Err(Rejection::InvalidContentType);
            }
        }

        Ok(())
    }

    /// Attach security headers to an admitted response.
    pub fn decorate(&self, headers: &mut HeaderMap) {
        self.policy.load().headers.apply(headers);
    }

    /// Remove expired ledger entries.
    pub fn sweep(&self) -> Result<usize, StoreError> {
        self.store.sweep(self.clock.now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::clock::ManualClock;
    use crate::security::headers::{SECURITY_HEADERS, X_NONCE};
    use crate::security::ledger::LedgerEntry;
    use axum::http::header::CONTENT_SECURITY_POLICY;
    use axum::http::HeaderValue;
    use std::time::Instant;

    const WINDOW: Duration = Duration::from_secs(15 * 60);

    struct Harness {
        filter: EdgeFilter,
        clock: Arc<ManualClock>,
        ledger: Arc<MemoryLedger>,
    }

    fn harness(mode: RuntimeMode) -> Harness {
        harness_with(FilterConfig::default(), mode)
    }

    fn harness_with(config: FilterConfig, mode: RuntimeMode) -> Harness {
        let clock = Arc::new(ManualClock::new());
        let ledger = Arc::new(MemoryLedger::new());
        let filter = EdgeFilter::with_parts(&config, mode, ledger.clone(), clock.clone());
        Harness {
            filter,
            clock,
            ledger,
        }
    }

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    fn inspect(
        filter: &EdgeFilter,
        method: Method,
        path: &str,
        pairs: &[(&'static str, &'static str)],
    ) -> Result<RequestClass, Rejection> {
        let headers = headers(pairs);
        filter.inspect(&RequestHead::new(&method, path, &headers))
    }

    /// A store whose backend is always down.
    struct BrokenStore;

    impl LedgerStore for BrokenStore {
        fn get(&self, _key: &str) -> Result<Option<LedgerEntry>, StoreError> {
            Err(StoreError::Unavailable("offline".into()))
        }

        fn set(&self, _key: &str, _entry: LedgerEntry) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("offline".into()))
        }

        fn update(
            &self,
            _key: &str,
            _step: &mut dyn FnMut(Option<LedgerEntry>) -> LedgerEntry,
        ) -> Result<LedgerEntry, StoreError> {
            Err(StoreError::Unavailable("offline".into()))
        }

        fn sweep(&self, _now: Instant) -> Result<usize, StoreError> {
            Err(StoreError::Unavailable("offline".into()))
        }

        fn len(&self) -> usize {
            0
        }
    }

    #[test]
    fn test_classification() {
        let h = harness(RuntimeMode::Production);
        let class = inspect(&h.filter, Method::GET, "/api/projects", &[("x-real-ip", "9.9.9.9")]).unwrap();
        assert_eq!(
            class,
            RequestClass {
                client: "9.9.9.9".into(),
                category: RouteCategory::Protected,
                rate_limited: true,
            }
        );

        let class = inspect(&h.filter, Method::GET, "/transparency", &[]).unwrap();
        assert_eq!(class.category, RouteCategory::Public);
        assert!(!class.rate_limited);
        assert_eq!(class.client, "unknown");

        let class = inspect(&h.filter, Method::GET, "/admin/panel", &[]).unwrap();
        assert_eq!(class.category, RouteCategory::Protected);
        assert!(!class.rate_limited);

        let class = inspect(&h.filter, Method::GET, "/transparency/2024", &[]).unwrap();
        assert_eq!(class.category, RouteCategory::Other);
    }

    #[test]
    fn test_rate_limit_boundary() {
        let h = harness(RuntimeMode::Production);
        let client = [("x-forwarded-for", "203.0.113.7")];

        for n in 1..=100 {
            assert!(
                inspect(&h.filter, Method::GET, "/api/data", &client).is_ok(),
                "request {n} should pass"
            );
        }
        assert_eq!(
            inspect(&h.filter, Method::GET, "/api/data", &client),
            Err(Rejection::RateLimited { retry_after: WINDOW })
        );

        // Non-API routes are not counted.
        assert!(inspect(&h.filter, Method::GET, "/", &client).is_ok());
        assert_eq!(h.ledger.get("203.0.113.7").unwrap().unwrap().count, 100);
    }

    #[test]
    fn test_rate_limit_window_expiry() {
        let h = harness(RuntimeMode::Production);
        for _ in 0..100 {
            inspect(&h.filter, Method::GET, "/api/data", &[]).unwrap();
        }
        assert!(inspect(&h.filter, Method::GET, "/api/data", &[]).is_err());

        h.clock.advance(WINDOW + Duration::from_secs(1));
        assert!(inspect(&h.filter, Method::GET, "/api/data", &[]).is_ok());
        assert_eq!(h.ledger.get("unknown").unwrap().unwrap().count, 1);
    }

    #[test]
    fn test_later_rejections_still_count() {
        let h = harness(RuntimeMode::Production);
        let result = inspect(&h.filter, Method::GET, "/api/data", &[("user-agent", "curl/8.0")]);
        assert_eq!(result, Err(Rejection::AccessDenied));
        assert_eq!(h.ledger.get("unknown").unwrap().unwrap().count, 1);
    }

    #[test]
    fn test_origin_only_checked_on_mutations() {
        let h = harness(RuntimeMode::Production);
        let evil = [("origin", "https://evil.example")];

        for method in [Method::GET, Method::HEAD, Method::OPTIONS] {
            assert!(inspect(&h.filter, method, "/api/data", &evil).is_ok());
        }
        for method in [Method::POST, Method::PUT, Method::PATCH, Method::DELETE] {
            assert_eq!(
                inspect(&h.filter, method, "/contact", &evil),
                Err(Rejection::InvalidOrigin)
            );
        }

        // Absent and allowed origins pass.
        assert!(inspect(&h.filter, Method::DELETE, "/contact", &[]).is_ok());
        assert!(inspect(
            &h.filter,
            Method::DELETE,
            "/contact",
            &[("origin", "https://www.cades.org.br")]
        )
        .is_ok());
    }

    #[test]
    fn test_user_agent_gate() {
        let h = harness(RuntimeMode::Production);
        assert!(inspect(&h.filter, Method::GET, "/", &[("user-agent", "Googlebot/2.1")]).is_ok());
        assert_eq!(
            inspect(&h.filter, Method::GET, "/", &[("user-agent", "curl/7.68.0")]),
            Err(Rejection::AccessDenied)
        );
        assert!(inspect(&h.filter, Method::GET, "/", &[]).is_ok());
    }

    #[test]
    fn test_content_type_gate() {
        let h = harness(RuntimeMode::Production);

        assert_eq!(
            inspect(&h.filter, Method::POST, "/api/contact", &[("content-type", "application/xml")]),
            Err(Rejection::InvalidContentType)
        );
        assert!(inspect(
            &h.filter,
            Method::POST,
            "/api/contact",
            &[("content-type", "application/json; charset=utf-8")]
        )
        .is_ok());
        assert_eq!(
            inspect(&h.filter, Method::PUT, "/api/contact", &[]),
            Err(Rejection::InvalidContentType)
        );

        // PATCH and DELETE carry no checked body.
        assert!(inspect(&h.filter, Method::PATCH, "/api/contact", &[]).is_ok());

        // Non-API writes are never checked.
        assert!(inspect(&h.filter, Method::POST, "/contact", &[("content-type", "application/xml")]).is_ok());
        assert!(inspect(&h.filter, Method::POST, "/contact", &[]).is_ok());
    }

    #[test]
    fn test_gate_order() {
        let h = harness(RuntimeMode::Production);
        // Bad origin, bad agent and bad content type at once: origin wins.
        let everything_wrong = [
            ("origin", "https://evil.example"),
            ("user-agent", "sqlmap/1.7"),
            ("content-type", "text/plain"),
        ];
        assert_eq!(
            inspect(&h.filter, Method::POST, "/api/contact", &everything_wrong),
            Err(Rejection::InvalidOrigin)
        );

        let bad_agent_and_type = [("user-agent", "sqlmap/1.7"), ("content-type", "text/plain")];
        assert_eq!(
            inspect(&h.filter, Method::POST, "/api/contact", &bad_agent_and_type),
            Err(Rejection::AccessDenied)
        );
    }

    #[test]
    fn test_ledger_failure_fails_open() {
        let filter = EdgeFilter::with_parts(
            &FilterConfig::default(),
            RuntimeMode::Production,
            Arc::new(BrokenStore),
            Arc::new(ManualClock::new()),
        );

        for _ in 0..150 {
            assert!(inspect(&filter, Method::GET, "/api/data", &[]).is_ok());
        }
        // The other gates still apply.
        assert_eq!(
            inspect(&filter, Method::GET, "/api/data", &[("user-agent", "wget")]),
            Err(Rejection::AccessDenied)
        );
        assert!(filter.sweep().is_err());
    }

    #[test]
    fn test_decoration() {
        let h = harness(RuntimeMode::Production);
        let mut first = HeaderMap::new();
        let mut second = HeaderMap::new();
        h.filter.decorate(&mut first);
        h.filter.decorate(&mut second);

        for (name, value) in SECURITY_HEADERS {
            assert_eq!(first[name], value);
        }
        assert!(first.contains_key(CONTENT_SECURITY_POLICY));
        assert_ne!(first[X_NONCE], second[X_NONCE]);
    }

    #[test]
    fn test_development_decoration_is_idempotent() {
        let h = harness(RuntimeMode::Development);
        let mut first = HeaderMap::new();
        h.filter.decorate(&mut first);
        assert!(!first.contains_key(X_NONCE));

        for _ in 0..10 {
            let mut again = HeaderMap::new();
            h.filter.decorate(&mut again);
            assert_eq!(again, first);
        }
    }

    #[test]
    fn test_reload_keeps_ledger() {
        let h = harness(RuntimeMode::Production);
        for _ in 0..3 {
            inspect(&h.filter, Method::GET, "/api/data", &[]).unwrap();
        }

        let mut config = FilterConfig::default();
        config.rate_limit.max_requests = 3;
        config.user_agent_denylist.push("firefox".into());
        h.filter.reload(&config);

        assert_eq!(h.filter.policy().limiter().max_requests(), 3);
        assert!(matches!(
            inspect(&h.filter, Method::GET, "/api/data", &[]),
            Err(Rejection::RateLimited { .. })
        ));
        assert_eq!(
            inspect(&h.filter, Method::GET, "/", &[("user-agent", "Firefox/128.0")]),
            Err(Rejection::AccessDenied)
        );
        assert_eq!(h.filter.mode(), RuntimeMode::Production);
    }

    #[test]
    fn test_sweep() {
        let h = harness(RuntimeMode::Production);
        inspect(&h.filter, Method::GET, "/api/data", &[("x-real-ip", "a")]).unwrap();
        h.clock.advance(Duration::from_secs(600));
        inspect(&h.filter, Method::GET, "/api/data", &[("x-real-ip", "b")]).unwrap();

        h.clock.advance(Duration::from_secs(301));
        assert_eq!(h.filter.sweep().unwrap(), 1);
        assert_eq!(h.filter.ledger().len(), 1);
    }

    #[test]
    fn test_unrepresentable_window_fails_open() {
        let mut config = FilterConfig::default();
        config.rate_limit.window_secs = u64::MAX;
        let h = harness_with(config, RuntimeMode::Production);

        for _ in 0..3 {
            assert!(inspect(&h.filter, Method::GET, "/api/x", &[]).is_ok());
        }
        assert!(h.ledger.is_empty());
        assert_eq!(
            inspect(&h.filter, Method::GET, "/api/x", &[("user-agent", "curl/8.0")]),
            Err(Rejection::AccessDenied)
        );
    }

    #[test]
    fn test_empty_origin_counts_as_absent() {
        let h = harness(RuntimeMode::Production);
        assert!(inspect(&h.filter, Method::POST, "/contact", &[("origin", "")]).is_ok());
        assert!(inspect(&h.filter, Method::DELETE, "/contact", &[("origin", "  ")]).is_ok());
        assert_eq!(
            inspect(&h.filter, Method::POST, "/contact", &[("origin", "https://evil.example")]),
            Err(Rejection::InvalidOrigin)
        );
    }
}
