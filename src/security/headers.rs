//! Security response headers.
//!
//! # Responsibilities
//! - Render the Content-Security-Policy from ordered directives
//! - Precompute the static header set once per policy
//! - Add the per-request nonce in production
//!
//! # Design Decisions
//! - Decoration is best-effort: an unencodable value is logged and skipped
//! - Static headers are built once, so every response gets identical values
//! - Development mode relaxes script/connect sources for live reload

use axum::http::{HeaderMap, HeaderName, HeaderValue};

use crate::config::schema::{CspConfig, CspDirective, RuntimeMode};
use crate::security::nonce::generate_nonce;

pub const X_NONCE: HeaderName = HeaderName::from_static("x-nonce");

pub const SECURITY_HEADERS: [(&str, &str); 6] = [
    ("x-frame-options", "DENY"),
    ("x-content-type-options", "nosniff"),
    ("x-xss-protection", "1; mode=block"),
    (
        "strict-transport-security",
        "max-age=31536000; includeSubDomains",
    ),
    ("referrer-policy", "strict-origin-when-cross-origin"),
    (
        "permissions-policy",
        "camera=(), microphone=(), geolocation=(), fullscreen=(self)",
    ),
];

pub const DEV_CORS_HEADERS: [(&str, &str); 3] = [
    ("access-control-allow-origin", "*"),
    (
        "access-control-allow-methods",
        "GET, POST, PUT, DELETE, OPTIONS",
    ),
    ("access-control-allow-headers", "Content-Type, Authorization"),
];

const DEV_SCRIPT_SOURCES: [&str; 1] = ["'unsafe-eval'"];
const DEV_CONNECT_SOURCES: [&str; 2] = ["http://localhost:*", "ws://localhost:*"];

pub fn default_csp_directives() -> Vec<CspDirective> {
    vec![
        CspDirective::new("default-src", &["'self'"]),
        CspDirective::new(
            "script-src",
            &[
                "'self'",
                "'unsafe-inline'",
                "https://www.googletagmanager.com",
                "https://www.google-analytics.com",
                "https://vercel.live",
            ],
        ),
        CspDirective::new(
            "style-src",
            &["'self'", "'unsafe-inline'", "https://fonts.googleapis.com"],
        ),
        CspDirective::new(
            "img-src",
            &[
                "'self'",
                "data:",
                "https:",
                "blob:",
                "https://images.unsplash.com",
                "https://via.placeholder.com",
            ],
        ),
        CspDirective::new("font-src", &["'self'", "https://fonts.gstatic.com"]),
        CspDirective::new(
            "connect-src",
            &[
                "'self'",
                "https://api.cades.org.br",
                "https://www.google-analytics.com",
                "https://vitals.vercel-insights.com",
                "wss:",
            ],
        ),
        CspDirective::new(
            "frame-src",
            &["'self'", "https://www.youtube.com", "https://player.vimeo.com"],
        ),
        CspDirective::new("worker-src", &["'self'", "blob:"]),
        CspDirective::new("object-src", &["'none'"]),
        CspDirective::new("base-uri", &["'self'"]),
        CspDirective::new("form-action", &["'self'"]),
        CspDirective::new("frame-ancestors", &["'none'"]),
        CspDirective::new("upgrade-insecure-requests", &[]),
    ]
}

/// Render directives as `name src src; name src; bare-name`.
pub fn render_csp(directives: &[CspDirective], mode: RuntimeMode) -> String {
    directives
        .iter()
        .map(|directive| {
            let mut sources: Vec<&str> = directive.sources.iter().map(String::as_str).collect();
            if !mode.is_production() {
                match directive.name.as_str() {
                    "script-src" => sources.extend(DEV_SCRIPT_SOURCES),
                    "connect-src" => sources.extend(DEV_CONNECT_SOURCES),
                    _ => {}
                }
            }

            if sources.is_empty() {
                directive.name.clone()
            } else {
                format!("{} {}", directive.name, sources.join(" "))
            }
        })
        .collect::<Vec<_>>()
        .join("; ")
}

/// Headers attached to every admitted response.
#[derive(Debug, Clone)]
pub struct HeaderSet {
    headers: Vec<(HeaderName, HeaderValue)>,
    emit_nonce: bool,
}

impl HeaderSet {
    pub fn build(csp: &CspConfig, mode: RuntimeMode) -> Self {
        let mut headers = Vec::with_capacity(SECURITY_HEADERS.len() + DEV_CORS_HEADERS.len() + 1);

        let policy = render_csp(&csp.directives, mode);
        match HeaderValue::from_str(&policy) {
            Ok(value) => headers.push((axum::http::header::CONTENT_SECURITY_POLICY, value)),
            Err(e) => {
                tracing::error!(error = %e, "Content-Security-Policy is not a valid header value, omitting it");
            }
        }

        let cors: &[(&'static str, &'static str)] = if mode.is_production() {
            &[]
        } else {
            &DEV_CORS_HEADERS
        };
        for &(name, value) in SECURITY_HEADERS.iter().chain(cors) {
            headers.push((
                HeaderName::from_static(name),
                HeaderValue::from_static(value),
            ));
        }

        Self {
            headers,
            emit_nonce: mode.is_production(),
        }
    }

    /// Decorate a response. Existing values for the same names are replaced.
    pub fn apply(&self, target: &mut HeaderMap) {
        for (name, value) in &self.headers {
            target.insert(name.clone(), value.clone());
        }

        if self.emit_nonce {
            match HeaderValue::from_str(&generate_nonce()) {
                Ok(nonce) => {
                    target.insert(X_NONCE, nonce);
                }
                Err(e) => tracing::error!(error = %e, "Failed to encode nonce header"),
            }
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &HeaderName> {
        self.headers.iter().map(|(name, _)| name)
    }
}
