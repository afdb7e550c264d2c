//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the edge guard.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::security::headers::default_csp_directives;

/// Root configuration for the edge guard.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct EdgeConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// The site that admitted requests are forwarded to.
    pub upstream: UpstreamConfig,

    /// Runtime mode (production or development).
    pub runtime: RuntimeConfig,

    /// Request filter policy.
    pub filter: FilterConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Upstream site configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URL of the site (e.g., "http://127.0.0.1:3000").
    /// When unset, admitted requests are answered with 404.
    pub url: Option<String>,

    /// Total time allowed for an upstream exchange, in seconds.
    pub timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_secs: 30,
        }
    }
}

/// Deployment mode. Development relaxes the CSP and adds permissive CORS
/// headers; production emits a per-request nonce.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeMode {
    #[default]
    Production,
    Development,
}

impl RuntimeMode {
    pub fn is_production(self) -> bool {
        self == RuntimeMode::Production
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RuntimeConfig {
    pub mode: RuntimeMode,
}

/// Request filter configuration: route classification and gate lists.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Prefix identifying API routes (content-type checks apply here).
    pub api_prefix: String,

    /// Prefixes of routes considered protected.
    pub protected_prefixes: Vec<String>,

    /// Exact paths of public pages.
    pub public_paths: Vec<String>,

    /// Prefixes of routes subject to rate limiting.
    pub rate_limited_prefixes: Vec<String>,

    /// Extra allowed origins, appended to the built-in list.
    /// Entries may contain `*` wildcards.
    pub allowed_origins: Vec<String>,

    /// Media types accepted on API writes.
    pub allowed_content_types: Vec<String>,

    /// Case-insensitive user-agent signatures that are refused.
    pub user_agent_denylist: Vec<String>,

    /// Case-sensitive user-agent substrings that are never refused.
    pub user_agent_allowlist: Vec<String>,

    /// Fixed-window rate limit settings.
    pub rate_limit: RateLimitConfig,

    /// Content-Security-Policy directives.
    pub csp: CspConfig,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            api_prefix: "/api/".to_string(),
            protected_prefixes: strings(&["/api/", "/admin/"]),
            public_paths: strings(&["/", "/transparency", "/projects"]),
            rate_limited_prefixes: strings(&["/api/"]),
            allowed_origins: Vec::new(),
            allowed_content_types: strings(&[
                "application/json",
                "application/x-www-form-urlencoded",
                "multipart/form-data",
            ]),
            user_agent_denylist: strings(&[
                "bot", "crawler", "spider", "scraper", "curl", "wget", "python", "php", "java",
                "scanner", "sql", "injection",
            ]),
            user_agent_allowlist: strings(&[
                "Googlebot",
                "Bingbot",
                "facebookexternalhit",
                "Twitterbot",
                "LinkedInBot",
            ]),
            rate_limit: RateLimitConfig::default(),
            csp: CspConfig::default(),
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Maximum requests per client within one window.
    pub max_requests: u32,

    /// Window length in seconds.
    pub window_secs: u64,

    /// How often expired ledger entries are swept, in seconds.
    pub sweep_interval_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 100,
            window_secs: 15 * 60,
            sweep_interval_secs: 60,
        }
    }
}

/// Content-Security-Policy configuration. Directive order is preserved.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CspConfig {
    pub directives: Vec<CspDirective>,
}

impl Default for CspConfig {
    fn default() -> Self {
        Self {
            directives: default_csp_directives(),
        }
    }
}

/// A single CSP directive, e.g. `script-src 'self'`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CspDirective {
    pub name: String,
    #[serde(default)]
    pub sources: Vec<String>,
}

impl CspDirective {
    pub fn new(name: &str, sources: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            sources: strings(sources),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Human-readable or JSON log lines.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}
