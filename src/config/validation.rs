//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (window > 0, max > 0, timeouts > 0)
//! - Check that addresses, URLs, paths and media types are well formed
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: EdgeConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::EdgeConfig;

/// Longest accepted rate-limit window: one year.
pub const MAX_WINDOW_SECS: u64 = 365 * 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.bind_address `{0}` is not a socket address")]
    BindAddress(String),

    #[error("upstream.url `{0}` must be an absolute http:// URL")]
    UpstreamUrl(String),

    #[error("upstream.timeout_secs must be greater than zero")]
    UpstreamTimeout,

    #[error("filter.rate_limit.max_requests must be greater than zero")]
    MaxRequests,

    #[error("filter.rate_limit.window_secs must be greater than zero")]
    Window,

    #[error("filter.rate_limit.window_secs {0} exceeds the maximum of {MAX_WINDOW_SECS}")]
    WindowTooLong(u64),

    #[error("filter.rate_limit.sweep_interval_secs must be greater than zero")]
    SweepInterval,

    #[error("{field} entry `{value}` must start with `/`")]
    RelativePath { field: &'static str, value: String },

    #[error("filter.allowed_content_types entry `{0}` is not a media type")]
    MediaType(String),

    #[error("filter.allowed_origins contains an empty entry")]
    EmptyOrigin,

    #[error("{0} contains an empty entry")]
    EmptySignature(&'static str),

    #[error("filter.csp directive name `{0}` is invalid")]
    CspDirective(String),

    #[error("observability.metrics_address `{0}` is not a socket address")]
    MetricsAddress(String),
}

pub fn validate_config(config: &EdgeConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    if let Some(raw) = &config.upstream.url {
        let valid = Url::parse(raw)
            .map(|url| url.scheme() == "http" && url.host().is_some())
            .unwrap_or(false);
        if !valid {
            errors.push(ValidationError::UpstreamUrl(raw.clone()));
        }
    }
    if config.upstream.timeout_secs == 0 {
        errors.push(ValidationError::UpstreamTimeout);
    }

    let filter = &config.filter;
    let rate_limit = &filter.rate_limit;
    if rate_limit.max_requests == 0 {
        errors.push(ValidationError::MaxRequests);
    }
    if rate_limit.window_secs == 0 {
        errors.push(ValidationError::Window);
    } else if rate_limit.window_secs > MAX_WINDOW_SECS {
        errors.push(ValidationError::WindowTooLong(rate_limit.window_secs));
    }
    if rate_limit.sweep_interval_secs == 0 {
        errors.push(ValidationError::SweepInterval);
    }

    check_paths("filter.api_prefix", std::slice::from_ref(&filter.api_prefix), &mut errors);
    check_paths("filter.protected_prefixes", &filter.protected_prefixes, &mut errors);
    check_paths("filter.public_paths", &filter.public_paths, &mut errors);
    check_paths("filter.rate_limited_prefixes", &filter.rate_limited_prefixes, &mut errors);

    for media_type in &filter.allowed_content_types {
        let mut parts = media_type.trim().splitn(2, '/');
        let well_formed = matches!(
            (parts.next(), parts.next()),
            (Some(kind), Some(subtype)) if !kind.is_empty() && !subtype.is_empty()
        );
        if !well_formed {
            errors.push(ValidationError::MediaType(media_type.clone()));
        }
    }

    if filter.allowed_origins.iter().any(|o| o.trim().is_empty()) {
        errors.push(ValidationError::EmptyOrigin);
    }
    if filter.user_agent_denylist.iter().any(|s| s.is_empty()) {
        errors.push(ValidationError::EmptySignature("filter.user_agent_denylist"));
    }
    if filter.user_agent_allowlist.iter().any(|s| s.is_empty()) {
        errors.push(ValidationError::EmptySignature("filter.user_agent_allowlist"));
    }

    for directive in &filter.csp.directives {
        let name_ok = !directive.name.is_empty()
            && directive
                .name
                .chars()
                .all(|c| c.is_ascii_lowercase() || c == '-');
        if !name_ok {
            errors.push(ValidationError::CspDirective(directive.name.clone()));
        }
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_paths(field: &'static str, values: &[String], errors: &mut Vec<ValidationError>) {
    for value in values {
        if !value.starts_with('/') {
            errors.push(ValidationError::RelativePath {
                field,
                value: value.clone(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::CspDirective;

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(validate_config(&EdgeConfig::default()), Ok(()));
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = EdgeConfig::default();
        config.listener.bind_address = "not-an-address".into();
        config.upstream.url = Some("https://example.org".into());
        config.filter.rate_limit.sweep_interval_secs = 0;
        config.filter.public_paths.push("transparency".into());
        config.filter.allowed_content_types.push("json".into());
        config.filter.allowed_origins.push("  ".into());
        config.filter.csp.directives.push(CspDirective::new("Script Src", &[]));

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::BindAddress("not-an-address".into()),
                ValidationError::UpstreamUrl("https://example.org".into()),
                ValidationError::SweepInterval,
                ValidationError::RelativePath {
                    field: "filter.public_paths",
                    value: "transparency".into(),
                },
                ValidationError::MediaType("json".into()),
                ValidationError::EmptyOrigin,
                ValidationError::CspDirective("Script Src".into()),
            ]
        );
    }

    #[test]
    fn test_window_upper_bound() {
        let mut config = EdgeConfig::default();
        config.filter.rate_limit.window_secs = MAX_WINDOW_SECS;
        assert!(validate_config(&config).is_ok());

        config.filter.rate_limit.window_secs = u64::MAX;
        assert_eq!(
            validate_config(&config),
            Err(vec![ValidationError::WindowTooLong(u64::MAX)])
        );
    }

    #[test]
    fn test_metrics_address_only_checked_when_enabled() {
        let mut config = EdgeConfig::default();
        config.observability.metrics_address = "nope".into();
        assert!(validate_config(&config).is_ok());

        config.observability.metrics_enabled = true;
        assert_eq!(
            validate_config(&config),
            Err(vec![ValidationError::MetricsAddress("nope".into())])
        );
    }
}
