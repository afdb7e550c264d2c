//! Error types for the edge guard.
//!
//! `Rejection` is the only error a client ever sees. Everything else is an
//! operator-facing failure: startup problems surface through `EdgeError`,
//! while faults inside the request path are logged and the request is let
//! through (see `security::filter`).

use std::time::Duration;

use axum::{
    http::{header::RETRY_AFTER, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::config::loader::ConfigError;
use crate::http::upstream::UpstreamError;
use crate::security::ledger::StoreError;

/// Top-level error for starting and running the service.
#[derive(Error, Debug)]
pub enum EdgeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Ledger store error: {0}")]
    Store(#[from] StoreError),

    #[error("Upstream error: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("Config watcher error: {0}")]
    Watch(#[from] notify::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for edge guard operations.
pub type Result<T> = std::result::Result<T, EdgeError>;

/// A request the filter refused to pass on.
///
/// The `Display` text is the exact `error` field of the JSON body.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    #[error("Too many requests")]
    RateLimited { retry_after: Duration },

    #[error("Invalid origin")]
    InvalidOrigin,

    #[error("Access denied")]
    AccessDenied,

    #[error("Invalid content type")]
    InvalidContentType,
}

impl Rejection {
    pub fn status(&self) -> StatusCode {
        match self {
            Rejection::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Rejection::InvalidOrigin | Rejection::AccessDenied => StatusCode::FORBIDDEN,
            Rejection::InvalidContentType => StatusCode::BAD_REQUEST,
        }
    }

    /// Short label used in logs and metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            Rejection::RateLimited { .. } => "rate_limit",
            Rejection::InvalidOrigin => "origin",
            Rejection::AccessDenied => "user_agent",
            Rejection::InvalidContentType => "content_type",
        }
    }
}

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        let mut response = (self.status(), Json(json!({ "error": self.to_string() }))).into_response();

        if let Rejection::RateLimited { retry_after } = self {
            // Round up so a client never retries before the window has reset.
            let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(secs));
        }

        response
    }
}
