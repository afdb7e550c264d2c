//! Forwarding admitted requests to the site.
//!
//! # Design Decisions
//! - Method, path, query, headers and body are passed through untouched
//! - `Host` is dropped so the client derives it from the upstream URL
//! - Upstream failures map to 502, deadline overruns to 504

use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{
        header::HOST,
        uri::{Authority, InvalidUri, PathAndQuery, Scheme},
        Request, StatusCode, Uri,
    },
    response::{IntoResponse, Response},
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use thiserror::Error;

use crate::http::request::request_id;

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("upstream URL `{url}` is invalid: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: InvalidUri,
    },

    #[error("upstream URL `{0}` has no host")]
    MissingHost(String),
}

/// The site behind the filter.
#[derive(Clone, Debug)]
pub struct Upstream {
    client: Client<HttpConnector, Body>,
    scheme: Scheme,
    authority: Authority,
    base_path: String,
    timeout: Duration,
}

impl Upstream {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, UpstreamError> {
        let uri: Uri = url.parse().map_err(|source| UpstreamError::InvalidUrl {
            url: url.to_string(),
            source,
        })?;
        let authority = uri
            .authority()
            .cloned()
            .ok_or_else(|| UpstreamError::MissingHost(url.to_string()))?;

        Ok(Self {
            client: Client::builder(TokioExecutor::new()).build(HttpConnector::new()),
            scheme: uri.scheme().cloned().unwrap_or(Scheme::HTTP),
            authority,
            base_path: uri.path().trim_end_matches('/').to_string(),
            timeout,
        })
    }

    /// The upstream URI for an incoming request URI.
    pub fn target_uri(&self, original: &Uri) -> Result<Uri, axum::http::Error> {
        let path_and_query = original
            .path_and_query()
            .map(PathAndQuery::as_str)
            .unwrap_or("/");

        Uri::builder()
            .scheme(self.scheme.clone())
            .authority(self.authority.clone())
            .path_and_query(format!("{}{}", self.base_path, path_and_query))
            .build()
    }
}

/// Fallback handler: forward everything to the upstream.
pub async fn forward(State(upstream): State<Upstream>, request: Request<Body>) -> Response {
    let id = request_id(&request).to_string();
    let (mut parts, body) = request.into_parts();

    parts.uri = match upstream.target_uri(&parts.uri) {
        Ok(uri) => uri,
        Err(e) => {
            tracing::error!(request_id = %id, error = %e, "Failed to build upstream URI");
            return (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response();
        }
    };
    parts.headers.remove(HOST);

    tracing::debug!(request_id = %id, method = %parts.method, uri = %parts.uri, "Forwarding request");

    let request = Request::from_parts(parts, body);
    match tokio::time::timeout(upstream.timeout, upstream.client.request(request)).await {
        Ok(Ok(response)) => {
            let (parts, body) = response.into_parts();
            Response::from_parts(parts, Body::new(body))
        }
        Ok(Err(e)) => {
            tracing::error!(request_id = %id, error = %e, "Upstream error");
            (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
        }
        Err(_) => {
            tracing::error!(request_id = %id, timeout = ?upstream.timeout, "Upstream timed out");
            (StatusCode::GATEWAY_TIMEOUT, "Upstream timed out").into_response()
        }
    }
}

/// Fallback handler when no upstream is configured.
pub async fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "Not Found").into_response()
}
