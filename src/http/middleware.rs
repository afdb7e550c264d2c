//! Edge filter middleware.
//!
//! Wraps the site: runs the filter's gates, answers rejections directly, and
//! decorates whatever the inner service returns for admitted requests.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::http::request::request_id;
use crate::observability::metrics;
use crate::security::filter::{EdgeFilter, RequestHead};

pub async fn edge_filter(
    State(filter): State<Arc<EdgeFilter>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = request.method().clone();

    let verdict = filter.inspect(&RequestHead::from_request(&request));
    match verdict {
        Err(rejection) => {
            metrics::record_rejection(rejection.reason());
            let response = rejection.into_response();
            metrics::record_request(&method, response.status().as_u16(), "rejected", start);
            response
        }
        Ok(class) => {
            tracing::debug!(
                request_id = %request_id(&request),
                client = %class.client,
                category = class.category.as_str(),
                "Request admitted"
            );

            let mut response = next.run(request).await;
            filter.decorate(response.headers_mut());
            metrics::record_request(
                &method,
                response.status().as_u16(),
                class.category.as_str(),
                start,
            );
            response
        }
    }
}
