//! Edge request filter library.
//!
//! Sits in front of a site and decides, per request, whether to pass it on:
//! fixed-window rate limiting on API routes, origin checks on writes,
//! user-agent screening and API content-type checks. Admitted responses are
//! decorated with security headers, a Content-Security-Policy and, in
//! production, a per-request nonce.

pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod security;

pub use config::schema::EdgeConfig;
pub use error::{EdgeError, Rejection};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use security::EdgeFilter;
