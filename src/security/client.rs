//! Client identification.
//!
//! The identifier is only a throttling key. All three headers are trivially
//! spoofable, so nothing security-critical may depend on it.

use std::borrow::Cow;

use axum::http::{HeaderMap, HeaderName};

pub const UNKNOWN_CLIENT: &str = "unknown";

pub const X_REAL_IP: HeaderName = HeaderName::from_static("x-real-ip");
pub const CF_CONNECTING_IP: HeaderName = HeaderName::from_static("cf-connecting-ip");
pub const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

/// Resolve the client identifier: `x-real-ip`, then `cf-connecting-ip`, then
/// the first `x-forwarded-for` hop, else `"unknown"`.
pub fn client_identifier(headers: &HeaderMap) -> String {
    for name in [X_REAL_IP, CF_CONNECTING_IP] {
        if let Some(value) = header_text(headers, &name) {
            let value = value.trim();
            if !value.is_empty() {
                return value.to_string();
            }
        }
    }

    if let Some(chain) = header_text(headers, &X_FORWARDED_FOR) {
        if let Some(first) = chain.split(',').next().map(str::trim) {
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }

    UNKNOWN_CLIENT.to_string()
}

/// Read a header as text. Bytes that are not valid UTF-8 are replaced rather
/// than failing the lookup.
pub fn header_text<'a>(headers: &'a HeaderMap, name: &HeaderName) -> Option<Cow<'a, str>> {
    headers
        .get(name)
        .map(|value| String::from_utf8_lossy(value.as_bytes()))
}
