//! Request correlation ids.
//!
//! An incoming `x-request-id` (or `x-correlation-id`) is reused when it looks
//! sane; otherwise a UUID is minted. Every log line emitted while handling the
//! request carries the id through the `request` span.

use std::sync::Arc;

use axum::{
    extract::Request,
    http::{header::HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use tracing::{info_span, Instrument};
use uuid::Uuid;

pub static REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");
pub static CORRELATION_ID_HEADER: HeaderName = HeaderName::from_static("x-correlation-id");

const MAX_REQUEST_ID_LEN: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(Arc<str>);

impl RequestId {
    pub fn generate() -> Self {
        Self(Arc::from(Uuid::new_v4().to_string()))
    }

    /// Accepts caller-supplied ids made of ASCII letters, digits, `-` and `_`.
    pub fn parse(candidate: &str) -> Option<Self> {
        let acceptable = !candidate.is_empty()
            && candidate.len() <= MAX_REQUEST_ID_LEN
            && candidate
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        acceptable.then(|| Self(Arc::from(candidate)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

fn incoming_request_id(request: &Request) -> Option<RequestId> {
    [&REQUEST_ID_HEADER, &CORRELATION_ID_HEADER]
        .into_iter()
        .filter_map(|name| request.headers().get(name))
        .filter_map(|value| value.to_str().ok())
        .find_map(RequestId::parse)
}

pub async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let request_id = incoming_request_id(&request).unwrap_or_else(RequestId::generate);
    request.extensions_mut().insert(request_id.clone());

    let span = info_span!(
        "request",
        request_id = %request_id,
        method = %request.method(),
        uri = %request.uri(),
    );

    let mut response = next.run(request).instrument(span).await;

    if let Ok(value) = HeaderValue::from_str(request_id.as_str()) {
        response
            .headers_mut()
            .insert(REQUEST_ID_HEADER.clone(), value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn request_with(headers: &[(&HeaderName, &str)]) -> Request {
        let mut builder = Request::builder().uri("/health");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn test_generated_ids_are_unique() {
        assert_ne!(RequestId::generate(), RequestId::generate());
    }

    #[test]
    fn test_parse_accepts_safe_ids() {
        for id in ["abc123", "abc-123", "ABC-123_xyz"] {
            assert_eq!(RequestId::parse(id).unwrap().as_str(), id);
        }
        assert!(RequestId::parse(&"a".repeat(MAX_REQUEST_ID_LEN)).is_some());
    }

    #[test]
    fn test_parse_rejects_unsafe_ids() {
        for id in ["", "abc 123", "abc@123", "abc/123", "ünïcode"] {
            assert!(RequestId::parse(id).is_none(), "{id}");
        }
        assert!(RequestId::parse(&"a".repeat(MAX_REQUEST_ID_LEN + 1)).is_none());
    }

    #[test]
    fn test_request_id_header_wins_over_correlation_id() {
        let request = request_with(&[
            (&CORRELATION_ID_HEADER, "from-correlation"),
            (&REQUEST_ID_HEADER, "from-request"),
        ]);
        assert_eq!(
            incoming_request_id(&request).unwrap().as_str(),
            "from-request"
        );
    }

    #[test]
    fn test_falls_back_to_correlation_id_when_request_id_is_bad() {
        let request = request_with(&[
            (&REQUEST_ID_HEADER, "not ok"),
            (&CORRELATION_ID_HEADER, "corr-1"),
        ]);
        assert_eq!(incoming_request_id(&request).unwrap().as_str(), "corr-1");
        assert!(incoming_request_id(&request_with(&[])).is_none());
    }
}
