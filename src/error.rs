//! Request-level errors surfaced by the transport.
//!
//! Per-attempt dial failures never show up here; they only count towards
//! exhausting the candidate list (see [`crate::net::DialError`]).

use axum::http::StatusCode;
use thiserror::Error;

/// Boxed error used for opaque upstream failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum ProxyError {
    /// The candidate list was empty, or every candidate failed to connect.
    #[error("router: no backends available")]
    NoBackends,

    /// Cancellation was observed between dial attempts.
    #[error("router: backend connection canceled")]
    Canceled,

    /// The round trip failed after a connection was established.
    #[error("upstream request failed: {0}")]
    Upstream(#[source] BoxError),

    /// Writing the request to, or reading the response from, a raw backend
    /// connection failed.
    #[error("backend connection i/o: {0}")]
    Io(#[from] std::io::Error),

    /// The backend answered an upgrade with something that is not an HTTP/1
    /// response head.
    #[error("malformed backend response: {0}")]
    MalformedResponse(String),

    /// The outgoing request could not be rebuilt for a candidate.
    ///
    /// The HTTP path treats this as a failed dial and moves on.
    #[error("invalid outgoing request: {0}")]
    InvalidRequest(#[from] axum::http::Error),

    /// The inbound request body could not be read.
    #[error("failed to read request body: {0}")]
    RequestBody(#[source] axum::Error),
}

impl ProxyError {
    /// Status code to answer the client with.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ProxyError::NoBackends | ProxyError::Canceled => StatusCode::SERVICE_UNAVAILABLE,
            ProxyError::RequestBody(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::BAD_GATEWAY,
        }
    }

    /// Whether the failure says something about backend availability.
    ///
    /// Cancellation is the caller giving up, not an outage.
    pub fn is_outage(&self) -> bool {
        !matches!(self, ProxyError::Canceled | ProxyError::RequestBody(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canceled_is_distinct_from_no_backends() {
        assert!(ProxyError::NoBackends.is_outage());
        assert!(!ProxyError::Canceled.is_outage());
        assert_ne!(
            ProxyError::NoBackends.to_string(),
            ProxyError::Canceled.to_string()
        );
    }

    #[test]
    fn status_codes() {
        assert_eq!(ProxyError::NoBackends.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            ProxyError::MalformedResponse("x".into()).status_code(),
            StatusCode::BAD_GATEWAY
        );
    }
}
