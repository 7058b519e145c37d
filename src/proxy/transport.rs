//! Sticky, failover-aware transport to the backend pool.
//!
//! # Responsibilities
//! - Read the client's sticky backend from its cookie
//! - Order candidates (shuffle, sticky first) on every dispatch
//! - Fail over on connect errors only, never after bytes may have left
//! - Re-issue the cookie when the serving backend is not the sticky one
//!
//! # Data Flow
//! ```text
//! round_trip: request → candidates → Upstream::send per candidate → response
//! upgrade:    request → candidates → dial_ordered → write head → read head
//! connect:    candidates → dial_ordered
//! ```

use std::sync::Arc;

use axum::body::Body;
use axum::http::header::HOST;
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderValue, Request, Response, Uri, Version};

use crate::affinity::{cookie, AffinityKey, StickyCodec};
use crate::config::TimeoutConfig;
use crate::error::ProxyError;
use crate::lifecycle::CancelSignal;
use crate::load_balancer::{BackendSelector, BackendSource};
use crate::net::{dial_ordered, BufferedStream, Dial, TcpDialer};
use crate::observability::metrics;
use crate::proxy::body::{BodyLease, RetryBody};
use crate::proxy::upgrade;
use crate::proxy::upstream::{HyperUpstream, Upstream, UpstreamError};

/// Largest request body forwarded on the upgrade path.
pub const MAX_UPGRADE_BODY: usize = 1024 * 1024;

/// Dispatches requests to one backend out of a changing pool.
pub struct ProxyTransport<U = HyperUpstream<TcpDialer>, D = TcpDialer> {
    source: Arc<dyn BackendSource>,
    selector: BackendSelector,
    upstream: U,
    dialer: D,
    affinity: Option<StickyCodec>,
}

impl ProxyTransport<HyperUpstream<TcpDialer>, TcpDialer> {
    /// Production transport over TCP with the given timeouts.
    ///
    /// `affinity` enables sticky sessions sealed under that key.
    pub fn new(
        source: Arc<dyn BackendSource>,
        timeouts: &TimeoutConfig,
        affinity: Option<AffinityKey>,
    ) -> Self {
        let dialer = TcpDialer::new(timeouts.dial(), Some(timeouts.keepalive()));
        let upstream = HyperUpstream::new(dialer.clone(), timeouts.response_header());

        let transport = Self::from_parts(source, upstream, dialer);
        match affinity {
            Some(key) => transport.with_affinity(key),
            None => transport,
        }
    }
}

impl<U: Upstream, D: Dial> ProxyTransport<U, D> {
    /// Transport over an explicit client and dialer, affinity off.
    pub fn from_parts(source: Arc<dyn BackendSource>, upstream: U, dialer: D) -> Self {
        Self {
            source,
            selector: BackendSelector::new(),
            upstream,
            dialer,
            affinity: None,
        }
    }

    pub fn with_affinity(mut self, key: AffinityKey) -> Self {
        self.affinity = Some(StickyCodec::new(key));
        self
    }

    pub fn with_selector(mut self, selector: BackendSelector) -> Self {
        self.selector = selector;
        self
    }

    pub fn affinity_enabled(&self) -> bool {
        self.affinity.is_some()
    }

    /// Forward an HTTP request, failing over between backends that refuse
    /// the connection or whose address cannot be used.
    ///
    /// A failure after a connection exists is returned as
    /// [`ProxyError::Upstream`] without trying another backend.
    pub async fn round_trip(&self, request: Request<Body>) -> Result<Response<Body>, ProxyError> {
        let sticky = self.sticky_backend(request.headers());
        let candidates = self.ordered_backends(sticky.as_deref());

        let (parts, body) = request.into_parts();
        let body = RetryBody::new(body);

        for (attempt, backend) in candidates.iter().enumerate() {
            let outgoing = match outgoing_request(&parts, backend, body.lease()) {
                Ok(outgoing) => outgoing,
                Err(e) => {
                    metrics::record_dial(false);
                    tracing::debug!(backend = %backend, attempt, error = %e, "Backend address unusable");
                    continue;
                }
            };

            match self.upstream.send(outgoing).await {
                Ok(mut response) => {
                    if attempt > 0 {
                        tracing::info!(backend = %backend, attempt, "Served after failover");
                    }
                    self.set_sticky_backend(response.headers_mut(), sticky.as_deref(), backend);
                    return Ok(response);
                }
                Err(UpstreamError::Connect(e)) => {
                    tracing::debug!(backend = %backend, attempt, error = %e, "Backend connect failed");
                }
                Err(UpstreamError::Request(e)) => {
                    tracing::warn!(backend = %backend, attempt, error = %e, "Backend request failed");
                    return Err(ProxyError::Upstream(e));
                }
            }
        }

        tracing::warn!(candidates = candidates.len(), "No backend accepted a connection");
        Err(ProxyError::NoBackends)
    }

    /// Raw connection to any backend, no sticky preference.
    pub async fn connect(&self, cancel: &CancelSignal) -> Result<(D::Conn, String), ProxyError> {
        let candidates = self.ordered_backends(None);
        dial_ordered(&self.dialer, &candidates, cancel).await
    }

    /// Send an upgrade request over a fresh raw connection.
    ///
    /// Returns the backend's response head and the connection, still open,
    /// with any bytes the backend sent after the head. The caller decides what
    /// to do with a non-101 answer.
    pub async fn upgrade(
        &self,
        request: Request<Body>,
        cancel: &CancelSignal,
    ) -> Result<(Response<()>, BufferedStream<D::Conn>), ProxyError> {
        let sticky = self.sticky_backend(request.headers());
        let candidates = self.ordered_backends(sticky.as_deref());

        let (parts, body) = request.into_parts();
        let body = axum::body::to_bytes(body, MAX_UPGRADE_BODY)
            .await
            .map_err(ProxyError::RequestBody)?;

        let (mut conn, backend) = dial_ordered(&self.dialer, &candidates, cancel).await?;

        let encoded = upgrade::encode_request(&parts, &backend, &body);
        upgrade::write_request(&mut conn, &encoded).await?;
        let (mut response, stream) = upgrade::read_response(conn).await?;

        tracing::debug!(backend = %backend, status = %response.status(), "Upgrade response");
        self.set_sticky_backend(response.headers_mut(), sticky.as_deref(), &backend);
        Ok((response, stream))
    }

    fn sticky_backend(&self, headers: &HeaderMap) -> Option<String> {
        let codec = self.affinity.as_ref()?;
        cookie::sticky_backend(headers, codec)
    }

    fn ordered_backends(&self, sticky: Option<&str>) -> Vec<String> {
        self.selector
            .ordered_backends(&self.source.backends(), sticky)
    }

    fn set_sticky_backend(&self, headers: &mut HeaderMap, sticky: Option<&str>, backend: &str) {
        let Some(codec) = &self.affinity else {
            return;
        };
        if sticky == Some(backend) {
            return;
        }
        if cookie::set_sticky_backend(headers, backend, codec) {
            metrics::record_affinity_cookie();
        }
    }
}

/// Copy of the inbound request aimed at `backend`.
fn outgoing_request(
    parts: &Parts,
    backend: &str,
    body: BodyLease,
) -> Result<Request<Body>, ProxyError> {
    let path = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let uri = Uri::builder()
        .scheme("http")
        .authority(backend)
        .path_and_query(path)
        .build()?;
    let version = match parts.version {
        Version::HTTP_10 => Version::HTTP_10,
        _ => Version::HTTP_11,
    };

    let mut request = Request::builder()
        .method(parts.method.clone())
        .uri(uri)
        .version(version)
        .body(Body::new(body))?;

    *request.headers_mut() = parts.headers.clone();
    if !request.headers().contains_key(HOST) {
        if let Some(authority) = parts.uri.authority() {
            if let Ok(host) = HeaderValue::from_str(authority.as_str()) {
                request.headers_mut().insert(HOST, host);
            }
        }
    }
    Ok(request)
}
