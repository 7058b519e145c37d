//! Pooled HTTP client used for the request/response path.
//!
//! # Responsibilities
//! - Send one request to the backend named in its URI authority
//! - Dial through the same [`Dial`] policy as raw connections
//! - Tag each failure as connect-stage (retryable) or request-stage (final)
//!
//! # Design Decisions
//! - The tag is assigned here, at the client boundary, and travels as an enum
//! - Response-header timeout wraps the whole send; body streaming is unbounded

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, Response, Uri};
use hyper_util::client::legacy::connect::{Connected, Connection};
use hyper_util::client::legacy::Client;
use hyper_util::rt::{TokioExecutor, TokioIo, TokioTimer};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::timeout;

use crate::error::BoxError;
use crate::net::{Dial, DialError};
use crate::observability::metrics;

/// Default time to wait for response headers.
pub const DEFAULT_RESPONSE_HEADER_TIMEOUT: Duration = Duration::from_secs(120);

/// Outcome of a failed round trip.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// No connection to the backend could be established. Retryable.
    #[error("connect: {0}")]
    Connect(#[source] BoxError),

    /// Something failed after the connection existed. Not retryable: part of
    /// the request may already have been delivered.
    #[error("request: {0}")]
    Request(#[source] BoxError),
}

impl UpstreamError {
    pub fn is_connect(&self) -> bool {
        matches!(self, UpstreamError::Connect(_))
    }
}

/// Sends a request to the backend in its URI authority.
///
/// Implementations are shared by every concurrent dispatch.
pub trait Upstream: Send + Sync + 'static {
    fn send(
        &self,
        request: Request<Body>,
    ) -> impl Future<Output = Result<Response<Body>, UpstreamError>> + Send;
}

/// [`Upstream`] over `hyper_util`'s pooled legacy client.
pub struct HyperUpstream<D: Dial> {
    client: Client<DialConnector<D>, Body>,
    response_header_timeout: Duration,
}

impl<D: Dial> HyperUpstream<D> {
    pub fn new(dialer: D, response_header_timeout: Duration) -> Self {
        let client = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_timer(TokioTimer::new())
            .build(DialConnector::new(dialer));

        Self {
            client,
            response_header_timeout,
        }
    }
}

impl<D: Dial> Clone for HyperUpstream<D> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            response_header_timeout: self.response_header_timeout,
        }
    }
}

impl<D: Dial> Upstream for HyperUpstream<D> {
    async fn send(&self, request: Request<Body>) -> Result<Response<Body>, UpstreamError> {
        match timeout(self.response_header_timeout, self.client.request(request)).await {
            Ok(Ok(response)) => {
                let (parts, body) = response.into_parts();
                Ok(Response::from_parts(parts, Body::new(body)))
            }
            Ok(Err(e)) if e.is_connect() => Err(UpstreamError::Connect(e.into())),
            Ok(Err(e)) => Err(UpstreamError::Request(e.into())),
            Err(_) => Err(UpstreamError::Request(
                "timed out waiting for response headers".into(),
            )),
        }
    }
}

/// Connector handing the client connections from a [`Dial`].
pub struct DialConnector<D> {
    dialer: Arc<D>,
}

impl<D> DialConnector<D> {
    pub fn new(dialer: D) -> Self {
        Self {
            dialer: Arc::new(dialer),
        }
    }
}

impl<D> Clone for DialConnector<D> {
    fn clone(&self) -> Self {
        Self {
            dialer: Arc::clone(&self.dialer),
        }
    }
}

impl<D: Dial> tower::Service<Uri> for DialConnector<D> {
    type Response = UpstreamIo<D::Conn>;
    type Error = DialError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, dst: Uri) -> Self::Future {
        let dialer = Arc::clone(&self.dialer);
        Box::pin(async move {
            let addr = dst
                .authority()
                .map(|a| a.as_str().to_string())
                .ok_or_else(|| {
                    DialError::new(
                        dst.to_string(),
                        io::Error::new(io::ErrorKind::InvalidInput, "missing authority"),
                    )
                })?;

            match dialer.dial(&addr).await {
                Ok(conn) => {
                    metrics::record_dial(true);
                    Ok(UpstreamIo::new(conn))
                }
                Err(e) => {
                    metrics::record_dial(false);
                    Err(e)
                }
            }
        })
    }
}

/// Dialed connection adapted to hyper's IO traits.
pub struct UpstreamIo<C> {
    inner: TokioIo<C>,
}

impl<C> UpstreamIo<C> {
    fn new(conn: C) -> Self {
        Self {
            inner: TokioIo::new(conn),
        }
    }
}

impl<C> Connection for UpstreamIo<C> {
    fn connected(&self) -> Connected {
        Connected::new()
    }
}

impl<C: AsyncRead + AsyncWrite + Unpin> hyper::rt::Read for UpstreamIo<C> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: hyper::rt::ReadBufCursor<'_>,
    ) -> Poll<io::Result<()>> {
        hyper::rt::Read::poll_read(Pin::new(&mut self.get_mut().inner), cx, buf)
    }
}

impl<C: AsyncRead + AsyncWrite + Unpin> hyper::rt::Write for UpstreamIo<C> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        hyper::rt::Write::poll_write(Pin::new(&mut self.get_mut().inner), cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        hyper::rt::Write::poll_flush(Pin::new(&mut self.get_mut().inner), cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        hyper::rt::Write::poll_shutdown(Pin::new(&mut self.get_mut().inner), cx)
    }

    fn is_write_vectored(&self) -> bool {
        hyper::rt::Write::is_write_vectored(&self.inner)
    }

    fn poll_write_vectored(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[io::IoSlice<'_>],
    ) -> Poll<io::Result<usize>> {
        hyper::rt::Write::poll_write_vectored(Pin::new(&mut self.get_mut().inner), cx, bufs)
    }
}
