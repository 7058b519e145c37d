//! Backend dialing.
//!
//! # Responsibilities
//! - Connect to one backend with a bounded timeout and TCP keep-alive
//! - Walk an ordered candidate list until one connects
//! - Keep "could not connect" apart from everything that can go wrong later

use std::future::Future;
use std::io;
use std::time::Duration;

use socket2::{SockRef, TcpKeepalive};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::error::ProxyError;
use crate::lifecycle::CancelSignal;
use crate::observability::metrics;

/// Default connect timeout per backend.
pub const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(1);

/// Default TCP keep-alive idle time for backend connections.
pub const DEFAULT_KEEPALIVE: Duration = Duration::from_secs(30);

/// A connection to one backend could not be established.
///
/// Always retryable against the next candidate.
#[derive(Debug, Error)]
#[error("dial {addr}: {source}")]
pub struct DialError {
    pub addr: String,
    #[source]
    pub source: io::Error,
}

impl DialError {
    pub fn new(addr: impl Into<String>, source: io::Error) -> Self {
        Self {
            addr: addr.into(),
            source,
        }
    }
}

/// Opens raw connections to backend addresses.
pub trait Dial: Send + Sync + 'static {
    type Conn: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    fn dial(&self, addr: &str) -> impl Future<Output = Result<Self::Conn, DialError>> + Send;
}

/// TCP dialer with a connect timeout and keep-alive.
#[derive(Debug, Clone)]
pub struct TcpDialer {
    connect_timeout: Duration,
    keepalive: Option<Duration>,
}

impl TcpDialer {
    pub fn new(connect_timeout: Duration, keepalive: Option<Duration>) -> Self {
        Self {
            connect_timeout,
            keepalive,
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }
}

impl Default for TcpDialer {
    fn default() -> Self {
        Self::new(DEFAULT_DIAL_TIMEOUT, Some(DEFAULT_KEEPALIVE))
    }
}

impl Dial for TcpDialer {
    type Conn = TcpStream;

    async fn dial(&self, addr: &str) -> Result<TcpStream, DialError> {
        let stream = match timeout(self.connect_timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(DialError::new(addr, e)),
            Err(_) => {
                return Err(DialError::new(
                    addr,
                    io::Error::new(io::ErrorKind::TimedOut, "connect timeout"),
                ))
            }
        };

        if let Some(idle) = self.keepalive {
            SockRef::from(&stream)
                .set_tcp_keepalive(&TcpKeepalive::new().with_time(idle))
                .map_err(|e| DialError::new(addr, e))?;
        }
        stream.set_nodelay(true).map_err(|e| DialError::new(addr, e))?;

        Ok(stream)
    }
}

/// Dial `addrs` in order and return the first connection that succeeds.
///
/// `cancel` is checked before every attempt. Running out of candidates is
/// [`ProxyError::NoBackends`]; observing cancellation is
/// [`ProxyError::Canceled`].
pub async fn dial_ordered<D: Dial>(
    dialer: &D,
    addrs: &[String],
    cancel: &CancelSignal,
) -> Result<(D::Conn, String), ProxyError> {
    for (attempt, addr) in addrs.iter().enumerate() {
        if cancel.is_cancelled() {
            tracing::debug!(attempt, "Dial loop canceled");
            return Err(ProxyError::Canceled);
        }

        match dialer.dial(addr).await {
            Ok(conn) => {
                metrics::record_dial(true);
                if attempt > 0 {
                    tracing::info!(backend = %addr, attempt, "Connected after failover");
                }
                return Ok((conn, addr.clone()));
            }
            Err(e) => {
                metrics::record_dial(false);
                tracing::debug!(backend = %addr, attempt, error = %e, "Backend dial failed");
            }
        }
    }

    tracing::warn!(candidates = addrs.len(), "No backend accepted a connection");
    Err(ProxyError::NoBackends)
}
