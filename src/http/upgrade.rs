//! Protocol upgrade handling.
//!
//! # Responsibilities
//! - Detect upgrade requests (`Connection: upgrade`)
//! - Run the handshake against a backend through the transport
//! - Splice the upgraded client connection to the backend connection
//!
//! # Data Flow
//! ```text
//! Client ←──── raw bytes ────→ Proxy ←──── raw bytes ────→ Backend
//! ```
//!
//! # Design Decisions
//! - Byte-level forwarding; the proxy never looks at frames
//! - A non-101 answer is relayed as an ordinary response, body decoded
//! - Splicing runs on its own task so the 101 can be sent first

use axum::body::Body;
use axum::http::header::{CONNECTION, CONTENT_LENGTH, TRANSFER_ENCODING};
use axum::http::response::Parts;
use axum::http::{HeaderMap, Request, Response, StatusCode, Version};
use bytes::{Buf, BytesMut};
use hyper_util::rt::TokioIo;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::ProxyError;
use crate::http::server::AppState;
use crate::proxy::transport::MAX_UPGRADE_BODY;

/// Whether the request asks to switch protocols.
pub fn is_upgrade_request(headers: &HeaderMap) -> bool {
    has_connection_token(headers, "upgrade")
}

fn has_connection_token(headers: &HeaderMap, token: &str) -> bool {
    headers
        .get_all(CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|t| t.trim().eq_ignore_ascii_case(token))
}

/// Forward an upgrade request and, on 101, splice the two connections.
pub async fn forward_upgrade(
    state: &AppState,
    mut request: Request<Body>,
) -> Result<Response<Body>, ProxyError> {
    let client_upgrade = hyper::upgrade::on(&mut request);
    let (head, mut backend) = state.transport.upgrade(request, &state.shutdown).await?;
    let (mut parts, ()) = head.into_parts();

    if parts.status != StatusCode::SWITCHING_PROTOCOLS {
        let body = read_body(&parts, &mut backend).await?;
        parts.headers.remove(TRANSFER_ENCODING);
        parts.headers.remove(CONTENT_LENGTH);
        return Ok(Response::from_parts(parts, Body::from(body)));
    }

    tokio::spawn(async move {
        let upgraded = match client_upgrade.await {
            Ok(upgraded) => upgraded,
            Err(e) => {
                tracing::warn!(error = %e, "Client connection upgrade failed");
                return;
            }
        };

        let mut client = TokioIo::new(upgraded);
        match tokio::io::copy_bidirectional(&mut client, &mut backend).await {
            Ok((to_backend, to_client)) => {
                tracing::debug!(to_backend, to_client, "Upgraded connection closed");
            }
            Err(e) => tracing::debug!(error = %e, "Upgraded connection ended with error"),
        }
    });

    Ok(Response::from_parts(parts, Body::empty()))
}

/// Longest chunk-size line accepted, extensions included.
const MAX_CHUNK_LINE: usize = 4096;

/// Read the body of a non-101 answer, honouring its framing.
///
/// Chunked and `Content-Length` bodies are decoded. A body without either is
/// read to EOF only when the backend said it will close the connection;
/// otherwise it is dropped. Bodies over [`MAX_UPGRADE_BODY`] are rejected.
async fn read_body<C>(head: &Parts, conn: &mut C) -> Result<Vec<u8>, ProxyError>
where
    C: AsyncRead + Unpin,
{
    if head.status.is_informational()
        || head.status == StatusCode::NO_CONTENT
        || head.status == StatusCode::NOT_MODIFIED
    {
        return Ok(Vec::new());
    }

    if is_chunked(&head.headers) {
        return read_chunked_body(conn).await;
    }

    if let Some(len) = content_length(&head.headers)? {
        if len > MAX_UPGRADE_BODY {
            return Err(body_too_large(len));
        }
        let mut body = vec![0u8; len];
        conn.read_exact(&mut body).await?;
        return Ok(body);
    }

    if head.version == Version::HTTP_10 || has_connection_token(&head.headers, "close") {
        let mut body = Vec::new();
        (&mut *conn)
            .take(MAX_UPGRADE_BODY as u64 + 1)
            .read_to_end(&mut body)
            .await?;
        if body.len() > MAX_UPGRADE_BODY {
            return Err(body_too_large(body.len()));
        }
        return Ok(body);
    }

    tracing::debug!(status = %head.status, "Dropping upgrade response body without length framing");
    Ok(Vec::new())
}

fn is_chunked(headers: &HeaderMap) -> bool {
    headers
        .get_all(TRANSFER_ENCODING)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .last()
        .is_some_and(|coding| coding.trim().eq_ignore_ascii_case("chunked"))
}

fn content_length(headers: &HeaderMap) -> Result<Option<usize>, ProxyError> {
    let Some(value) = headers.get(CONTENT_LENGTH) else {
        return Ok(None);
    };
    value
        .to_str()
        .ok()
        .and_then(|v| v.trim().parse::<usize>().ok())
        .map(Some)
        .ok_or_else(|| ProxyError::MalformedResponse("invalid content-length".to_string()))
}

async fn read_chunked_body<C>(conn: &mut C) -> Result<Vec<u8>, ProxyError>
where
    C: AsyncRead + Unpin,
{
    let mut buf = BytesMut::with_capacity(4096);
    let mut body = Vec::new();
    loop {
        let (line_len, size) = loop {
            match httparse::parse_chunk_size(&buf) {
                Ok(httparse::Status::Complete(parsed)) => break parsed,
                Ok(httparse::Status::Partial) if buf.len() < MAX_CHUNK_LINE => {
                    fill(conn, &mut buf).await?;
                }
                _ => {
                    return Err(ProxyError::MalformedResponse(
                        "invalid chunk size".to_string(),
                    ))
                }
            }
        };
        buf.advance(line_len);
        if size == 0 {
            // trailers are not relayed
            return Ok(body);
        }

        let size = match usize::try_from(size) {
            Ok(size) if size <= MAX_UPGRADE_BODY - body.len() => size,
            _ => {
                return Err(ProxyError::MalformedResponse(
                    "chunked response body exceeds limit".to_string(),
                ))
            }
        };
        while buf.len() < size + 2 {
            fill(conn, &mut buf).await?;
        }
        if &buf[size..size + 2] != b"\r\n" {
            return Err(ProxyError::MalformedResponse(
                "chunk not terminated by CRLF".to_string(),
            ));
        }
        body.extend_from_slice(&buf[..size]);
        buf.advance(size + 2);
    }
}

async fn fill<C>(conn: &mut C, buf: &mut BytesMut) -> Result<(), ProxyError>
where
    C: AsyncRead + Unpin,
{
    if conn.read_buf(buf).await? == 0 {
        return Err(ProxyError::MalformedResponse(
            "connection closed inside chunked body".to_string(),
        ));
    }
    Ok(())
}

fn body_too_large(len: usize) -> ProxyError {
    ProxyError::MalformedResponse(format!("response body of {len} bytes exceeds limit"))
}
