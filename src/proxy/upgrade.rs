//! HTTP/1 handshake over a raw backend connection.
//!
//! The upgrade path bypasses the pooled client so the socket stays ours after
//! the response head: the request is written by hand and the response head is
//! parsed with `httparse`. Whatever follows the head on the wire is left on
//! the returned [`BufferedStream`].

use axum::http::header::{CONTENT_LENGTH, HOST, TRANSFER_ENCODING};
use axum::http::request::Parts;
use axum::http::{Response, StatusCode, Version};
use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::ProxyError;
use crate::net::BufferedStream;

/// Largest response head accepted from a backend.
pub const MAX_RESPONSE_HEAD: usize = 64 * 1024;

const MAX_HEADERS: usize = 100;

/// Serialize the request head (and body framing) for `backend`.
///
/// The request target is origin-form. The client's `Host` header is kept;
/// without one, the original URI authority or else the backend is used.
/// Body framing headers are rewritten to match `body`.
pub fn encode_request(parts: &Parts, backend: &str, body: &[u8]) -> Vec<u8> {
    let target = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let version = match parts.version {
        Version::HTTP_10 => "HTTP/1.0",
        _ => "HTTP/1.1",
    };

    let mut head = Vec::with_capacity(256 + body.len());
    head.extend_from_slice(format!("{} {} {}\r\n", parts.method, target, version).as_bytes());

    if !parts.headers.contains_key(HOST) {
        let host = parts.uri.authority().map(|a| a.as_str()).unwrap_or(backend);
        head.extend_from_slice(format!("host: {host}\r\n").as_bytes());
    }

    for (name, value) in parts.headers.iter() {
        if name == CONTENT_LENGTH || name == TRANSFER_ENCODING {
            continue;
        }
        head.extend_from_slice(name.as_str().as_bytes());
        head.extend_from_slice(b": ");
        head.extend_from_slice(value.as_bytes());
        head.extend_from_slice(b"\r\n");
    }
    if !body.is_empty() {
        head.extend_from_slice(format!("content-length: {}\r\n", body.len()).as_bytes());
    }
    head.extend_from_slice(b"\r\n");
    head.extend_from_slice(body);
    head
}

/// Write an encoded request and flush it.
pub async fn write_request<C>(conn: &mut C, encoded: &[u8]) -> Result<(), ProxyError>
where
    C: AsyncWrite + Unpin,
{
    conn.write_all(encoded).await?;
    conn.flush().await?;
    Ok(())
}

/// Read one response head off `conn`.
///
/// Returns the parsed head and the connection with any bytes read past the
/// head still unread.
pub async fn read_response<C>(mut conn: C) -> Result<(Response<()>, BufferedStream<C>), ProxyError>
where
    C: AsyncRead + Unpin,
{
    let mut buf = BytesMut::with_capacity(4096);
    loop {
        if conn.read_buf(&mut buf).await? == 0 {
            return Err(ProxyError::MalformedResponse(
                "connection closed before response head".to_string(),
            ));
        }

        let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
        let mut parsed = httparse::Response::new(&mut headers);
        match parsed.parse(&buf) {
            Ok(httparse::Status::Complete(head_len)) => {
                let response = build_response(&parsed)?;
                let rest: Bytes = buf.split_off(head_len).freeze();
                return Ok((response, BufferedStream::new(rest, conn)));
            }
            Ok(httparse::Status::Partial) => {
                if buf.len() >= MAX_RESPONSE_HEAD {
                    return Err(ProxyError::MalformedResponse(
                        "response head too large".to_string(),
                    ));
                }
            }
            Err(e) => return Err(ProxyError::MalformedResponse(e.to_string())),
        }
    }
}

fn build_response(parsed: &httparse::Response<'_, '_>) -> Result<Response<()>, ProxyError> {
    let code = parsed
        .code
        .ok_or_else(|| ProxyError::MalformedResponse("missing status code".to_string()))?;
    let status = StatusCode::from_u16(code)
        .map_err(|e| ProxyError::MalformedResponse(e.to_string()))?;
    let version = match parsed.version {
        Some(0) => Version::HTTP_10,
        _ => Version::HTTP_11,
    };

    let mut builder = Response::builder().status(status).version(version);
    for header in parsed.headers.iter() {
        builder = builder.header(header.name, header.value);
    }
    builder
        .body(())
        .map_err(|e| ProxyError::MalformedResponse(e.to_string()))
}
