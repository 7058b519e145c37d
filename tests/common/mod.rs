//! Shared utilities for integration testing.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use router_proxy::net::{Dial, DialError, TcpDialer};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Request as seen by a mock backend.
pub struct SeenRequest {
    pub host: String,
    pub body: Vec<u8>,
}

/// Read one request (head plus `Content-Length` body) off `socket`.
///
/// Returns the request and any bytes that arrived after it.
pub async fn read_request(socket: &mut TcpStream) -> Option<(SeenRequest, Vec<u8>)> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);

        let mut headers = [httparse::EMPTY_HEADER; 64];
        let mut req = httparse::Request::new(&mut headers);
        if let Ok(httparse::Status::Complete(head_len)) = req.parse(&buf) {
            let header = |name: &str| {
                req.headers
                    .iter()
                    .find(|h| h.name.eq_ignore_ascii_case(name))
                    .map(|h| String::from_utf8_lossy(h.value).to_string())
            };
            let host = header("host").unwrap_or_default();
            let len: usize = header("content-length")
                .and_then(|v| v.parse().ok())
                .unwrap_or(0);

            let mut rest = buf[head_len..].to_vec();
            while rest.len() < len {
                let n = socket.read(&mut chunk).await.ok()?;
                if n == 0 {
                    return None;
                }
                rest.extend_from_slice(&chunk[..n]);
            }
            let extra = rest.split_off(len);
            return Some((SeenRequest { host, body: rest }, extra));
        }
    }
}

/// Start a mock backend that answers every request with its own name.
///
/// A non-empty request body is echoed instead of the name. The `Host` the
/// backend saw is returned in `X-Seen-Host`.
pub async fn start_mock_backend(name: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    tokio::spawn(async move {
                        let Some((seen, _)) = read_request(&mut socket).await else {
                            return;
                        };
                        let body = if seen.body.is_empty() {
                            name.as_bytes().to_vec()
                        } else {
                            seen.body
                        };
                        let head = format!(
                            "HTTP/1.1 200 OK\r\nX-Backend: {}\r\nX-Seen-Host: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                            name,
                            seen.host,
                            body.len()
                        );
                        let _ = socket.write_all(head.as_bytes()).await;
                        let _ = socket.write_all(&body).await;
                        let _ = socket.shutdown().await;
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// Start a backend that accepts any upgrade, sends `welcome` right behind
/// the 101 head, then echoes everything back.
pub async fn start_upgrade_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    tokio::spawn(async move {
                        let Some((_, extra)) = read_request(&mut socket).await else {
                            return;
                        };
                        let _ = socket
                            .write_all(
                                b"HTTP/1.1 101 Switching Protocols\r\nUpgrade: echo\r\nConnection: Upgrade\r\n\r\nwelcome",
                            )
                            .await;
                        if !extra.is_empty() {
                            let _ = socket.write_all(&extra).await;
                        }

                        let mut buf = [0u8; 1024];
                        loop {
                            match socket.read(&mut buf).await {
                                Ok(0) | Err(_) => break,
                                Ok(n) => {
                                    if socket.write_all(&buf[..n]).await.is_err() {
                                        break;
                                    }
                                }
                            }
                        }
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// An address nothing listens on.
pub async fn unused_addr() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().to_string()
}

/// TCP dialer that records every address it is asked to dial.
#[derive(Clone, Default)]
pub struct RecordingDialer {
    inner: TcpDialer,
    attempts: Arc<Mutex<Vec<String>>>,
}

impl RecordingDialer {
    pub fn attempts(&self) -> Vec<String> {
        self.attempts.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.attempts.lock().unwrap().clear();
    }
}

impl Dial for RecordingDialer {
    type Conn = TcpStream;

    async fn dial(&self, addr: &str) -> Result<TcpStream, DialError> {
        self.attempts.lock().unwrap().push(addr.to_string());
        self.inner.dial(addr).await
    }
}
