//! Raw backend connection with read-ahead replay.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::{Buf, Bytes};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

/// A connection that first yields bytes already read off it.
///
/// Parsing an upgrade response head usually reads past the head; those bytes
/// belong to the tunnel and are replayed before the socket is read again.
#[derive(Debug)]
pub struct BufferedStream<S> {
    buffered: Bytes,
    inner: S,
}

impl<S> BufferedStream<S> {
    pub fn new(buffered: Bytes, inner: S) -> Self {
        Self { buffered, inner }
    }

    /// Bytes not yet handed to a reader.
    pub fn buffered(&self) -> &[u8] {
        &self.buffered
    }

    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    pub fn into_parts(self) -> (Bytes, S) {
        (self.buffered, self.inner)
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for BufferedStream<S> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if this.buffered.has_remaining() {
            let n = this.buffered.len().min(buf.remaining());
            buf.put_slice(&this.buffered[..n]);
            this.buffered.advance(n);
            return Poll::Ready(Ok(()));
        }
        Pin::new(&mut this.inner).poll_read(cx, buf)
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for BufferedStream<S> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().inner).poll_write(cx, buf)
    }

    fn poll_write_vectored(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[io::IoSlice<'_>],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().inner).poll_write_vectored(cx, bufs)
    }

    fn is_write_vectored(&self) -> bool {
        self.inner.is_write_vectored()
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn replays_buffered_bytes_first() {
        let (near, mut far) = tokio::io::duplex(64);
        let mut stream = BufferedStream::new(Bytes::from_static(b"early"), near);

        far.write_all(b" late").await.unwrap();
        drop(far);

        let mut out = String::new();
        stream.read_to_string(&mut out).await.unwrap();
        assert_eq!(out, "early late");
    }

    #[tokio::test]
    async fn small_reads_drain_buffer_in_pieces() {
        let (near, _far) = tokio::io::duplex(64);
        let mut stream = BufferedStream::new(Bytes::from_static(b"abcdef"), near);

        let mut chunk = [0u8; 4];
        let n = stream.read(&mut chunk).await.unwrap();
        assert_eq!(&chunk[..n], b"abcd");
        assert_eq!(stream.buffered(), b"ef");
    }

    #[tokio::test]
    async fn writes_pass_through() {
        let (near, mut far) = tokio::io::duplex(64);
        let mut stream = BufferedStream::new(Bytes::new(), near);

        stream.write_all(b"ping").await.unwrap();
        let mut buf = [0u8; 4];
        far.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");
    }
}
