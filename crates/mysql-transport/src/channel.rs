//! Byte channels a transport can sit on.

use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context, Poll, Waker};

use rustls::pki_types::CertificateDer;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;

use crate::error::TransportError;

/// A live, bidirectional network channel.
pub trait Channel: AsyncRead + AsyncWrite + Unpin + Send {
    /// Local socket address.
    fn local_addr(&self) -> io::Result<SocketAddr>;

    /// Remote socket address.
    fn peer_addr(&self) -> io::Result<SocketAddr>;

    /// Certificates presented by the peer during a TLS handshake.
    ///
    /// `Ok(None)` when the channel is not encrypted.
    fn peer_certificates(&self) -> Result<Option<Vec<CertificateDer<'static>>>, TransportError> {
        Ok(None)
    }

    /// Check whether the peer has closed the channel, without consuming
    /// any buffered data.
    ///
    /// Only an end-of-stream that is already visible counts; bytes still
    /// waiting to be read keep the channel open.
    fn peer_closed(&self) -> bool {
        false
    }
}

/// Non-blocking peek at a TCP socket: closed on EOF or a socket error.
fn tcp_peer_closed(stream: &TcpStream) -> bool {
    let mut byte = [0u8; 1];
    let mut buf = ReadBuf::new(&mut byte);
    let mut cx = Context::from_waker(Waker::noop());
    matches!(
        stream.poll_peek(&mut cx, &mut buf),
        Poll::Ready(Ok(0) | Err(_))
    )
}

impl Channel for TcpStream {
    fn local_addr(&self) -> io::Result<SocketAddr> {
        TcpStream::local_addr(self)
    }

    fn peer_addr(&self) -> io::Result<SocketAddr> {
        TcpStream::peer_addr(self)
    }

    fn peer_closed(&self) -> bool {
        tcp_peer_closed(self)
    }
}

impl Channel for TlsStream<TcpStream> {
    fn local_addr(&self) -> io::Result<SocketAddr> {
        self.get_ref().0.local_addr()
    }

    fn peer_addr(&self) -> io::Result<SocketAddr> {
        self.get_ref().0.peer_addr()
    }

    fn peer_certificates(&self) -> Result<Option<Vec<CertificateDer<'static>>>, TransportError> {
        let (_tcp, conn) = self.get_ref();
        Ok(conn.peer_certificates().map(<[CertificateDer<'static>]>::to_vec))
    }

    fn peer_closed(&self) -> bool {
        tcp_peer_closed(&self.get_ref().0)
    }
}

/// TCP stream, plain or TLS-encrypted.
#[allow(clippy::large_enum_variant)]
pub enum Stream {
    /// Plain TCP connection.
    Plain(TcpStream),
    /// TLS-encrypted TCP connection.
    Tls(Box<TlsStream<TcpStream>>),
}

impl Stream {
    /// Check if the stream is TLS-encrypted.
    #[must_use]
    pub fn is_tls(&self) -> bool {
        matches!(self, Self::Tls(_))
    }
}

impl std::fmt::Debug for Stream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Plain(_) => f.write_str("Stream::Plain(TcpStream)"),
            Self::Tls(_) => f.write_str("Stream::Tls(TlsStream)"),
        }
    }
}

impl Channel for Stream {
    fn local_addr(&self) -> io::Result<SocketAddr> {
        match self {
            Self::Plain(stream) => stream.local_addr(),
            Self::Tls(stream) => Channel::local_addr(&**stream),
        }
    }

    fn peer_addr(&self) -> io::Result<SocketAddr> {
        match self {
            Self::Plain(stream) => stream.peer_addr(),
            Self::Tls(stream) => Channel::peer_addr(&**stream),
        }
    }

    fn peer_certificates(&self) -> Result<Option<Vec<CertificateDer<'static>>>, TransportError> {
        match self {
            Self::Plain(_) => Ok(None),
            Self::Tls(stream) => Channel::peer_certificates(&**stream),
        }
    }

    fn peer_closed(&self) -> bool {
        match self {
            Self::Plain(stream) => tcp_peer_closed(stream),
            Self::Tls(stream) => Channel::peer_closed(&**stream),
        }
    }
}

impl AsyncRead for Stream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_read(cx, buf),
            Self::Tls(stream) => Pin::new(stream.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for Stream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_write(cx, buf),
            Self::Tls(stream) => Pin::new(stream.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_flush(cx),
            Self::Tls(stream) => Pin::new(stream.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_shutdown(cx),
            Self::Tls(stream) => Pin::new(stream.as_mut()).poll_shutdown(cx),
        }
    }
}
