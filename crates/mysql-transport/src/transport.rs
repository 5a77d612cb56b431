//! Connection transport adapter.
//!
//! Wraps a live [`Channel`] and keeps the facts the pool needs to decide
//! whether the connection may be reused: a derived [`Status`], the socket
//! addresses, and the TLS peer identity.

use std::net::SocketAddr;

use bytes::BytesMut;
use rustls::pki_types::CertificateDer;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::channel::{Channel, Stream};
use crate::connector::TlsConnector;
use crate::error::{Result, TransportError};
use crate::status::{Health, Status};

/// A network channel plus its health record.
///
/// Any I/O error on the channel is treated as fatal: it is recorded once and
/// the transport reports [`Status::Closed`] for the rest of its life.
#[derive(Debug)]
pub struct Transport<C: Channel = Stream> {
    channel: C,
    channel_open: bool,
    health: Health,
    local_addr: Option<SocketAddr>,
    remote_addr: Option<SocketAddr>,
    peer_identity: Option<CertificateDer<'static>>,
}

impl<C: Channel> Transport<C> {
    /// Wrap a connected channel.
    ///
    /// Addresses and the peer certificate are read once here. Failing to read
    /// the peer certificate is not an error; the identity is simply absent.
    pub fn new(channel: C) -> Self {
        let peer_identity = match channel.peer_certificates() {
            Ok(certs) => certs.and_then(|certs| certs.into_iter().next()),
            Err(e) => {
                tracing::debug!(error = %e, "could not extract peer certificate");
                None
            }
        };

        Self {
            local_addr: channel.local_addr().ok(),
            remote_addr: channel.peer_addr().ok(),
            peer_identity,
            channel,
            channel_open: true,
            health: Health::Healthy,
        }
    }

    /// Current liveness, derived from the failure record and the channel state.
    ///
    /// The channel is sampled with a non-consuming peek, so a peer that hung
    /// up while the connection sat idle is reported `Closed` before the next
    /// read.
    #[must_use]
    pub fn status(&self) -> Status {
        if self.health.is_failed() || !self.channel_open || self.channel.peer_closed() {
            Status::Closed
        } else {
            Status::Open
        }
    }

    /// Local socket address, if the channel reported one.
    #[must_use]
    pub fn local_address(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Remote socket address, if the channel reported one.
    #[must_use]
    pub fn remote_address(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    /// First certificate the peer presented during the TLS handshake.
    #[must_use]
    pub fn peer_identity(&self) -> Option<&CertificateDer<'static>> {
        self.peer_identity.as_ref()
    }

    /// Reason for the recorded fatal failure, if any.
    #[must_use]
    pub fn failure_reason(&self) -> Option<&str> {
        self.health.reason()
    }

    /// Get a reference to the underlying channel.
    #[must_use]
    pub fn get_ref(&self) -> &C {
        &self.channel
    }

    /// Write all bytes to the channel.
    pub async fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        self.ensure_usable()?;
        match self.channel.write_all(buf).await {
            Ok(()) => Ok(()),
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Flush the channel.
    pub async fn flush(&mut self) -> Result<()> {
        self.ensure_usable()?;
        match self.channel.flush().await {
            Ok(()) => Ok(()),
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Read bytes into `buf`.
    ///
    /// A read of zero bytes means the peer closed the channel.
    pub async fn read_buf(&mut self, buf: &mut BytesMut) -> Result<usize> {
        self.ensure_usable()?;
        match self.channel.read_buf(buf).await {
            Ok(0) => {
                tracing::debug!(remote = ?self.remote_addr, "channel closed by peer");
                self.channel_open = false;
                Ok(0)
            }
            Ok(n) => Ok(n),
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Shut down the write side of the channel.
    ///
    /// The transport reports [`Status::Closed`] afterwards.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.channel_open = false;
        if self.health.is_failed() {
            return Ok(());
        }
        match self.channel.shutdown().await {
            Ok(()) => Ok(()),
            Err(e) => Err(self.fail(e)),
        }
    }

    fn ensure_usable(&self) -> Result<()> {
        match self.health.reason() {
            Some(reason) => Err(TransportError::Failed {
                reason: reason.to_string(),
            }),
            None => Ok(()),
        }
    }

    fn fail(&mut self, err: std::io::Error) -> TransportError {
        tracing::warn!(
            remote = ?self.remote_addr,
            error = %err,
            "transport failure recorded; connection will not be reused"
        );
        self.health.record_failure(err.to_string());
        TransportError::Io(err)
    }
}

impl Transport<Stream> {
    /// Connect via plain TCP.
    pub async fn connect(host: &str, port: u16) -> Result<Self> {
        tracing::debug!(host = host, port = port, "establishing TCP connection");
        let stream = TcpStream::connect((host, port)).await?;
        stream.set_nodelay(true)?;
        Ok(Self::new(Stream::Plain(stream)))
    }

    /// Upgrade a plain TCP transport to TLS.
    ///
    /// Called after the SSLRequest packet has been written on the plain
    /// connection. Consumes `self` and returns a transport over the encrypted
    /// stream, with the peer identity captured from the handshake.
    pub async fn upgrade_to_tls(self, connector: &TlsConnector, server_name: &str) -> Result<Self> {
        self.ensure_usable()?;
        match self.channel {
            Stream::Plain(tcp) => {
                let tls = connector.connect(tcp, server_name).await?;
                Ok(Self::new(Stream::Tls(Box::new(tls))))
            }
            Stream::Tls(_) => Err(TransportError::AlreadyEncrypted),
        }
    }

    /// Check if the transport is TLS-encrypted.
    #[must_use]
    pub fn is_tls(&self) -> bool {
        self.channel.is_tls()
    }
}
