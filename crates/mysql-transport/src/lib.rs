//! # mysql-transport
//!
//! Connection transport adapter for MySQL sessions.
//!
//! A [`Transport`] wraps a live network channel and answers the questions the
//! connection pool asks before reusing a connection:
//!
//! - [`Transport::status`]: `Open` while the channel is open and no fatal
//!   I/O failure has been seen, `Closed` otherwise. The transition is one-way.
//! - [`Transport::local_address`] / [`Transport::remote_address`]
//! - [`Transport::peer_identity`]: the certificate the server presented, when
//!   the connection was upgraded to TLS.
//!
//! ## TLS
//!
//! MySQL negotiates TLS in-band. The client connects in plain TCP, sends an
//! SSLRequest, then upgrades the same socket:
//!
//! ```text
//! TCP Connect → Handshake (cleartext) → SSLRequest → TLS Handshake → HandshakeResponse (encrypted)
//! ```
//!
//! ```rust,ignore
//! use mysql_transport::{TlsConfig, TlsConnector, Transport};
//!
//! let connector = TlsConnector::new(TlsConfig::new())?;
//! let transport = Transport::connect("db.internal", 3306).await?;
//! // ... read the server handshake, write the SSLRequest ...
//! let transport = transport.upgrade_to_tls(&connector, "db.internal").await?;
//! assert!(transport.peer_identity().is_some());
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod channel;
pub mod config;
pub mod connector;
pub mod error;
pub mod status;
pub mod transport;

pub use channel::{Channel, Stream};
pub use config::TlsConfig;
pub use connector::TlsConnector;
pub use error::{Result, TlsError, TransportError};
pub use status::Status;
pub use transport::Transport;

// Re-export the certificate type returned by `Transport::peer_identity`.
pub use rustls::pki_types::CertificateDer;
