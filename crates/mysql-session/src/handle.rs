//! Connection handle and provider contracts.
//!
//! Both traits use `#[async_trait]` so that their futures are `Send` and the
//! traits stay object-safe.

use mysql_transport::Status;

use crate::error::{ConnectionError, ProtocolError};
use crate::request::{Request, Response};

/// A single logical connection that executes one request at a time.
///
/// Implementations wrap the wire codec. The session never issues a second
/// request before the previous `send` has completed.
#[async_trait::async_trait]
pub trait ConnectionHandle: Send {
    /// Send one request and wait for its response.
    async fn send(&mut self, request: Request) -> Result<Response, ProtocolError>;

    /// Liveness of the underlying transport.
    fn status(&self) -> Status {
        Status::Open
    }
}

/// Produces connection handles and takes them back.
///
/// A session calls [`acquire`](Self::acquire) once, then exactly one of
/// [`release`](Self::release) or [`release_poisoned`](Self::release_poisoned).
/// It never calls [`close`](Self::close); the provider's lifetime belongs to
/// whoever created it.
#[async_trait::async_trait]
pub trait ConnectionProvider: Send + Sync {
    /// Handle type produced by this provider.
    type Handle: ConnectionHandle;

    /// Produce a handle. Retry policy, if any, lives here.
    async fn acquire(&self) -> Result<Self::Handle, ConnectionError>;

    /// Return a handle that may be reused.
    fn release(&self, handle: Self::Handle);

    /// Return a handle that must be evicted instead of reused.
    fn release_poisoned(&self, handle: Self::Handle);

    /// Shut the provider down.
    async fn close(&self) {}
}
