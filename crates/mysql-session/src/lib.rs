//! # mysql-session
//!
//! Session and transaction overlay for pooled MySQL connections.
//!
//! A [`session`] binds one connection from a [`ConnectionProvider`] to a piece
//! of caller logic. Everything inside the body, plain queries and any number
//! of transactions, runs on that same connection, so connection-scoped state
//! such as `LOCK TABLES`, user variables, or temporary tables stays visible
//! from start to finish.
//!
//! ## Guarantees
//!
//! - Exactly one `acquire` per session, and exactly one `release` or
//!   `release_poisoned` afterwards, on every exit path including
//!   cancellation.
//! - [`Session::transaction`] frames its body with `START TRANSACTION` and
//!   `COMMIT`; a failing body is followed by `ROLLBACK` and its error is
//!   returned unchanged.
//! - [`Session::discard`] sends a poison marker so the provider evicts the
//!   connection instead of pooling it.
//!
//! ## Example
//!
//! ```rust,ignore
//! use mysql_session::{Error, session};
//!
//! session(&pool, |s| {
//!     Box::pin(async move {
//!         s.query("LOCK TABLES ledger WRITE").await?;
//!         s.transaction(|tx| {
//!             Box::pin(async move {
//!                 tx.query("INSERT INTO ledger (amount) VALUES (10)").await?;
//!                 Ok::<_, Error>(())
//!             })
//!         })
//!         .await?;
//!         s.query("UNLOCK TABLES").await?;
//!         Ok::<_, Error>(())
//!     })
//! })
//! .await?;
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod handle;
pub mod request;
pub mod session;
pub mod state;
pub mod transaction;

pub use config::SessionConfig;
pub use error::{ConnectionError, Error, ProtocolError, Result};
pub use handle::{ConnectionHandle, ConnectionProvider};
pub use request::{ControlStatement, OkPacket, Request, Response, ResultSet};
pub use session::{Session, session, session_with_config};
pub use state::SessionState;
pub use transaction::{IsolationLevel, Transaction};

// Re-exported so callers can name the body return type.
pub use futures_util::future::BoxFuture;
pub use mysql_transport::Status;
