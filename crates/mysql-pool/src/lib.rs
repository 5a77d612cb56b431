//! # mysql-pool
//!
//! Connection pool for MySQL sessions.
//!
//! [`Pool`] implements [`ConnectionProvider`](mysql_session::ConnectionProvider),
//! so it plugs straight into [`mysql_session::session`]. Its reuse decision
//! follows what the session reports on release:
//!
//! - `release` of a connection that is `Open`, unpoisoned and within its
//!   lifetime puts it back in the idle queue
//! - `release_poisoned` always closes the connection
//! - a connection whose transport reports `Closed` is never reused
//!
//! The poison marker sent by [`Session::discard`](mysql_session::Session::discard)
//! is absorbed by [`PooledConnection`]; it never reaches the server.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::time::Duration;
//! use mysql_pool::{Pool, PoolConfig};
//! use mysql_session::{Error, session};
//!
//! let config = PoolConfig::new()
//!     .max_connections(20)
//!     .idle_timeout(Duration::from_secs(300));
//!
//! let pool = Pool::new(factory, config)?;
//! session(&pool, |s| {
//!     Box::pin(async move {
//!         s.query("SELECT 1").await?;
//!         Ok::<_, Error>(())
//!     })
//! })
//! .await?;
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod lifecycle;
pub mod pool;

pub use config::PoolConfig;
pub use error::PoolError;
pub use lifecycle::{ConnectionFactory, ConnectionMetadata};
pub use pool::{Pool, PoolStatus, PooledConnection};
