//! # mysql-testing
//!
//! Test infrastructure for MySQL session development.
//!
//! Everything here runs in memory; no server is required.
//!
//! - [`RequestLog`]: ordered record of requests across connections
//! - [`MockConnection`]: scripted [`ConnectionHandle`](mysql_session::ConnectionHandle)
//!   with canned responses, failures and hangs
//! - [`MockProvider`]: [`ConnectionProvider`](mysql_session::ConnectionProvider)
//!   that counts acquire/release calls
//!
//! ## Example
//!
//! ```rust,ignore
//! use mysql_session::{Error, session};
//! use mysql_testing::{MockProvider, ProviderEvent};
//!
//! #[tokio::test]
//! async fn test_lock_tables() {
//!     let provider = MockProvider::new();
//!     session(&provider, |s| {
//!         Box::pin(async move {
//!             s.query("LOCK TABLES t WRITE").await?;
//!             s.query("UNLOCK TABLES").await?;
//!             Ok::<_, Error>(())
//!         })
//!     })
//!     .await
//!     .unwrap();
//!
//!     assert_eq!(provider.log().statements(), ["LOCK TABLES t WRITE", "UNLOCK TABLES"]);
//!     assert_eq!(provider.events(), [ProviderEvent::Acquired(1), ProviderEvent::Released(1)]);
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod log;
pub mod mock_connection;
pub mod mock_provider;

pub use log::{LoggedRequest, RequestLog};
pub use mock_connection::{MockConnection, Script, StatusSwitch};
pub use mock_provider::{MockProvider, ProviderEvent};
