//! A small async client for the beanstalkd work-queue protocol.
//!
//! This crate is the layer the session machinery in
//! `beanstalk-resilience-reconnect` sits on top of:
//!
//! - [`Conn`]: one async method per protocol command over any
//!   `AsyncRead + AsyncWrite` transport
//! - [`Tube`] / [`TubeSet`]: names for tube-scoped commands and reservations
//! - [`Error`]: network failures and server replies kept structurally apart
//! - [`TcpDialer`] / [`Endpoint`]: the default transport factory
//!
//! # Examples
//!
//! ```no_run
//! use beanstalk_resilience_proto::{Conn, Endpoint, TcpDialer, Tube};
//! use std::time::Duration;
//! use tower::ServiceExt;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let stream = TcpDialer::default()
//!     .oneshot(Endpoint::tcp("127.0.0.1:11300"))
//!     .await?;
//! let mut conn = Conn::new(stream);
//!
//! let id = conn
//!     .put(&Tube::new("emails"), b"hello", 1024, Duration::ZERO, Duration::from_secs(60))
//!     .await?;
//! conn.delete(id).await?;
//! # Ok(())
//! # }
//! ```

mod conn;
mod dial;
mod error;
mod tube;
mod yaml;

pub use conn::{Conn, MAX_BODY_LEN};
pub use dial::{Endpoint, NetStream, Network, TcpDialer, DEFAULT_DIAL_TIMEOUT};
pub use error::{Error, ProtocolError, Result};
pub use tube::{check_name, Tube, TubeSet, DEFAULT_TUBE, MAX_NAME_LEN};
