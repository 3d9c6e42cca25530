//! Self-healing beanstalkd sessions.
//!
//! A [`Reconn`] keeps one logical session to a beanstalkd server alive
//! across transport failures, so callers never handle reconnection
//! themselves.
//!
//! # Features
//!
//! - **Lazy dialing**: the transport is established by the first command
//! - **Structural error split**: network failures drop the transport and
//!   replay the command on a fresh one; server replies such as `NOT_FOUND`
//!   are returned untouched
//! - **Configurable backoff**: immediate, fixed, exponential or jittered
//!   delays between dials, bounded by cancellation or an attempt cap
//! - **Tube bindings**: [`Retube`] and [`Retubeset`] borrow the session and
//!   always talk to its current transport
//! - **Event system**: observe dials, drops and give-ups through
//!   [`ReconnectEvent`]
//!
//! # Examples
//!
//! ```no_run
//! use beanstalk_resilience_reconnect::{
//!     CancellationToken, Endpoint, Reconn, ReconnectConfig, ReconnectPolicy,
//! };
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ReconnectConfig::builder()
//!     .policy(ReconnectPolicy::exponential(
//!         Duration::from_millis(100),
//!         Duration::from_secs(5),
//!     ))
//!     .name("mailer")
//!     .build();
//!
//! let mut reconn = Reconn::new(Endpoint::tcp("127.0.0.1:11300"), config);
//! let cancel = CancellationToken::new();
//!
//! let id = reconn
//!     .tube("emails")
//!     .put(&cancel, b"hello", 1024, Duration::ZERO, Duration::from_secs(60))
//!     .await?;
//!
//! let (job, body) = reconn
//!     .tube_set(["emails"])
//!     .reserve(Duration::from_secs(5))
//!     .await?;
//! assert_eq!(job, id);
//! assert_eq!(body, b"hello");
//!
//! reconn.delete(&cancel, job).await?;
//! reconn.close().await?;
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod events;
mod policy;
mod reconn;
mod retube;
mod retubeset;
mod state;

pub use config::{ReconnectConfig, ReconnectConfigBuilder};
pub use error::{ReconnectError, Result};
pub use events::{GiveUpReason, ReconnectEvent};
pub use policy::ReconnectPolicy;
pub use reconn::Reconn;
pub use retube::Retube;
pub use retubeset::Retubeset;
pub use state::{ConnectionState, ReconnectState};

pub use beanstalk_resilience_core::{
    EventListener, ExponentialBackoff, ExponentialRandomBackoff, FixedInterval, FnInterval,
    FnListener, IntervalFunction,
};
pub use beanstalk_resilience_proto::{Conn, Endpoint, ProtocolError, TcpDialer};
pub use tokio_util::sync::CancellationToken;
