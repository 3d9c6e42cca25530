//! Reservations over a reconnecting session.

use std::io;
use std::time::Duration;

use beanstalk_resilience_proto::{Endpoint, TubeSet};
use tower::make::MakeConnection;

use crate::error::Result;
use crate::reconn::{ConnectMode, Reconn};

/// A [`Reconn`] bound to a set of tubes to reserve from.
///
/// Reservation already waits server-side for up to its timeout, so it does
/// not sit in the dial loop the other commands use: when no transport is
/// live it dials exactly once and returns the dial error if that fails.
pub struct Retubeset<'a, D = beanstalk_resilience_proto::TcpDialer>
where
    D: MakeConnection<Endpoint>,
{
    conn: &'a mut Reconn<D>,
    tubes: TubeSet,
}

impl<'a, D> Retubeset<'a, D>
where
    D: MakeConnection<Endpoint, Error = io::Error>,
    D::Connection: Unpin,
{
    pub(crate) fn new(conn: &'a mut Reconn<D>, tubes: TubeSet) -> Self {
        Self { conn, tubes }
    }

    /// The tubes reserved from.
    pub fn tubes(&self) -> &TubeSet {
        &self.tubes
    }

    /// The underlying session.
    pub fn conn(&mut self) -> &mut Reconn<D> {
        self.conn
    }

    /// Reserves a job from any of the tubes, waiting up to `timeout` for one.
    ///
    /// If nothing becomes ready in time the server answers `TIMED_OUT`,
    /// surfaced as a protocol error. A transport failure during the call
    /// drops the connection and is returned as a network error, unless the
    /// session was configured with
    /// [`retry_reserve`](crate::ReconnectConfigBuilder::retry_reserve), in
    /// which case the reservation is reissued once on a fresh transport.
    ///
    /// Dropping the returned future after the request went out, for example
    /// under `tokio::time::timeout` or in a losing `select!` branch, leaves
    /// its reply unread. The session then discards that transport before
    /// the next command instead of reading the stale reply. A job the
    /// server reserved for the dropped call is released only when its TTR
    /// expires, so prefer a server-side `timeout` over cancelling the call.
    pub async fn reserve(&mut self, timeout: Duration) -> Result<(u64, Vec<u8>)> {
        const OP: &str = "reserve-with-timeout";

        let mut retries_left = u8::from(self.conn.retry_reserve());
        loop {
            let result = self
                .conn
                .ensure(ConnectMode::Once)
                .await?
                .reserve(&self.tubes, timeout)
                .await;
            match result {
                Err(err) if err.is_network() => {
                    self.conn.discard(OP, &err);
                    if retries_left == 0 {
                        return Err(err.into());
                    }
                    retries_left -= 1;
                }
                other => return other.map_err(Into::into),
            }
        }
    }

    /// Closes the shared session.
    pub async fn close(&mut self) -> Result<()> {
        self.conn.close().await
    }
}
