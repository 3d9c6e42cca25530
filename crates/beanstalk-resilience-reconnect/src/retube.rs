//! Tube-scoped commands over a reconnecting session.

use std::collections::HashMap;
use std::io;
use std::time::Duration;

use beanstalk_resilience_proto::{Endpoint, Tube};
use tokio_util::sync::CancellationToken;
use tower::make::MakeConnection;

use crate::error::Result;
use crate::reconn::{ConnectMode, Reconn};

/// A [`Reconn`] bound to one tube.
///
/// The binding borrows the session and never holds a transport of its own:
/// each command fetches whatever connection the session has at that moment,
/// so commands keep working after a redial. The tube is re-selected with
/// `use` on a fresh transport automatically.
pub struct Retube<'a, D = beanstalk_resilience_proto::TcpDialer>
where
    D: MakeConnection<Endpoint>,
{
    conn: &'a mut Reconn<D>,
    tube: Tube,
}

impl<'a, D> Retube<'a, D>
where
    D: MakeConnection<Endpoint, Error = io::Error>,
    D::Connection: Unpin,
{
    pub(crate) fn new(conn: &'a mut Reconn<D>, tube: Tube) -> Self {
        Self { conn, tube }
    }

    /// The tube name.
    pub fn name(&self) -> &str {
        self.tube.name()
    }

    /// The underlying session.
    pub fn conn(&mut self) -> &mut Reconn<D> {
        self.conn
    }

    /// Puts a job into the tube and returns its id.
    pub async fn put(
        &mut self,
        cancel: &CancellationToken,
        body: &[u8],
        pri: u32,
        delay: Duration,
        ttr: Duration,
    ) -> Result<u64> {
        loop {
            let result = self
                .conn
                .ensure(ConnectMode::Retry(cancel))
                .await?
                .put(&self.tube, body, pri, delay, ttr)
                .await;
            if let Some(done) = self.conn.settle("put", result) {
                return done;
            }
        }
    }

    /// Returns the next ready job in the tube.
    pub async fn peek_ready(&mut self, cancel: &CancellationToken) -> Result<(u64, Vec<u8>)> {
        loop {
            let result = self
                .conn
                .ensure(ConnectMode::Retry(cancel))
                .await?
                .peek_ready(&self.tube)
                .await;
            if let Some(done) = self.conn.settle("peek-ready", result) {
                return done;
            }
        }
    }

    /// Returns the delayed job in the tube with the shortest delay left.
    pub async fn peek_delayed(&mut self, cancel: &CancellationToken) -> Result<(u64, Vec<u8>)> {
        loop {
            let result = self
                .conn
                .ensure(ConnectMode::Retry(cancel))
                .await?
                .peek_delayed(&self.tube)
                .await;
            if let Some(done) = self.conn.settle("peek-delayed", result) {
                return done;
            }
        }
    }

    /// Returns the next buried job in the tube.
    pub async fn peek_buried(&mut self, cancel: &CancellationToken) -> Result<(u64, Vec<u8>)> {
        loop {
            let result = self
                .conn
                .ensure(ConnectMode::Retry(cancel))
                .await?
                .peek_buried(&self.tube)
                .await;
            if let Some(done) = self.conn.settle("peek-buried", result) {
                return done;
            }
        }
    }

    /// Moves up to `bound` buried (or, if none are buried, delayed) jobs
    /// into the ready queue and returns how many were moved.
    pub async fn kick(&mut self, cancel: &CancellationToken, bound: u64) -> Result<u64> {
        loop {
            let result = self
                .conn
                .ensure(ConnectMode::Retry(cancel))
                .await?
                .kick(&self.tube, bound)
                .await;
            if let Some(done) = self.conn.settle("kick", result) {
                return done;
            }
        }
    }

    /// Statistics for the tube.
    pub async fn stats(&mut self, cancel: &CancellationToken) -> Result<HashMap<String, String>> {
        loop {
            let result = self
                .conn
                .ensure(ConnectMode::Retry(cancel))
                .await?
                .stats_tube(&self.tube)
                .await;
            if let Some(done) = self.conn.settle("stats-tube", result) {
                return done;
            }
        }
    }

    /// Stops handing out jobs from the tube for `duration`.
    pub async fn pause(&mut self, cancel: &CancellationToken, duration: Duration) -> Result<()> {
        loop {
            let result = self
                .conn
                .ensure(ConnectMode::Retry(cancel))
                .await?
                .pause_tube(&self.tube, duration)
                .await;
            if let Some(done) = self.conn.settle("pause-tube", result) {
                return done;
            }
        }
    }

    /// Closes the shared session.
    pub async fn close(&mut self) -> Result<()> {
        self.conn.close().await
    }
}
