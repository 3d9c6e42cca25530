//! The reconnecting session.

use std::collections::HashMap;
use std::fmt;
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

use beanstalk_resilience_proto::{
    Conn, Endpoint, Error as ConnError, Result as ConnResult, TcpDialer, Tube, TubeSet,
};
use tokio_util::sync::CancellationToken;
use tower::make::MakeConnection;

use crate::config::ReconnectConfig;
use crate::error::{ReconnectError, Result};
use crate::events::{GiveUpReason, ReconnectEvent};
use crate::retube::Retube;
use crate::retubeset::Retubeset;
use crate::state::{ConnectionState, ReconnectState};

#[cfg(feature = "metrics")]
use metrics::counter;

/// How hard to try when a command finds no live transport.
#[derive(Debug, Clone, Copy)]
pub(crate) enum ConnectMode<'a> {
    /// Dial until success, the attempt cap, or cancellation of the token.
    Retry(&'a CancellationToken),
    /// Dial exactly once and surface the error on failure.
    Once,
}

/// A beanstalkd session that survives transport failures.
///
/// `Reconn` holds at most one live [`Conn`]. Every command first makes sure
/// one exists, dialing `endpoint` if needed, then issues the request. When
/// the request fails at the network level the transport is dropped and the
/// whole attempt starts over; protocol-level failures are returned as-is.
///
/// Commands scoped to a tube or a set of tubes go through the
/// [`Retube`] and [`Retubeset`] bindings returned by [`tube`](Self::tube)
/// and [`tube_set`](Self::tube_set).
///
/// A session is meant for sequential use; give each worker its own.
pub struct Reconn<D = TcpDialer>
where
    D: MakeConnection<Endpoint>,
{
    endpoint: Endpoint,
    dialer: D,
    conn: Option<Conn<D::Connection>>,
    config: Arc<ReconnectConfig>,
    state: ReconnectState,
}

impl Reconn<TcpDialer> {
    /// Creates a session that dials `endpoint` on first use.
    pub fn new(endpoint: Endpoint, config: impl Into<Arc<ReconnectConfig>>) -> Self {
        let config = config.into();
        let dialer = TcpDialer::new(config.dial_timeout);
        Self::with_dialer(endpoint, dialer, config)
    }

    /// Creates a session and dials `endpoint` once, failing if that dial fails.
    pub async fn dial(
        endpoint: Endpoint,
        config: impl Into<Arc<ReconnectConfig>>,
    ) -> Result<Self> {
        let mut reconn = Self::new(endpoint, config);
        reconn.ensure(ConnectMode::Once).await?;
        Ok(reconn)
    }
}

impl<D> Reconn<D>
where
    D: MakeConnection<Endpoint, Error = io::Error>,
    D::Connection: Unpin,
{
    /// Creates a session that dials through `dialer` on first use.
    pub fn with_dialer(
        endpoint: Endpoint,
        dialer: D,
        config: impl Into<Arc<ReconnectConfig>>,
    ) -> Self {
        Self {
            endpoint,
            dialer,
            conn: None,
            config: config.into(),
            state: ReconnectState::new(),
        }
    }

    /// Creates a session around an already established connection.
    ///
    /// `dialer` is only used once `conn` fails.
    pub fn from_conn(
        endpoint: Endpoint,
        dialer: D,
        conn: Conn<D::Connection>,
        config: impl Into<Arc<ReconnectConfig>>,
    ) -> Self {
        let reconn = Self {
            endpoint,
            dialer,
            conn: Some(conn),
            config: config.into(),
            state: ReconnectState::new(),
        };
        reconn.state.mark_adopted();
        reconn
    }

    /// The address this session dials.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// The session configuration.
    pub fn config(&self) -> &ReconnectConfig {
        &self.config
    }

    /// Shared view of the connection state.
    pub fn state(&self) -> &ReconnectState {
        &self.state
    }

    /// Returns true if a live transport is held and is in step with the
    /// server.
    pub fn is_connected(&self) -> bool {
        self.conn
            .as_ref()
            .is_some_and(|conn| conn.in_flight().is_none())
    }

    /// Binds the session to one tube.
    pub fn tube(&mut self, name: impl Into<String>) -> Retube<'_, D> {
        Retube::new(self, Tube::new(name))
    }

    /// Binds the session to a set of tubes to reserve from.
    pub fn tube_set<I, S>(&mut self, names: I) -> Retubeset<'_, D>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Retubeset::new(self, TubeSet::new(names))
    }

    /// Replaces the current transport with a freshly dialed one.
    ///
    /// The old transport, if any, is shut down first; a failure to shut it
    /// down is ignored.
    pub async fn reconnect(&mut self, cancel: &CancellationToken) -> Result<()> {
        if let Some(old) = self.conn.take() {
            let _ = old.close().await;
            self.state.mark_disconnected();
        }
        let conn = self.redial(ConnectMode::Retry(cancel)).await?;
        self.conn = Some(conn);
        Ok(())
    }

    /// Shuts the live transport down, if there is one.
    ///
    /// Closing a session with no live transport succeeds. The session stays
    /// usable: the next command dials again.
    pub async fn close(&mut self) -> Result<()> {
        match self.conn.take() {
            Some(conn) => {
                self.state.mark_disconnected();
                conn.close().await.map_err(ReconnectError::from)
            }
            None => Ok(()),
        }
    }

    /// Deletes job `id`.
    pub async fn delete(&mut self, cancel: &CancellationToken, id: u64) -> Result<()> {
        loop {
            let result = self
                .ensure(ConnectMode::Retry(cancel))
                .await?
                .delete(id)
                .await;
            if let Some(done) = self.settle("delete", result) {
                return done;
            }
        }
    }

    /// Releases reserved job `id` back to the ready queue with priority
    /// `pri` after `delay`.
    pub async fn release(
        &mut self,
        cancel: &CancellationToken,
        id: u64,
        pri: u32,
        delay: Duration,
    ) -> Result<()> {
        loop {
            let result = self
                .ensure(ConnectMode::Retry(cancel))
                .await?
                .release(id, pri, delay)
                .await;
            if let Some(done) = self.settle("release", result) {
                return done;
            }
        }
    }

    /// Buries reserved job `id` with priority `pri`.
    pub async fn bury(&mut self, cancel: &CancellationToken, id: u64, pri: u32) -> Result<()> {
        loop {
            let result = self
                .ensure(ConnectMode::Retry(cancel))
                .await?
                .bury(id, pri)
                .await;
            if let Some(done) = self.settle("bury", result) {
                return done;
            }
        }
    }

    /// Kicks job `id` if it is buried or delayed.
    pub async fn kick_job(&mut self, cancel: &CancellationToken, id: u64) -> Result<()> {
        loop {
            let result = self
                .ensure(ConnectMode::Retry(cancel))
                .await?
                .kick_job(id)
                .await;
            if let Some(done) = self.settle("kick-job", result) {
                return done;
            }
        }
    }

    /// Asks for more time to work on reserved job `id`.
    pub async fn touch(&mut self, cancel: &CancellationToken, id: u64) -> Result<()> {
        loop {
            let result = self
                .ensure(ConnectMode::Retry(cancel))
                .await?
                .touch(id)
                .await;
            if let Some(done) = self.settle("touch", result) {
                return done;
            }
        }
    }

    /// Returns the body of job `id`.
    pub async fn peek(&mut self, cancel: &CancellationToken, id: u64) -> Result<Vec<u8>> {
        loop {
            let result = self
                .ensure(ConnectMode::Retry(cancel))
                .await?
                .peek(id)
                .await;
            if let Some(done) = self.settle("peek", result) {
                return done;
            }
        }
    }

    /// Server-wide statistics.
    pub async fn stats(&mut self, cancel: &CancellationToken) -> Result<HashMap<String, String>> {
        loop {
            let result = self.ensure(ConnectMode::Retry(cancel)).await?.stats().await;
            if let Some(done) = self.settle("stats", result) {
                return done;
            }
        }
    }

    /// Statistics for job `id`.
    pub async fn stats_job(
        &mut self,
        cancel: &CancellationToken,
        id: u64,
    ) -> Result<HashMap<String, String>> {
        loop {
            let result = self
                .ensure(ConnectMode::Retry(cancel))
                .await?
                .stats_job(id)
                .await;
            if let Some(done) = self.settle("stats-job", result) {
                return done;
            }
        }
    }

    /// Names of all tubes on the server.
    pub async fn list_tubes(&mut self, cancel: &CancellationToken) -> Result<Vec<String>> {
        loop {
            let result = self
                .ensure(ConnectMode::Retry(cancel))
                .await?
                .list_tubes()
                .await;
            if let Some(done) = self.settle("list-tubes", result) {
                return done;
            }
        }
    }

    /// Returns the live connection, dialing first if there is none.
    ///
    /// A connection still waiting on the reply to an abandoned request is
    /// out of step with the server and is dropped like a failed one.
    pub(crate) async fn ensure(
        &mut self,
        mode: ConnectMode<'_>,
    ) -> Result<&mut Conn<D::Connection>> {
        let conn = match self.conn.take() {
            Some(conn) => match conn.in_flight() {
                None => conn,
                Some(op) => {
                    let err = ConnError::Network {
                        op,
                        source: io::Error::new(
                            io::ErrorKind::InvalidData,
                            "reply to an abandoned request is still pending",
                        ),
                    };
                    self.discard(op, &err);
                    drop(conn);
                    self.redial(mode).await?
                }
            },
            None => self.redial(mode).await?,
        };
        Ok(self.conn.insert(conn))
    }

    /// Decides what a command outcome means for the session.
    ///
    /// Network failures drop the transport and return `None`, asking the
    /// caller to go round again. Everything else is final.
    pub(crate) fn settle<T>(
        &mut self,
        op: &'static str,
        result: ConnResult<T>,
    ) -> Option<Result<T>> {
        match result {
            Err(err) if err.is_network() => {
                self.discard(op, &err);
                None
            }
            other => Some(other.map_err(ReconnectError::from)),
        }
    }

    pub(crate) fn discard(&mut self, op: &'static str, err: &ConnError) {
        self.conn = None;
        self.state.mark_dropped();

        #[cfg(feature = "metrics")]
        counter!("beanstalk_disconnects_total", "session" => self.config.name.clone())
            .increment(1);

        #[cfg(feature = "tracing")]
        tracing::warn!(
            session = %self.config.name,
            endpoint = %self.endpoint,
            op,
            error = %err,
            "transport failed, dropping connection"
        );
        #[cfg(not(feature = "tracing"))]
        let _ = err;

        self.emit(ReconnectEvent::Disconnected {
            session_name: self.config.name.clone(),
            timestamp: Instant::now(),
            operation: op,
        });
    }

    pub(crate) fn retry_reserve(&self) -> bool {
        self.config.retry_reserve
    }

    async fn redial(&mut self, mode: ConnectMode<'_>) -> Result<Conn<D::Connection>> {
        self.state.mark_reconnecting();
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;

            #[cfg(feature = "metrics")]
            counter!("beanstalk_dial_attempts_total", "session" => self.config.name.clone())
                .increment(1);

            let err = match self.dial_once().await {
                Ok(stream) => {
                    self.state.mark_connected();

                    #[cfg(feature = "metrics")]
                    counter!("beanstalk_reconnects_total", "session" => self.config.name.clone())
                        .increment(1);

                    #[cfg(feature = "tracing")]
                    tracing::debug!(
                        session = %self.config.name,
                        endpoint = %self.endpoint,
                        attempts = attempt,
                        "connected"
                    );

                    self.emit(ReconnectEvent::Connected {
                        session_name: self.config.name.clone(),
                        timestamp: Instant::now(),
                        attempts: attempt,
                    });
                    return Ok(Conn::new(stream));
                }
                Err(err) => err,
            };

            self.state.record_failed_attempt();

            #[cfg(feature = "metrics")]
            counter!("beanstalk_dial_failures_total", "session" => self.config.name.clone())
                .increment(1);

            let cancel = match mode {
                ConnectMode::Once => {
                    return Err(self.give_up(attempt, GiveUpReason::SingleAttempt, err));
                }
                ConnectMode::Retry(cancel) => cancel,
            };
            if cancel.is_cancelled() {
                return Err(self.give_up(attempt, GiveUpReason::Cancelled, err));
            }
            if self.config.max_attempts.is_some_and(|max| attempt >= max) {
                return Err(self.give_up(attempt, GiveUpReason::MaxAttempts, err));
            }

            let delay = self.config.policy.delay_for_attempt(attempt as usize - 1);

            #[cfg(feature = "tracing")]
            tracing::warn!(
                session = %self.config.name,
                endpoint = %self.endpoint,
                attempt,
                ?delay,
                error = %err,
                "dial failed, retrying"
            );

            self.emit(ReconnectEvent::DialFailed {
                session_name: self.config.name.clone(),
                timestamp: Instant::now(),
                attempt,
                delay: Some(delay),
            });

            if delay.is_zero() {
                tokio::task::yield_now().await;
                continue;
            }
            tokio::select! {
                _ = cancel.cancelled() => {
                    return Err(self.give_up(attempt, GiveUpReason::Cancelled, err));
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    async fn dial_once(&mut self) -> io::Result<D::Connection> {
        futures::future::poll_fn(|cx| {
            <D as MakeConnection<Endpoint>>::poll_ready(&mut self.dialer, cx)
        })
        .await?;
        <D as MakeConnection<Endpoint>>::make_connection(&mut self.dialer, self.endpoint.clone())
            .await
    }

    fn give_up(&self, attempts: u32, reason: GiveUpReason, err: io::Error) -> ReconnectError {
        self.state.mark_disconnected();

        #[cfg(feature = "tracing")]
        tracing::warn!(
            session = %self.config.name,
            endpoint = %self.endpoint,
            attempts,
            ?reason,
            error = %err,
            "giving up on dialing"
        );

        let now = Instant::now();
        self.emit(ReconnectEvent::DialFailed {
            session_name: self.config.name.clone(),
            timestamp: now,
            attempt: attempts,
            delay: None,
        });
        self.emit(ReconnectEvent::GaveUp {
            session_name: self.config.name.clone(),
            timestamp: now,
            attempts,
            reason,
        });

        match reason {
            GiveUpReason::MaxAttempts => ReconnectError::MaxAttemptsExceeded {
                attempts,
                source: err,
            },
            GiveUpReason::Cancelled | GiveUpReason::SingleAttempt => ReconnectError::Dial(err),
        }
    }

    fn emit(&self, event: ReconnectEvent) {
        if !self.config.event_listeners.is_empty() {
            self.config.event_listeners.emit(&event);
        }
    }
}

impl<D> fmt::Debug for Reconn<D>
where
    D: MakeConnection<Endpoint>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reconn")
            .field("endpoint", &self.endpoint)
            .field("connected", &self.conn.is_some())
            .field("state", &self.state)
            .field("config", &self.config)
            .finish()
    }
}

impl<D> Reconn<D>
where
    D: MakeConnection<Endpoint>,
{
    /// Current connection state; shorthand for `self.state().state()`.
    pub fn connection_state(&self) -> ConnectionState {
        self.state.state()
    }
}
