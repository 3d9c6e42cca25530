use std::time::Duration;

use beanstalk_resilience_core::{EventListener, EventListeners, FnListener};
use beanstalk_resilience_proto::DEFAULT_DIAL_TIMEOUT;

use crate::events::ReconnectEvent;
use crate::policy::ReconnectPolicy;

#[cfg(feature = "metrics")]
use metrics::describe_counter;
#[cfg(feature = "metrics")]
use std::sync::Once;

#[cfg(feature = "metrics")]
static METRICS_INIT: Once = Once::new();

/// Configuration for a reconnecting session.
///
/// Sessions share it behind an `Arc`; build one and hand it to as many
/// sessions as need the same behavior.
#[derive(Clone)]
pub struct ReconnectConfig {
    /// Backoff between failed dials.
    pub(crate) policy: ReconnectPolicy,

    /// Maximum number of dials in one dial loop. `None` means unlimited.
    pub(crate) max_attempts: Option<u32>,

    /// Timeout applied by the default TCP dialer.
    pub(crate) dial_timeout: Duration,

    /// Whether a reservation that loses its transport redials and retries once.
    pub(crate) retry_reserve: bool,

    pub(crate) name: String,
    pub(crate) event_listeners: EventListeners<ReconnectEvent>,
}

impl ReconnectConfig {
    /// Creates a new builder for configuring reconnection behavior.
    pub fn builder() -> ReconnectConfigBuilder {
        #[cfg(feature = "metrics")]
        {
            METRICS_INIT.call_once(|| {
                describe_counter!(
                    "beanstalk_dial_attempts_total",
                    "Total number of dials made by reconnecting sessions"
                );
                describe_counter!(
                    "beanstalk_dial_failures_total",
                    "Total number of dials that failed"
                );
                describe_counter!(
                    "beanstalk_reconnects_total",
                    "Total number of transports established by dialing"
                );
                describe_counter!(
                    "beanstalk_disconnects_total",
                    "Total number of transports discarded after a network failure"
                );
            });
        }
        ReconnectConfigBuilder::new()
    }

    /// Returns the reconnection policy.
    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    /// Returns the maximum number of dials per dial loop.
    pub fn max_attempts(&self) -> Option<u32> {
        self.max_attempts
    }

    /// Returns the timeout used by the default TCP dialer.
    pub fn dial_timeout(&self) -> Duration {
        self.dial_timeout
    }

    /// Returns whether reservations are retried after a redial.
    pub fn retry_reserve(&self) -> bool {
        self.retry_reserve
    }

    /// Returns the session name carried by emitted events.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl std::fmt::Debug for ReconnectConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconnectConfig")
            .field("policy", &self.policy)
            .field("max_attempts", &self.max_attempts)
            .field("dial_timeout", &self.dial_timeout)
            .field("retry_reserve", &self.retry_reserve)
            .field("name", &self.name)
            .field("event_listeners", &self.event_listeners)
            .finish()
    }
}

/// Builder for [`ReconnectConfig`].
pub struct ReconnectConfigBuilder {
    policy: ReconnectPolicy,
    max_attempts: Option<u32>,
    dial_timeout: Duration,
    retry_reserve: bool,
    name: String,
    event_listeners: EventListeners<ReconnectEvent>,
}

impl ReconnectConfigBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            policy: ReconnectPolicy::default(),
            max_attempts: None,
            dial_timeout: DEFAULT_DIAL_TIMEOUT,
            retry_reserve: false,
            name: "beanstalk".to_string(),
            event_listeners: EventListeners::new(),
        }
    }

    /// Sets the backoff applied between failed dials.
    ///
    /// Default: exponential from 100ms, capped at 5s.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    /// use beanstalk_resilience_reconnect::{ReconnectConfig, ReconnectPolicy};
    ///
    /// let config = ReconnectConfig::builder()
    ///     .policy(ReconnectPolicy::fixed(Duration::from_millis(250)))
    ///     .build();
    /// ```
    pub fn policy(mut self, policy: ReconnectPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Caps the number of dials in one dial loop.
    ///
    /// When the cap is hit the operation fails with
    /// [`ReconnectError::MaxAttemptsExceeded`](crate::ReconnectError::MaxAttemptsExceeded).
    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Dial until success or cancellation. This is the default.
    pub fn unlimited_attempts(mut self) -> Self {
        self.max_attempts = None;
        self
    }

    /// Sets the timeout used by the default TCP dialer.
    ///
    /// Default: 10 seconds. Zero disables the timeout.
    pub fn dial_timeout(mut self, timeout: Duration) -> Self {
        self.dial_timeout = timeout;
        self
    }

    /// Lets a reservation whose transport fails mid-call redial once and
    /// reissue the reservation.
    ///
    /// Default: `false`; the network error is returned to the caller.
    pub fn retry_reserve(mut self, retry: bool) -> Self {
        self.retry_reserve = retry;
        self
    }

    /// Sets the session name used in events, logs and metrics.
    ///
    /// Default: `"beanstalk"`
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Registers a listener for every [`ReconnectEvent`].
    pub fn add_listener<L>(mut self, listener: L) -> Self
    where
        L: EventListener<ReconnectEvent> + 'static,
    {
        self.event_listeners.add(listener);
        self
    }

    /// Registers a callback for when a dial succeeds.
    ///
    /// # Callback Signature
    /// `Fn(u32)` - Called with the number of dials it took, including the
    /// successful one.
    ///
    /// # Example
    ///
    /// ```rust
    /// use beanstalk_resilience_reconnect::ReconnectConfig;
    ///
    /// let config = ReconnectConfig::builder()
    ///     .on_connected(|attempts| {
    ///         println!("connected after {} dial(s)", attempts);
    ///     })
    ///     .build();
    /// ```
    pub fn on_connected<F>(mut self, f: F) -> Self
    where
        F: Fn(u32) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let ReconnectEvent::Connected { attempts, .. } = event {
                f(*attempts);
            }
        }));
        self
    }

    /// Registers a callback for when a dial fails.
    ///
    /// # Callback Signature
    /// `Fn(u32, Option<Duration>)` - Called with the attempt number and the
    /// wait before the next dial, or `None` when the loop gives up.
    pub fn on_dial_failed<F>(mut self, f: F) -> Self
    where
        F: Fn(u32, Option<Duration>) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let ReconnectEvent::DialFailed { attempt, delay, .. } = event {
                f(*attempt, *delay);
            }
        }));
        self
    }

    /// Registers a callback for when a live transport fails and is discarded.
    ///
    /// # Callback Signature
    /// `Fn(&'static str)` - Called with the name of the command that failed.
    pub fn on_disconnected<F>(mut self, f: F) -> Self
    where
        F: Fn(&'static str) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let ReconnectEvent::Disconnected { operation, .. } = event {
                f(operation);
            }
        }));
        self
    }

    /// Registers a callback for when a dial loop stops without a connection.
    ///
    /// # Callback Signature
    /// `Fn(u32)` - Called with the number of dials made.
    pub fn on_gave_up<F>(mut self, f: F) -> Self
    where
        F: Fn(u32) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let ReconnectEvent::GaveUp { attempts, .. } = event {
                f(*attempts);
            }
        }));
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> ReconnectConfig {
        ReconnectConfig {
            policy: self.policy,
            max_attempts: self.max_attempts,
            dial_timeout: self.dial_timeout,
            retry_reserve: self.retry_reserve,
            name: self.name,
            event_listeners: self.event_listeners,
        }
    }
}

impl Default for ReconnectConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
