//! Backoff policies applied between dial attempts.

use std::sync::Arc;
use std::time::Duration;

use beanstalk_resilience_core::{
    ExponentialBackoff, ExponentialRandomBackoff, FixedInterval, IntervalFunction,
};

/// How long to wait before redialing after a failed dial.
pub enum ReconnectPolicy {
    /// Redial at once, yielding to the runtime in between. Hammers an
    /// unreachable server; only suitable when something else bounds the
    /// loop (cancellation or `max_attempts`).
    Immediate,

    /// Fixed delay between attempts.
    Fixed(FixedInterval),

    /// Exponential backoff between attempts.
    Exponential(ExponentialBackoff),

    /// Exponential backoff with jitter.
    ExponentialRandom(ExponentialRandomBackoff),

    /// Custom backoff function.
    Custom(Arc<dyn IntervalFunction>),
}

impl Clone for ReconnectPolicy {
    fn clone(&self) -> Self {
        match self {
            Self::Immediate => Self::Immediate,
            Self::Fixed(f) => Self::Fixed(f.clone()),
            Self::Exponential(e) => Self::Exponential(e.clone()),
            Self::ExponentialRandom(e) => Self::ExponentialRandom(e.clone()),
            Self::Custom(c) => Self::Custom(Arc::clone(c)),
        }
    }
}

impl ReconnectPolicy {
    /// Redial without waiting.
    pub fn immediate() -> Self {
        ReconnectPolicy::Immediate
    }

    /// Wait `delay` between attempts.
    pub fn fixed(delay: Duration) -> Self {
        ReconnectPolicy::Fixed(FixedInterval::new(delay))
    }

    /// Double the delay after every failure, starting at `initial_delay`
    /// and never exceeding `max_delay`.
    pub fn exponential(initial_delay: Duration, max_delay: Duration) -> Self {
        ReconnectPolicy::Exponential(
            ExponentialBackoff::new(initial_delay)
                .multiplier(2.0)
                .max_interval(max_delay),
        )
    }

    /// Like [`exponential`](Self::exponential), spreading each delay by
    /// `randomization_factor` (0.0 to 1.0) in either direction.
    pub fn exponential_random(
        initial_delay: Duration,
        max_delay: Duration,
        randomization_factor: f64,
    ) -> Self {
        ReconnectPolicy::ExponentialRandom(
            ExponentialRandomBackoff::new(initial_delay, randomization_factor)
                .multiplier(2.0)
                .max_interval(max_delay),
        )
    }

    /// Use a custom interval function.
    pub fn custom<I>(interval: I) -> Self
    where
        I: IntervalFunction + 'static,
    {
        ReconnectPolicy::Custom(Arc::new(interval))
    }

    /// Delay after the `failures`-th consecutive failed dial (0-indexed).
    pub fn delay_for_attempt(&self, failures: usize) -> Duration {
        match self {
            ReconnectPolicy::Immediate => Duration::ZERO,
            ReconnectPolicy::Fixed(interval) => interval.next_interval(failures),
            ReconnectPolicy::Exponential(backoff) => backoff.next_interval(failures),
            ReconnectPolicy::ExponentialRandom(backoff) => backoff.next_interval(failures),
            ReconnectPolicy::Custom(func) => func.next_interval(failures),
        }
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::exponential(Duration::from_millis(100), Duration::from_secs(5))
    }
}

impl std::fmt::Debug for ReconnectPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Immediate => write!(f, "ReconnectPolicy::Immediate"),
            Self::Fixed(_) => write!(f, "ReconnectPolicy::Fixed"),
            Self::Exponential(_) => write!(f, "ReconnectPolicy::Exponential"),
            Self::ExponentialRandom(_) => write!(f, "ReconnectPolicy::ExponentialRandom"),
            Self::Custom(_) => write!(f, "ReconnectPolicy::Custom"),
        }
    }
}
