//! Core infrastructure for beanstalk-resilience.
//!
//! This crate provides the pieces shared by the session layer:
//! - Event system for observability
//! - Backoff strategies used between dial attempts

pub mod backoff;
pub mod events;

pub use backoff::{
    ExponentialBackoff, ExponentialRandomBackoff, FixedInterval, FnInterval, IntervalFunction,
};
pub use events::{EventListener, EventListeners, FnListener, ResilienceEvent};
