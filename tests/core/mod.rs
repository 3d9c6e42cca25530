//! Test organization:
//! - listeners.rs: FnListener and EventListeners delivery, panic isolation
//! - backoff.rs: interval functions

mod backoff;
