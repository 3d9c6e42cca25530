use std::time::Duration;

use beanstalk_resilience_core::backoff::{
    ExponentialBackoff, ExponentialRandomBackoff, FixedInterval, FnInterval, IntervalFunction,
};

#[test]
fn fixed_interval_never_changes() {
    let interval = FixedInterval::new(Duration::from_millis(250));

    for attempt in [0, 1, 10, 1_000] {
        assert_eq!(interval.next_interval(attempt), Duration::from_millis(250));
    }
}

#[test]
fn exponential_backoff_grows_then_caps() {
    let backoff = ExponentialBackoff::new(Duration::from_millis(100))
        .multiplier(2.0)
        .max_interval(Duration::from_secs(1));

    let delays: Vec<_> = (0..6).map(|n| backoff.next_interval(n)).collect();

    assert_eq!(
        delays,
        vec![
            Duration::from_millis(100),
            Duration::from_millis(200),
            Duration::from_millis(400),
            Duration::from_millis(800),
            Duration::from_secs(1),
            Duration::from_secs(1),
        ]
    );
}

#[test]
fn exponential_backoff_survives_huge_attempt_counts() {
    let backoff = ExponentialBackoff::new(Duration::from_millis(100));

    // Without a cap the delay saturates rather than panicking.
    let delay = backoff.next_interval(usize::MAX);
    assert!(delay >= Duration::from_secs(1_000_000));
}

#[test]
fn randomized_backoff_stays_within_factor() {
    let backoff = ExponentialRandomBackoff::new(Duration::from_millis(100), 0.5)
        .max_interval(Duration::from_secs(10));

    for _ in 0..100 {
        let delay = backoff.next_interval(2);
        assert!(delay >= Duration::from_millis(199), "{delay:?}");
        assert!(delay <= Duration::from_millis(601), "{delay:?}");
    }
}

#[test]
fn randomized_backoff_with_zero_factor_is_exact() {
    let backoff = ExponentialRandomBackoff::new(Duration::from_millis(50), 0.0);

    assert_eq!(backoff.next_interval(1), Duration::from_millis(100));
}

#[test]
fn fn_interval_delegates_to_closure() {
    let linear = FnInterval::new(|attempt| Duration::from_millis(10 * (attempt as u64 + 1)));

    assert_eq!(linear.next_interval(0), Duration::from_millis(10));
    assert_eq!(linear.next_interval(4), Duration::from_millis(50));
}
