use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use beanstalk_resilience_core::ResilienceEvent;
use beanstalk_resilience_reconnect::{
    CancellationToken, FnListener, GiveUpReason, Reconn, ReconnectConfig, ReconnectEvent,
    ReconnectPolicy,
};

use super::{answers, endpoint, resets_after, ScriptedDialer};

#[test]
fn config_builder_default_values() {
    let config = ReconnectConfig::default();

    assert!(matches!(config.policy(), ReconnectPolicy::Exponential(_)));
    assert!(config.max_attempts().is_none());
    assert_eq!(config.dial_timeout(), Duration::from_secs(10));
    assert!(!config.retry_reserve());
    assert_eq!(config.name(), "beanstalk");
}

#[test]
fn config_builder_custom_values() {
    let config = ReconnectConfig::builder()
        .policy(ReconnectPolicy::fixed(Duration::from_secs(1)))
        .max_attempts(5)
        .dial_timeout(Duration::from_millis(500))
        .retry_reserve(true)
        .name("producer")
        .build();

    assert!(matches!(config.policy(), ReconnectPolicy::Fixed(_)));
    assert_eq!(config.max_attempts(), Some(5));
    assert_eq!(config.dial_timeout(), Duration::from_millis(500));
    assert!(config.retry_reserve());
    assert_eq!(config.name(), "producer");
}

#[test]
fn config_builder_unlimited_attempts() {
    let config = ReconnectConfig::builder()
        .max_attempts(2)
        .unlimited_attempts()
        .build();

    assert!(config.max_attempts().is_none());
}

#[test]
fn policy_variants() {
    let immediate = ReconnectPolicy::immediate();
    assert_eq!(immediate.delay_for_attempt(3), Duration::ZERO);

    let jittered = ReconnectPolicy::exponential_random(
        Duration::from_millis(100),
        Duration::from_secs(1),
        0.0,
    );
    assert_eq!(jittered.delay_for_attempt(1), Duration::from_millis(200));

    let custom = ReconnectPolicy::custom(beanstalk_resilience_reconnect::FnInterval::new(
        |attempt| Duration::from_millis(attempt as u64),
    ));
    assert_eq!(custom.delay_for_attempt(7), Duration::from_millis(7));
}

#[tokio::test]
async fn callbacks_observe_redial() {
    let connected = Arc::new(AtomicU32::new(0));
    let failed = Arc::new(Mutex::new(Vec::new()));
    let dropped = Arc::new(Mutex::new(Vec::new()));

    let c = Arc::clone(&connected);
    let f = Arc::clone(&failed);
    let d = Arc::clone(&dropped);
    let config = ReconnectConfig::builder()
        .policy(ReconnectPolicy::immediate())
        .on_connected(move |attempts| {
            c.store(attempts, Ordering::SeqCst);
        })
        .on_dial_failed(move |attempt, delay| {
            f.lock().unwrap().push((attempt, delay));
        })
        .on_disconnected(move |op| {
            d.lock().unwrap().push(op);
        })
        .build();

    let dialer = ScriptedDialer::new()
        .then_refuse()
        .then_connect(answers(b"touch 1\r\n", b"TOUCHED\r\n"));
    let mut reconn = Reconn::from_conn(
        endpoint(),
        dialer,
        beanstalk_resilience_reconnect::Conn::new(resets_after(b"touch 1\r\n")),
        config,
    );

    reconn.touch(&CancellationToken::new(), 1).await.unwrap();

    assert_eq!(*dropped.lock().unwrap(), vec!["touch"]);
    assert_eq!(*failed.lock().unwrap(), vec![(1, Some(Duration::ZERO))]);
    assert_eq!(connected.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn gave_up_event_carries_reason() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let gave_up = Arc::new(AtomicU32::new(0));

    let e = Arc::clone(&events);
    let g = Arc::clone(&gave_up);
    let config = ReconnectConfig::builder()
        .policy(ReconnectPolicy::immediate())
        .max_attempts(2)
        .name("worker-7")
        .add_listener(FnListener::new(move |event: &ReconnectEvent| {
            e.lock().unwrap().push(event.clone());
        }))
        .on_gave_up(move |attempts| {
            g.store(attempts, Ordering::SeqCst);
        })
        .build();
    let mut reconn = Reconn::with_dialer(endpoint(), ScriptedDialer::new(), config);

    reconn
        .delete(&CancellationToken::new(), 1)
        .await
        .unwrap_err();

    let events = events.lock().unwrap();
    let kinds: Vec<_> = events.iter().map(|e| e.event_type()).collect();
    assert_eq!(kinds, vec!["dial_failed", "dial_failed", "gave_up"]);
    assert!(events.iter().all(|e| e.session_name() == "worker-7"));
    assert!(matches!(
        events.last(),
        Some(ReconnectEvent::GaveUp {
            attempts: 2,
            reason: GiveUpReason::MaxAttempts,
            ..
        })
    ));
    assert!(matches!(
        events[1],
        ReconnectEvent::DialFailed { delay: None, .. }
    ));
    assert_eq!(gave_up.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn panicking_callback_does_not_break_session() {
    let config = ReconnectConfig::builder()
        .policy(ReconnectPolicy::immediate())
        .on_connected(|_| panic!("callback bug"))
        .build();
    let dialer = ScriptedDialer::new().then_connect(answers(b"touch 1\r\n", b"TOUCHED\r\n"));
    let mut reconn = Reconn::with_dialer(endpoint(), dialer, config);

    reconn.touch(&CancellationToken::new(), 1).await.unwrap();
}
