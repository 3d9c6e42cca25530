use std::io;
use std::sync::Arc;
use std::time::Duration;

use beanstalk_resilience_reconnect::{
    Conn, ProtocolError, Reconn, ReconnectConfig, ReconnectError, ReconnectPolicy,
};
use tokio_test::io::Builder;

use super::{adopted, answers, endpoint, lazy, resets_after, ScriptedDialer};

#[tokio::test]
async fn reserve_times_out_without_body() {
    let dialer = ScriptedDialer::new();
    let mut reconn = adopted(
        answers(b"reserve-with-timeout 1\r\n", b"TIMED_OUT\r\n"),
        &dialer,
    );

    let err = reconn
        .tube_set(["default"])
        .reserve(Duration::from_secs(1))
        .await
        .unwrap_err();

    assert_eq!(err.protocol_error(), Some(ProtocolError::TimedOut));
    assert!(reconn.is_connected());
}

#[tokio::test]
async fn reserve_returns_job() {
    let dialer = ScriptedDialer::new();
    let mut reconn = adopted(
        answers(
            b"reserve-with-timeout 5\r\n",
            b"RESERVED 12 4\r\nwork\r\n",
        ),
        &dialer,
    );

    let (id, body) = reconn
        .tube_set(["default"])
        .reserve(Duration::from_secs(5))
        .await
        .unwrap();

    assert_eq!(id, 12);
    assert_eq!(body, b"work");
}

#[tokio::test]
async fn reserve_adjusts_watch_list() {
    let dialer = ScriptedDialer::new();
    let mut reconn = adopted(
        answers(
            b"watch emails\r\nwatch sms\r\nignore default\r\nreserve-with-timeout 0\r\n",
            b"WATCHING 2\r\nWATCHING 3\r\nWATCHING 2\r\nRESERVED 1 1\r\nx\r\n",
        ),
        &dialer,
    );

    let mut set = reconn.tube_set(["sms", "emails"]);
    assert_eq!(set.tubes().len(), 2);
    let (id, _) = set.reserve(Duration::ZERO).await.unwrap();

    assert_eq!(id, 1);
}

#[tokio::test]
async fn reserve_makes_a_single_dial_attempt() {
    let dialer = ScriptedDialer::new()
        .then_refuse()
        .then_connect(answers(b"reserve-with-timeout 1\r\n", b"TIMED_OUT\r\n"));
    let mut reconn = lazy(&dialer);

    let err = reconn
        .tube_set(["default"])
        .reserve(Duration::from_secs(1))
        .await
        .unwrap_err();

    assert!(matches!(err, ReconnectError::Dial(_)));
    assert_eq!(dialer.dials(), 1);

    // The next reservation dials again, once.
    let err = reconn
        .tube_set(["default"])
        .reserve(Duration::from_secs(1))
        .await
        .unwrap_err();
    assert_eq!(err.protocol_error(), Some(ProtocolError::TimedOut));
    assert_eq!(dialer.dials(), 2);
}

#[tokio::test]
async fn reserve_ignores_attempt_cap_and_backoff() {
    let dialer = ScriptedDialer::new();
    let config = ReconnectConfig::builder()
        .policy(ReconnectPolicy::fixed(Duration::from_secs(3600)))
        .max_attempts(10)
        .build();
    let mut reconn = Reconn::with_dialer(endpoint(), dialer.clone(), config);

    let err = reconn
        .tube_set(["default"])
        .reserve(Duration::from_secs(1))
        .await
        .unwrap_err();

    assert!(matches!(err, ReconnectError::Dial(_)));
    assert_eq!(dialer.dials(), 1);
}

#[tokio::test]
async fn network_failure_is_surfaced_by_default() {
    let dialer = ScriptedDialer::new();
    let mut reconn = adopted(resets_after(b"reserve-with-timeout 1\r\n"), &dialer);

    let err = reconn
        .tube_set(["default"])
        .reserve(Duration::from_secs(1))
        .await
        .unwrap_err();

    assert!(err.is_network());
    assert!(!err.is_dial());
    assert!(!reconn.is_connected());
    assert_eq!(dialer.dials(), 0);
}

#[tokio::test]
async fn retry_reserve_redials_once() {
    let dialer = ScriptedDialer::new().then_connect(answers(
        b"reserve-with-timeout 1\r\n",
        b"RESERVED 3 2\r\nok\r\n",
    ));
    let config = Arc::new(
        ReconnectConfig::builder()
            .policy(ReconnectPolicy::immediate())
            .retry_reserve(true)
            .build(),
    );
    let mut reconn = Reconn::from_conn(
        endpoint(),
        dialer.clone(),
        Conn::new(resets_after(b"reserve-with-timeout 1\r\n")),
        config,
    );

    let (id, body) = reconn
        .tube_set(["default"])
        .reserve(Duration::from_secs(1))
        .await
        .unwrap();

    assert_eq!((id, body.as_slice()), (3, b"ok".as_slice()));
    assert_eq!(dialer.dials(), 1);
}

#[tokio::test]
async fn retry_reserve_gives_up_after_second_failure() {
    let dialer =
        ScriptedDialer::new().then_connect(resets_after(b"reserve-with-timeout 1\r\n"));
    let config = ReconnectConfig::builder()
        .policy(ReconnectPolicy::immediate())
        .retry_reserve(true)
        .build();
    let mut reconn = Reconn::from_conn(
        endpoint(),
        dialer.clone(),
        Conn::new(
            Builder::new()
                .write(b"reserve-with-timeout 1\r\n")
                .read_error(io::ErrorKind::BrokenPipe.into())
                .build(),
        ),
        config,
    );

    let err = reconn
        .tube_set(["default"])
        .reserve(Duration::from_secs(1))
        .await
        .unwrap_err();

    assert!(err.is_network());
    assert_eq!(dialer.dials(), 1);
    assert_eq!(reconn.state().disconnects(), 2);
}
