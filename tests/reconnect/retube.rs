use std::time::Duration;

use beanstalk_resilience_reconnect::{CancellationToken, ProtocolError};
use tokio_test::io::Builder;

use super::{adopted, answers, lazy, resets_after, ScriptedDialer};

#[tokio::test]
async fn put_returns_assigned_id() {
    let dialer = ScriptedDialer::new();
    let mut reconn = adopted(
        answers(b"put 0 0 0 3\r\nfoo\r\n", b"INSERTED 1\r\n"),
        &dialer,
    );

    let id = reconn
        .tube("default")
        .put(
            &CancellationToken::new(),
            b"foo",
            0,
            Duration::ZERO,
            Duration::ZERO,
        )
        .await
        .unwrap();

    assert_eq!(id, 1);
}

#[tokio::test]
async fn kick_moves_fewer_than_bound() {
    let dialer = ScriptedDialer::new();
    let mut reconn = adopted(answers(b"kick 2\r\n", b"KICKED 1\r\n"), &dialer);

    let kicked = reconn
        .tube("default")
        .kick(&CancellationToken::new(), 2)
        .await
        .unwrap();

    assert_eq!(kicked, 1);
}

#[tokio::test]
async fn put_is_replayed_on_fresh_transport_with_use() {
    let dialer = ScriptedDialer::new().then_connect(answers(
        b"use jobs\r\nput 5 0 30 2\r\nhi\r\n",
        b"USING jobs\r\nINSERTED 8\r\n",
    ));
    let mut reconn = adopted(
        Builder::new()
            .write(b"use jobs\r\nput 5 0 30 2\r\nhi\r\n")
            .read(b"USING jobs\r\n")
            .read_error(std::io::ErrorKind::ConnectionReset.into())
            .build(),
        &dialer,
    );

    let id = reconn
        .tube("jobs")
        .put(
            &CancellationToken::new(),
            b"hi",
            5,
            Duration::ZERO,
            Duration::from_secs(30),
        )
        .await
        .unwrap();

    assert_eq!(id, 8);
    assert_eq!(dialer.dials(), 1);
}

#[tokio::test]
async fn binding_follows_reconnect_between_calls() {
    let dialer = ScriptedDialer::new().then_connect(answers(
        b"use jobs\r\nput 0 0 0 1\r\nb\r\n",
        b"USING jobs\r\nINSERTED 2\r\n",
    ));
    let mut reconn = adopted(
        answers(
            b"use jobs\r\nput 0 0 0 1\r\na\r\n",
            b"USING jobs\r\nINSERTED 1\r\n",
        ),
        &dialer,
    );
    let cancel = CancellationToken::new();
    let mut tube = reconn.tube("jobs");

    let first = tube
        .put(&cancel, b"a", 0, Duration::ZERO, Duration::ZERO)
        .await
        .unwrap();

    // The new transport has never selected `jobs`, so the binding must
    // issue `use` again rather than trust the old transport's state.
    tube.conn().reconnect(&cancel).await.unwrap();

    let second = tube
        .put(&cancel, b"b", 0, Duration::ZERO, Duration::ZERO)
        .await
        .unwrap();

    assert_eq!((first, second), (1, 2));
    assert_eq!(dialer.dials(), 1);
}

#[tokio::test]
async fn peeks_are_replayed_after_reset() {
    let dialer = ScriptedDialer::new()
        .then_connect(answers(b"peek-ready\r\n", b"FOUND 1 1\r\nr\r\n"))
        .then_connect(answers(b"peek-delayed\r\n", b"FOUND 2 1\r\nd\r\n"))
        .then_connect(answers(b"peek-buried\r\n", b"NOT_FOUND\r\n"));
    let mut reconn = adopted(resets_after(b"peek-ready\r\n"), &dialer);
    let cancel = CancellationToken::new();

    let ready = reconn.tube("default").peek_ready(&cancel).await.unwrap();
    assert_eq!(ready, (1, b"r".to_vec()));

    reconn.close().await.unwrap();
    let delayed = reconn.tube("default").peek_delayed(&cancel).await.unwrap();
    assert_eq!(delayed, (2, b"d".to_vec()));

    reconn.close().await.unwrap();
    let err = reconn
        .tube("default")
        .peek_buried(&cancel)
        .await
        .unwrap_err();
    assert_eq!(err.protocol_error(), Some(ProtocolError::NotFound));
    assert_eq!(dialer.dials(), 3);
}

#[tokio::test]
async fn tube_stats_and_pause_dial_lazily() {
    let dialer = ScriptedDialer::new().then_connect(
        Builder::new()
            .write(b"stats-tube jobs\r\n")
            .read(b"OK 15\r\n---\nname: jobs\n\r\n")
            .write(b"pause-tube jobs 60\r\n")
            .read(b"PAUSED\r\n")
            .build(),
    );
    let mut reconn = lazy(&dialer);
    let cancel = CancellationToken::new();
    let mut tube = reconn.tube("jobs");

    let stats = tube.stats(&cancel).await.unwrap();
    assert_eq!(stats.get("name").map(String::as_str), Some("jobs"));

    tube.pause(&cancel, Duration::from_secs(60)).await.unwrap();
    assert_eq!(dialer.dials(), 1);
}

#[tokio::test]
async fn closing_binding_closes_session() {
    let dialer = ScriptedDialer::new();
    let mut reconn = adopted(Builder::new().build(), &dialer);

    let mut tube = reconn.tube("jobs");
    assert_eq!(tube.name(), "jobs");
    tube.close().await.unwrap();
    tube.close().await.unwrap();

    assert!(!reconn.is_connected());
}
