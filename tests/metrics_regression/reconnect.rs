//! Reconnect metrics regression tests

use std::io;

use beanstalk_resilience_reconnect::{
    CancellationToken, Conn, Endpoint, Reconn, ReconnectConfig, ReconnectPolicy,
};
use serial_test::serial;
use tokio_test::io::Builder;

use super::helpers::*;

fn refusing_then(
    mock: tokio_test::io::Mock,
) -> impl tower::Service<
    Endpoint,
    Response = tokio_test::io::Mock,
    Error = io::Error,
    Future = futures::future::Ready<io::Result<tokio_test::io::Mock>>,
> {
    let mut script = vec![Ok(mock), Err(io::Error::from(io::ErrorKind::ConnectionRefused))];
    tower::service_fn(move |_: Endpoint| {
        let next = script
            .pop()
            .unwrap_or_else(|| Err(io::ErrorKind::ConnectionRefused.into()));
        futures::future::ready(next)
    })
}

#[tokio::test]
#[serial]
async fn reconnect_counters_exist() {
    init_recorder();

    let healthy = Builder::new()
        .write(b"touch 1\r\n")
        .read(b"TOUCHED\r\n")
        .build();
    let broken = Builder::new()
        .write(b"touch 1\r\n")
        .read_error(io::ErrorKind::ConnectionReset.into())
        .build();
    let config = ReconnectConfig::builder()
        .policy(ReconnectPolicy::immediate())
        .name("metrics_session")
        .build();
    let mut reconn = Reconn::from_conn(
        Endpoint::tcp("beanstalk.test:11300"),
        refusing_then(healthy),
        Conn::new(broken),
        config,
    );

    reconn.touch(&CancellationToken::new(), 1).await.unwrap();

    assert_eq!(counter_value("beanstalk_disconnects_total", "metrics_session"), 1);
    assert_eq!(counter_value("beanstalk_dial_attempts_total", "metrics_session"), 2);
    assert_eq!(counter_value("beanstalk_dial_failures_total", "metrics_session"), 1);
    assert_eq!(counter_value("beanstalk_reconnects_total", "metrics_session"), 1);
}

#[tokio::test]
#[serial]
async fn default_config_describes_counters() {
    init_recorder();

    let healthy = Builder::new()
        .write(b"touch 2\r\n")
        .read(b"TOUCHED\r\n")
        .build();
    let mut reconn = Reconn::with_dialer(
        Endpoint::tcp("beanstalk.test:11300"),
        refusing_then(healthy),
        ReconnectConfig::default(),
    );

    reconn.touch(&CancellationToken::new(), 2).await.unwrap();

    let described: Vec<_> = get_metrics_snapshot()
        .into_iter()
        .filter(|(key, _, description, _)| {
            key.key().name().starts_with("beanstalk_") && description.is_some()
        })
        .map(|(key, _, _, _)| key.key().name().to_string())
        .collect();
    for name in [
        "beanstalk_dial_attempts_total",
        "beanstalk_dial_failures_total",
        "beanstalk_reconnects_total",
    ] {
        assert!(described.iter().any(|d| d == name), "{name} is not described");
    }
}
