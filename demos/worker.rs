//! A worker that keeps consuming jobs while beanstalkd restarts underneath it.
//!
//! Start a server, then run:
//!
//! ```bash
//! beanstalkd -l 127.0.0.1 -p 11300 &
//! cargo run --example worker -- 127.0.0.1:11300
//! ```
//!
//! Kill and restart beanstalkd while the worker is running: producer and
//! consumer pick up on the new server without any handling of their own.

use std::time::Duration;

use beanstalk_resilience_reconnect::{
    CancellationToken, Endpoint, ProtocolError, Reconn, ReconnectConfig, ReconnectPolicy,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let addr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:11300".to_string());

    let config = ReconnectConfig::builder()
        .policy(ReconnectPolicy::exponential_random(
            Duration::from_millis(200),
            Duration::from_secs(5),
            0.25,
        ))
        .name("demo-worker")
        .retry_reserve(true)
        .on_connected(|attempts| println!("connected after {attempts} dial(s)"))
        .on_disconnected(|op| println!("lost the server during {op}"))
        .build();

    let mut reconn = Reconn::new(Endpoint::tcp(addr), config);
    let cancel = CancellationToken::new();

    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    for n in 0..5u32 {
        let body = format!("job #{n}");
        let id = reconn
            .tube("demo")
            .put(
                &cancel,
                body.as_bytes(),
                1024,
                Duration::ZERO,
                Duration::from_secs(30),
            )
            .await?;
        println!("put {id}: {body}");
    }

    while !cancel.is_cancelled() {
        match reconn
            .tube_set(["demo"])
            .reserve(Duration::from_secs(2))
            .await
        {
            Ok((id, body)) => {
                println!("reserved {id}: {}", String::from_utf8_lossy(&body));
                tokio::time::sleep(Duration::from_millis(500)).await;
                reconn.delete(&cancel, id).await?;
            }
            Err(err) if err.protocol_error() == Some(ProtocolError::TimedOut) => {
                println!("queue is empty");
            }
            Err(err) if err.is_dial() => {
                println!("server unreachable: {err}");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
            Err(err) => return Err(err.into()),
        }
    }

    reconn.close().await?;
    Ok(())
}
