//! Transport endpoints and the default TCP dialer.
//!
//! [`TcpDialer`] is a `tower::Service<Endpoint>` whose responses are byte
//! streams, which makes it a `tower::make::MakeConnection<Endpoint>`. The
//! session layer accepts any such service, so tests can hand out scripted
//! transports in its place.

use std::fmt;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::{TcpSocket, TcpStream};
use tower::Service;

#[cfg(unix)]
use tokio::net::UnixStream;

/// Default time allowed for establishing a connection.
pub const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(10);

/// Kind of transport to dial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Network {
    /// TCP stream socket; the address is `host:port`.
    Tcp,
    /// Unix-domain stream socket; the address is a filesystem path.
    #[cfg(unix)]
    Unix,
}

/// Where a session connects to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    network: Network,
    addr: String,
}

impl Endpoint {
    /// A TCP endpoint such as `"127.0.0.1:11300"`.
    pub fn tcp(addr: impl Into<String>) -> Self {
        Self {
            network: Network::Tcp,
            addr: addr.into(),
        }
    }

    /// A Unix-domain socket endpoint.
    #[cfg(unix)]
    pub fn unix(path: impl Into<String>) -> Self {
        Self {
            network: Network::Unix,
            addr: path.into(),
        }
    }

    /// The transport kind.
    pub fn network(&self) -> Network {
        self.network
    }

    /// The address.
    pub fn addr(&self) -> &str {
        &self.addr
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.network {
            Network::Tcp => write!(f, "tcp://{}", self.addr),
            #[cfg(unix)]
            Network::Unix => write!(f, "unix://{}", self.addr),
        }
    }
}

/// A connected stream of either supported kind.
#[derive(Debug)]
pub enum NetStream {
    /// TCP stream.
    Tcp(TcpStream),
    /// Unix-domain stream.
    #[cfg(unix)]
    Unix(UnixStream),
}

impl AsyncRead for NetStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            NetStream::Tcp(s) => Pin::new(s).poll_read(cx, buf),
            #[cfg(unix)]
            NetStream::Unix(s) => Pin::new(s).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for NetStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            NetStream::Tcp(s) => Pin::new(s).poll_write(cx, buf),
            #[cfg(unix)]
            NetStream::Unix(s) => Pin::new(s).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            NetStream::Tcp(s) => Pin::new(s).poll_flush(cx),
            #[cfg(unix)]
            NetStream::Unix(s) => Pin::new(s).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            NetStream::Tcp(s) => Pin::new(s).poll_shutdown(cx),
            #[cfg(unix)]
            NetStream::Unix(s) => Pin::new(s).poll_shutdown(cx),
        }
    }
}

/// Dials TCP (and, on unix, Unix-domain) endpoints with a connect timeout
/// and SO_KEEPALIVE enabled.
///
/// Keep-alive packets are sent at the operating system's default interval (two
/// hours idle on Linux). `TcpSocket` only exposes the on/off switch, so a
/// dead peer on an idle connection is usually noticed by the next command's
/// read or write instead.
#[derive(Debug, Clone)]
pub struct TcpDialer {
    timeout: Duration,
}

impl TcpDialer {
    /// Creates a dialer. A zero `timeout` waits for the OS connect timeout.
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// The connect timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Default for TcpDialer {
    fn default() -> Self {
        Self::new(DEFAULT_DIAL_TIMEOUT)
    }
}

impl Service<Endpoint> for TcpDialer {
    type Response = NetStream;
    type Error = io::Error;
    type Future = BoxFuture<'static, io::Result<NetStream>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, endpoint: Endpoint) -> Self::Future {
        let timeout = self.timeout;
        Box::pin(async move {
            if timeout.is_zero() {
                return connect(&endpoint).await;
            }
            tokio::time::timeout(timeout, connect(&endpoint))
                .await
                .map_err(|_| {
                    io::Error::new(
                        io::ErrorKind::TimedOut,
                        format!("dial {endpoint}: timed out after {timeout:?}"),
                    )
                })?
        })
    }
}

async fn connect(endpoint: &Endpoint) -> io::Result<NetStream> {
    match endpoint.network() {
        Network::Tcp => {
            let mut last_err = None;
            for addr in tokio::net::lookup_host(endpoint.addr()).await? {
                let socket = if addr.is_ipv4() {
                    TcpSocket::new_v4()?
                } else {
                    TcpSocket::new_v6()?
                };
                socket.set_keepalive(true)?;
                match socket.connect(addr).await {
                    Ok(stream) => {
                        stream.set_nodelay(true)?;
                        return Ok(NetStream::Tcp(stream));
                    }
                    Err(e) => last_err = Some(e),
                }
            }
            Err(last_err.unwrap_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("dial {endpoint}: address resolved to nothing"),
                )
            }))
        }
        #[cfg(unix)]
        Network::Unix => Ok(NetStream::Unix(UnixStream::connect(endpoint.addr()).await?)),
    }
}
