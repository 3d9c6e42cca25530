//! The protocol connection: one async method per beanstalkd command.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::io;
use std::str::FromStr;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufStream};

use crate::error::{Error, ProtocolError, Result};
use crate::tube::{check_name, Tube, TubeSet, DEFAULT_TUBE};
use crate::yaml;

/// Largest body accepted in a reply. Matches beanstalkd's own ceiling on
/// `max-job-size`.
pub const MAX_BODY_LEN: usize = 1 << 30;

/// A beanstalkd connection over any byte stream.
///
/// `Conn` remembers which tube it is `use`-ing and which tubes it is
/// watching, so tube-scoped commands only send the `use` / `watch` /
/// `ignore` prelude when the requested tube differs from the server-side
/// session state. A fresh connection uses and watches `default`.
///
/// Replies are matched to requests by order alone. If a command's future is
/// dropped between sending and reading its reply, or a `use` / `watch`
/// prelude is refused, the connection is left out of step with the server
/// and [`in_flight`](Conn::in_flight) stays set; such a connection must be
/// discarded.
pub struct Conn<T> {
    stream: BufStream<T>,
    used: String,
    watched: BTreeSet<String>,
    in_flight: Option<&'static str>,
}

impl<T> fmt::Debug for Conn<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Conn")
            .field("used", &self.used)
            .field("watched", &self.watched)
            .field("in_flight", &self.in_flight)
            .finish_non_exhaustive()
    }
}

impl<T> Conn<T>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    /// Wraps a connected transport.
    pub fn new(transport: T) -> Self {
        Self {
            stream: BufStream::new(transport),
            used: DEFAULT_TUBE.to_string(),
            watched: BTreeSet::from([DEFAULT_TUBE.to_string()]),
            in_flight: None,
        }
    }

    /// The command whose reply has not been fully read, if any.
    ///
    /// Set when a request is sent and cleared once its final reply line and
    /// any body have been consumed. While set, the next reply on the stream
    /// does not belong to the next command.
    pub fn in_flight(&self) -> Option<&'static str> {
        self.in_flight
    }

    /// The tube the server believes this connection is using.
    pub fn used(&self) -> &str {
        &self.used
    }

    /// The tubes the server believes this connection is watching.
    pub fn watched(&self) -> impl Iterator<Item = &str> {
        self.watched.iter().map(String::as_str)
    }

    /// Puts a job into `tube` and returns the id the server assigned.
    pub async fn put(
        &mut self,
        tube: &Tube,
        body: &[u8],
        pri: u32,
        delay: Duration,
        ttr: Duration,
    ) -> Result<u64> {
        const OP: &str = "put";

        let mut req = Vec::with_capacity(body.len() + 64);
        let using = self.use_prelude(tube, &mut req)?;
        push_line(
            &mut req,
            &format!(
                "put {} {} {} {}",
                pri,
                delay.as_secs(),
                ttr.as_secs(),
                body.len()
            ),
        );
        req.extend_from_slice(body);
        req.extend_from_slice(b"\r\n");

        self.send(OP, &req).await?;
        self.finish_use(OP, using).await?;
        let reply = self.expect(OP, "INSERTED").await;
        let args = self.complete(reply)?;
        parse_arg(OP, &args, 0)
    }

    /// Deletes a job.
    pub async fn delete(&mut self, id: u64) -> Result<()> {
        self.simple("delete", format!("delete {id}"), "DELETED")
            .await
    }

    /// Releases a reserved job back to the ready queue after `delay`, with
    /// priority `pri`.
    pub async fn release(&mut self, id: u64, pri: u32, delay: Duration) -> Result<()> {
        self.simple(
            "release",
            format!("release {} {} {}", id, pri, delay.as_secs()),
            "RELEASED",
        )
        .await
    }

    /// Buries a reserved job with priority `pri`.
    pub async fn bury(&mut self, id: u64, pri: u32) -> Result<()> {
        self.simple("bury", format!("bury {id} {pri}"), "BURIED")
            .await
    }

    /// Moves a single buried or delayed job to the ready queue.
    pub async fn kick_job(&mut self, id: u64) -> Result<()> {
        self.simple("kick-job", format!("kick-job {id}"), "KICKED")
            .await
    }

    /// Resets the TTR timer of a reserved job.
    pub async fn touch(&mut self, id: u64) -> Result<()> {
        self.simple("touch", format!("touch {id}"), "TOUCHED")
            .await
    }

    /// Fetches the body of a job by id.
    pub async fn peek(&mut self, id: u64) -> Result<Vec<u8>> {
        const OP: &str = "peek";

        let mut req = Vec::new();
        push_line(&mut req, &format!("peek {id}"));
        self.send(OP, &req).await?;
        let (_, body) = self.read_job(OP, "FOUND").await?;
        Ok(body)
    }

    /// Fetches the job at the front of `tube`'s ready queue.
    pub async fn peek_ready(&mut self, tube: &Tube) -> Result<(u64, Vec<u8>)> {
        self.peek_in(tube, "peek-ready").await
    }

    /// Fetches the delayed job in `tube` that becomes ready next.
    pub async fn peek_delayed(&mut self, tube: &Tube) -> Result<(u64, Vec<u8>)> {
        self.peek_in(tube, "peek-delayed").await
    }

    /// Fetches the buried job in `tube` that would be kicked next.
    pub async fn peek_buried(&mut self, tube: &Tube) -> Result<(u64, Vec<u8>)> {
        self.peek_in(tube, "peek-buried").await
    }

    /// Kicks up to `bound` buried (or, if none, delayed) jobs in `tube` and
    /// returns how many were moved.
    pub async fn kick(&mut self, tube: &Tube, bound: u64) -> Result<u64> {
        const OP: &str = "kick";

        let mut req = Vec::new();
        let using = self.use_prelude(tube, &mut req)?;
        push_line(&mut req, &format!("kick {bound}"));

        self.send(OP, &req).await?;
        self.finish_use(OP, using).await?;
        let reply = self.expect(OP, "KICKED").await;
        let args = self.complete(reply)?;
        parse_arg(OP, &args, 0)
    }

    /// Server-wide statistics.
    pub async fn stats(&mut self) -> Result<HashMap<String, String>> {
        let body = self.read_yaml("stats", "stats".to_string()).await?;
        Ok(yaml::parse_dict(&body))
    }

    /// Statistics for one job.
    pub async fn stats_job(&mut self, id: u64) -> Result<HashMap<String, String>> {
        let body = self
            .read_yaml("stats-job", format!("stats-job {id}"))
            .await?;
        Ok(yaml::parse_dict(&body))
    }

    /// Statistics for one tube.
    pub async fn stats_tube(&mut self, tube: &Tube) -> Result<HashMap<String, String>> {
        check_name(tube.name())?;
        let body = self
            .read_yaml("stats-tube", format!("stats-tube {}", tube.name()))
            .await?;
        Ok(yaml::parse_dict(&body))
    }

    /// Names of all tubes that currently exist on the server.
    pub async fn list_tubes(&mut self) -> Result<Vec<String>> {
        let body = self
            .read_yaml("list-tubes", "list-tubes".to_string())
            .await?;
        Ok(yaml::parse_list(&body))
    }

    /// Stops `tube` from handing out jobs for `duration`.
    pub async fn pause_tube(&mut self, tube: &Tube, duration: Duration) -> Result<()> {
        check_name(tube.name())?;
        self.simple(
            "pause-tube",
            format!("pause-tube {} {}", tube.name(), duration.as_secs()),
            "PAUSED",
        )
        .await
    }

    /// Reserves a job from any tube in `tubes`, waiting server-side up to
    /// `timeout` for one to become ready.
    pub async fn reserve(&mut self, tubes: &TubeSet, timeout: Duration) -> Result<(u64, Vec<u8>)> {
        const OP: &str = "reserve-with-timeout";

        let mut req = Vec::new();
        let watching = self.watch_prelude(tubes, &mut req)?;
        push_line(
            &mut req,
            &format!("reserve-with-timeout {}", timeout.as_secs()),
        );

        self.send(OP, &req).await?;
        for _ in 0..watching {
            self.expect(OP, "WATCHING").await?;
        }
        if watching > 0 {
            self.watched = tubes.as_set().clone();
        }
        self.read_job(OP, "RESERVED").await
    }

    /// Flushes and shuts the transport down.
    pub async fn close(mut self) -> Result<()> {
        self.stream
            .shutdown()
            .await
            .map_err(|e| Error::network("close", e))
    }

    async fn simple(
        &mut self,
        op: &'static str,
        command: String,
        expected: &'static str,
    ) -> Result<()> {
        let mut req = Vec::new();
        push_line(&mut req, &command);
        self.send(op, &req).await?;
        let reply = self.expect(op, expected).await.map(drop);
        self.complete(reply)
    }

    async fn peek_in(&mut self, tube: &Tube, op: &'static str) -> Result<(u64, Vec<u8>)> {
        let mut req = Vec::new();
        let using = self.use_prelude(tube, &mut req)?;
        push_line(&mut req, op);

        self.send(op, &req).await?;
        self.finish_use(op, using).await?;
        self.read_job(op, "FOUND").await
    }

    async fn read_yaml(&mut self, op: &'static str, command: String) -> Result<Vec<u8>> {
        let mut req = Vec::new();
        push_line(&mut req, &command);
        self.send(op, &req).await?;

        let args = match self.expect(op, "OK").await {
            Ok(args) => args,
            Err(err) => return self.complete(Err(err)),
        };
        let len = parse_arg(op, &args, 0)?;
        let body = self.read_body(op, len).await?;
        self.in_flight = None;
        Ok(body)
    }

    fn use_prelude(&self, tube: &Tube, req: &mut Vec<u8>) -> Result<Option<String>> {
        if tube.name() == self.used {
            return Ok(None);
        }
        check_name(tube.name())?;
        push_line(req, &format!("use {}", tube.name()));
        Ok(Some(tube.name().to_string()))
    }

    async fn finish_use(&mut self, op: &'static str, using: Option<String>) -> Result<()> {
        if let Some(name) = using {
            self.expect(op, "USING").await?;
            self.used = name;
        }
        Ok(())
    }

    // Watches before ignoring so the connection never drops to zero
    // watched tubes, which the server refuses with NOT_IGNORED.
    fn watch_prelude(&self, tubes: &TubeSet, req: &mut Vec<u8>) -> Result<usize> {
        if tubes.is_empty() {
            return Err(Error::InvalidName {
                name: String::new(),
                reason: "tube set is empty",
            });
        }

        let mut replies = 0;
        for name in tubes.names() {
            if !self.watched.contains(name) {
                check_name(name)?;
                push_line(req, &format!("watch {name}"));
                replies += 1;
            }
        }
        for name in &self.watched {
            if !tubes.contains(name) {
                push_line(req, &format!("ignore {name}"));
                replies += 1;
            }
        }
        Ok(replies)
    }

    async fn send(&mut self, op: &'static str, req: &[u8]) -> Result<()> {
        #[cfg(feature = "tracing")]
        tracing::trace!(op, bytes = req.len(), "sending command");

        self.in_flight = Some(op);
        self.stream
            .write_all(req)
            .await
            .map_err(|e| Error::network(op, e))?;
        self.stream
            .flush()
            .await
            .map_err(|e| Error::network(op, e))
    }

    /// Marks the request answered once its final reply has been consumed.
    ///
    /// A negative reply never carries a body, so the stream is back in step
    /// after it. Network failures and unparsable replies leave the request
    /// in flight.
    fn complete<R>(&mut self, reply: Result<R>) -> Result<R> {
        match &reply {
            Ok(_) => self.in_flight = None,
            Err(Error::Protocol { reason, .. }) if *reason != ProtocolError::BadReply => {
                self.in_flight = None
            }
            Err(_) => {}
        }
        reply
    }

    /// Reads one reply line and returns its arguments if its first word is
    /// `expected`.
    async fn expect(&mut self, op: &'static str, expected: &str) -> Result<Vec<String>> {
        let line = self.read_line(op).await?;
        let mut words = line.split(' ');
        let word = words.next().unwrap_or_default();

        if word == expected {
            return Ok(words.map(str::to_string).collect());
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(op, reply = %line, "negative reply");

        let reason = ProtocolError::from_reply(word).unwrap_or(ProtocolError::BadReply);
        Err(Error::protocol(op, reason))
    }

    async fn read_line(&mut self, op: &'static str) -> Result<String> {
        let mut raw = Vec::new();
        let n = self
            .stream
            .read_until(b'\n', &mut raw)
            .await
            .map_err(|e| Error::network(op, e))?;
        if n == 0 || raw.last() != Some(&b'\n') {
            return Err(Error::network(op, io::ErrorKind::UnexpectedEof.into()));
        }

        let line = raw
            .strip_suffix(b"\r\n")
            .ok_or_else(|| Error::protocol(op, ProtocolError::BadReply))?;
        String::from_utf8(line.to_vec()).map_err(|_| Error::protocol(op, ProtocolError::BadReply))
    }

    async fn read_job(&mut self, op: &'static str, expected: &str) -> Result<(u64, Vec<u8>)> {
        let args = match self.expect(op, expected).await {
            Ok(args) => args,
            Err(err) => return self.complete(Err(err)),
        };
        let id = parse_arg(op, &args, 0)?;
        let len = parse_arg(op, &args, 1)?;
        let body = self.read_body(op, len).await?;
        self.in_flight = None;
        Ok((id, body))
    }

    async fn read_body(&mut self, op: &'static str, len: usize) -> Result<Vec<u8>> {
        let framed = len
            .checked_add(2)
            .filter(|_| len <= MAX_BODY_LEN)
            .ok_or_else(|| Error::protocol(op, ProtocolError::BadReply))?;
        let mut body = vec![0; framed];
        self.stream
            .read_exact(&mut body)
            .await
            .map_err(|e| Error::network(op, e))?;
        if !body.ends_with(b"\r\n") {
            return Err(Error::protocol(op, ProtocolError::BadReply));
        }
        body.truncate(len);
        Ok(body)
    }
}

fn push_line(req: &mut Vec<u8>, line: &str) {
    req.extend_from_slice(line.as_bytes());
    req.extend_from_slice(b"\r\n");
}

fn parse_arg<N: FromStr>(op: &'static str, args: &[String], index: usize) -> Result<N> {
    args.get(index)
        .and_then(|arg| arg.parse().ok())
        .ok_or_else(|| Error::protocol(op, ProtocolError::BadReply))
}
