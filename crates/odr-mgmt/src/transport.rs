//! Frame transports to the multiplexer's management servers.
//!
//! Two bindings exist on the daemon side:
//!
//! - ZeroMQ REQ/REP (stats server and remote control): every request and
//!   reply is a multi-part message, each part one frame.
//! - Legacy TCP stream (old management server): the daemon writes a
//!   newline-terminated welcome JSON on accept, reads the command with a
//!   single `read`, writes its reply and closes the connection.
//!
//! ```text
//! stream reply frames:
//! +---------------------------+-----------------------------+
//! |  frame 0                  |  frame 1 (omitted if empty) |
//! |  {"service": "..."}       |  reply body up to EOF       |
//! +---------------------------+-----------------------------+
//! ```
//!
//! Both are hidden behind [`Transport`], which only moves ordered frame
//! groups. Timeouts and request/reply pairing are the session's concern.

use std::future::Future;
use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use zeromq::{ReqSocket, Socket, SocketRecv, SocketSend, ZmqMessage};

use crate::endpoint::{Endpoint, TransportKind};
use crate::error::{Error, Result};

/// A channel that moves ordered frame groups to one endpoint and back.
pub trait Transport: Send + Sized {
    /// Establish the channel within `deadline`. Unreachable endpoints yield
    /// [`Error::Connect`].
    fn connect(endpoint: &Endpoint, deadline: Duration)
    -> impl Future<Output = Result<Self>> + Send;

    /// Send all frames as one atomic multi-part message.
    fn send_frames(&mut self, frames: Vec<Bytes>) -> impl Future<Output = Result<()>> + Send;

    /// Wait for the next reply message. May wait forever; callers bound it.
    fn recv_frames(&mut self) -> impl Future<Output = Result<Vec<Bytes>>> + Send;

    /// Drop any half-finished exchange so the next request starts clean.
    /// Must not wait on the network.
    fn reset(&mut self) -> impl Future<Output = Result<()>> + Send;
}

fn connect_error(endpoint: &Endpoint, message: impl ToString) -> Error {
    Error::Connect {
        endpoint: endpoint.to_string(),
        message: message.to_string(),
    }
}

fn connect_timed_out(endpoint: &Endpoint, deadline: Duration) -> Error {
    connect_error(
        endpoint,
        format!("no connection within {} ms", deadline.as_millis()),
    )
}

/// ZeroMQ REQ socket transport.
///
/// After a reset the socket is gone until the next request reopens it.
pub struct ZmqTransport {
    endpoint: Endpoint,
    deadline: Duration,
    socket: Option<ReqSocket>,
}

impl ZmqTransport {
    /// `zeromq` retries a refused connection forever, so the deadline is
    /// the only way to report an unreachable daemon.
    async fn open_socket(endpoint: &Endpoint, deadline: Duration) -> Result<ReqSocket> {
        let mut socket = ReqSocket::new();
        let url = endpoint.zmq_url();
        let connected = tokio::time::timeout(deadline, socket.connect(&url)).await;

        match connected {
            Ok(Ok(())) => Ok(socket),
            Ok(Err(e)) => Err(connect_error(endpoint, e)),
            Err(_) => Err(connect_timed_out(endpoint, deadline)),
        }
    }
}

impl Transport for ZmqTransport {
    async fn connect(endpoint: &Endpoint, deadline: Duration) -> Result<Self> {
        let socket = Self::open_socket(endpoint, deadline).await?;
        tracing::debug!("Connected REQ socket to {endpoint}");
        Ok(Self {
            endpoint: endpoint.clone(),
            deadline,
            socket: Some(socket),
        })
    }

    async fn send_frames(&mut self, frames: Vec<Bytes>) -> Result<()> {
        let mut frames = frames.into_iter();
        let Some(first) = frames.next() else {
            return Err(Error::Transport("refusing to send an empty message".into()));
        };

        let mut message = ZmqMessage::from(first);
        for frame in frames {
            message.push_back(frame);
        }

        let mut socket = match self.socket.take() {
            Some(socket) => socket,
            None => {
                let socket = Self::open_socket(&self.endpoint, self.deadline).await?;
                tracing::debug!("Reopened REQ socket to {}", self.endpoint);
                socket
            }
        };

        socket.send(message).await?;
        self.socket = Some(socket);
        Ok(())
    }

    async fn recv_frames(&mut self) -> Result<Vec<Bytes>> {
        let Some(socket) = self.socket.as_mut() else {
            return Err(Error::Transport("no request was sent".into()));
        };
        let message = socket.recv().await?;
        Ok(message.into_vec())
    }

    /// A REQ socket that missed its reply cannot send again, so drop it.
    async fn reset(&mut self) -> Result<()> {
        self.socket = None;
        Ok(())
    }
}

/// Pause between the frames of one command.
///
/// The stream server takes the command from a single `read` and compares it
/// verbatim, so a payload frame must not arrive in that same read.
pub const FRAME_GAP: Duration = Duration::from_millis(50);

/// Legacy TCP stream transport, one connection per command.
pub struct StreamTransport {
    endpoint: Endpoint,
    deadline: Duration,
    stream: Option<TcpStream>,
}

impl StreamTransport {
    async fn open_stream(endpoint: &Endpoint, deadline: Duration) -> Result<TcpStream> {
        let connecting = TcpStream::connect((endpoint.host(), endpoint.port()));
        let stream = match tokio::time::timeout(deadline, connecting).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(connect_error(endpoint, e)),
            Err(_) => return Err(connect_timed_out(endpoint, deadline)),
        };
        stream.set_nodelay(true)?;
        Ok(stream)
    }
}

impl Transport for StreamTransport {
    async fn connect(endpoint: &Endpoint, deadline: Duration) -> Result<Self> {
        let stream = Self::open_stream(endpoint, deadline).await?;
        tracing::debug!("Connected stream to {endpoint}");
        Ok(Self {
            endpoint: endpoint.clone(),
            deadline,
            stream: Some(stream),
        })
    }

    async fn send_frames(&mut self, frames: Vec<Bytes>) -> Result<()> {
        if frames.is_empty() {
            return Err(Error::Transport("refusing to send an empty message".into()));
        }

        // The daemon closes after every command
        let mut stream = match self.stream.take() {
            Some(stream) => stream,
            None => Self::open_stream(&self.endpoint, self.deadline).await?,
        };

        for (i, frame) in frames.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(FRAME_GAP).await;
            }
            // One write per line so the daemon's read sees it whole
            let mut line = frame.to_vec();
            if !line.ends_with(b"\n") {
                line.push(b'\n');
            }
            stream.write_all(&line).await?;
            stream.flush().await?;
        }

        self.stream = Some(stream);
        Ok(())
    }

    async fn recv_frames(&mut self) -> Result<Vec<Bytes>> {
        let Some(stream) = self.stream.take() else {
            return Err(Error::Transport("no command was sent".into()));
        };

        let mut reader = BufReader::new(stream);

        let mut welcome = String::new();
        if reader.read_line(&mut welcome).await? == 0 {
            return Err(Error::Transport(format!(
                "{} closed the connection without a welcome line",
                self.endpoint
            )));
        }

        let mut body = Vec::new();
        reader.read_to_end(&mut body).await?;

        let mut frames = vec![Bytes::from(welcome.trim_end().to_string())];
        if !body.is_empty() {
            frames.push(Bytes::from(body));
        }
        Ok(frames)
    }

    async fn reset(&mut self) -> Result<()> {
        self.stream = None;
        Ok(())
    }
}

/// Transport selected by the endpoint's [`TransportKind`].
pub enum MuxTransport {
    MessageQueue(ZmqTransport),
    Stream(StreamTransport),
}

impl Transport for MuxTransport {
    async fn connect(endpoint: &Endpoint, deadline: Duration) -> Result<Self> {
        match endpoint.kind() {
            TransportKind::MessageQueue => Ok(Self::MessageQueue(
                ZmqTransport::connect(endpoint, deadline).await?,
            )),
            TransportKind::Stream => Ok(Self::Stream(
                StreamTransport::connect(endpoint, deadline).await?,
            )),
        }
    }

    async fn send_frames(&mut self, frames: Vec<Bytes>) -> Result<()> {
        match self {
            Self::MessageQueue(t) => t.send_frames(frames).await,
            Self::Stream(t) => t.send_frames(frames).await,
        }
    }

    async fn recv_frames(&mut self) -> Result<Vec<Bytes>> {
        match self {
            Self::MessageQueue(t) => t.recv_frames().await,
            Self::Stream(t) => t.recv_frames().await,
        }
    }

    async fn reset(&mut self) -> Result<()> {
        match self {
            Self::MessageQueue(t) => t.reset().await,
            Self::Stream(t) => t.reset().await,
        }
    }
}

/// In-memory transport replaying scripted replies, for unit tests.
#[cfg(test)]
pub(crate) mod mock {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use bytes::Bytes;

    use super::Transport;
    use crate::endpoint::Endpoint;
    use crate::error::{Error, Result};

    /// What the fake daemon does with the next request.
    pub(crate) enum Script {
        Reply(Vec<Bytes>),
        Delayed(Duration, Vec<Bytes>),
        Silent,
        Fail(String),
    }

    pub(crate) fn frames(parts: &[&str]) -> Vec<Bytes> {
        parts.iter().map(|p| Bytes::from(p.to_string())).collect()
    }

    pub(crate) fn reply(parts: &[&str]) -> Script {
        Script::Reply(frames(parts))
    }

    /// Shared view of what the session sent, readable after the session
    /// took ownership of the transport.
    #[derive(Clone, Default)]
    pub(crate) struct Log {
        pub sent: Arc<Mutex<Vec<Vec<Bytes>>>>,
        pub resets: Arc<Mutex<usize>>,
    }

    impl Log {
        pub(crate) fn sent_text(&self) -> Vec<Vec<String>> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .map(|m| {
                    m.iter()
                        .map(|f| String::from_utf8_lossy(f).into_owned())
                        .collect()
                })
                .collect()
        }

        pub(crate) fn resets(&self) -> usize {
            *self.resets.lock().unwrap()
        }
    }

    #[derive(Default)]
    pub(crate) struct ScriptedTransport {
        scripts: VecDeque<Script>,
        current: Option<Script>,
        log: Log,
    }

    impl ScriptedTransport {
        pub(crate) fn new(scripts: Vec<Script>) -> (Self, Log) {
            let log = Log::default();
            let transport = Self {
                scripts: scripts.into(),
                current: None,
                log: log.clone(),
            };
            (transport, log)
        }
    }

    impl Transport for ScriptedTransport {
        async fn connect(_endpoint: &Endpoint, _deadline: Duration) -> Result<Self> {
            Ok(Self::default())
        }

        async fn send_frames(&mut self, frames: Vec<Bytes>) -> Result<()> {
            self.log.sent.lock().unwrap().push(frames);
            self.current = self.scripts.pop_front();
            Ok(())
        }

        async fn recv_frames(&mut self) -> Result<Vec<Bytes>> {
            match self.current.take() {
                Some(Script::Reply(frames)) => Ok(frames),
                Some(Script::Delayed(delay, frames)) => {
                    tokio::time::sleep(delay).await;
                    Ok(frames)
                }
                Some(Script::Fail(message)) => Err(Error::Transport(message)),
                Some(Script::Silent) | None => std::future::pending().await,
            }
        }

        async fn reset(&mut self) -> Result<()> {
            self.current = None;
            *self.log.resets.lock().unwrap() += 1;
            Ok(())
        }
    }
}
