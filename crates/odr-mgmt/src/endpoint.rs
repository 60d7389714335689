//! Server endpoints exposed by the multiplexer.

use std::fmt;

/// Default port of the statistics/configuration server.
pub const DEFAULT_STATS_PORT: u16 = 12720;

/// Default port of the ZeroMQ remote control server.
pub const DEFAULT_RC_PORT: u16 = 12722;

/// How frames travel to the endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    /// ZeroMQ REQ/REP socket carrying multi-part messages.
    MessageQueue,
    /// Plain TCP stream: one connection per command, welcome line first.
    Stream,
}

/// A host/port pair plus the transport used to reach it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    host: String,
    port: u16,
    kind: TransportKind,
}

impl Endpoint {
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16, kind: TransportKind) -> Self {
        Self {
            host: host.into(),
            port,
            kind,
        }
    }

    /// Statistics server on its conventional port.
    #[must_use]
    pub fn stats(host: impl Into<String>) -> Self {
        Self::new(host, DEFAULT_STATS_PORT, TransportKind::MessageQueue)
    }

    /// Remote control server on its conventional port.
    #[must_use]
    pub fn remote_control(host: impl Into<String>) -> Self {
        Self::new(host, DEFAULT_RC_PORT, TransportKind::MessageQueue)
    }

    /// Legacy stream management server on its conventional port.
    #[must_use]
    pub fn legacy(host: impl Into<String>) -> Self {
        Self::new(host, DEFAULT_STATS_PORT, TransportKind::Stream)
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    #[must_use]
    pub fn kind(&self) -> TransportKind {
        self.kind
    }

    /// `tcp://host:port`, as understood by ZeroMQ.
    #[must_use]
    pub fn zmq_url(&self) -> String {
        format!("tcp://{}:{}", self.host, self.port)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TransportKind::MessageQueue => f.write_str(&self.zmq_url()),
            TransportKind::Stream => write!(f, "{}:{} (stream)", self.host, self.port),
        }
    }
}
