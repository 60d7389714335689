//! Client for the ODR-DabMux management and telemetry protocols.
//!
//! The multiplexer exposes three servers: the stats server (input statistics
//! and the live configuration tree), the remote control server (module
//! parameters) and, on old releases, a line-based stream management server.
//! This crate speaks all three.
//!
//! # Architecture
//!
//! - [`transport`]: ZeroMQ REQ and legacy TCP frame transports
//! - [`session`]: one connection, at most one outstanding request
//! - [`engine`]: request/reply transactions with a deadline, and `ping`
//! - [`handshake`]: service identity check before first use
//! - [`stats`], [`ptree`], [`rc`]: protocol decoders
//! - [`views`]: typed records built from a configuration tree
//! - [`client`]: connected, verified clients with configured deadlines
//!
//! # Example
//!
//! ```no_run
//! use odr_mgmt::{ClientSettings, StatsClient};
//!
//! # async fn example() -> odr_mgmt::Result<()> {
//! let settings = ClientSettings::default();
//! let mut client = StatsClient::connect(&settings).await?;
//!
//! for (ident, stat) in client.values().await?.iter() {
//!     println!("{ident}: {} underruns", stat.num_underruns);
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod endpoint;
pub mod engine;
pub mod error;
pub mod handshake;
pub mod ptree;
pub mod rc;
pub mod session;
pub mod settings;
pub mod stats;
pub mod transport;
pub mod views;

pub use client::{RemoteControlClient, StatsClient};
pub use endpoint::{DEFAULT_RC_PORT, DEFAULT_STATS_PORT, Endpoint, TransportKind};
pub use error::{Error, Result};
pub use handshake::DABMUX_SERVICE;
pub use ptree::{ConfigReply, ConfigTree};
pub use session::{PollOutcome, Session, SessionState};
pub use settings::ClientSettings;
pub use transport::{MuxTransport, StreamTransport, Transport, ZmqTransport};
