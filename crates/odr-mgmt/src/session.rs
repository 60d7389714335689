//! One request/reply channel to one management endpoint.
//!
//! A [`Session`] owns exactly one transport and allows at most one
//! outstanding request on it. The n-th reply on a session answers the n-th
//! request only because a new request is refused until the previous one
//! resolved, either with a reply or with a timeout.

use std::time::Duration;

use bytes::Bytes;
use odr_types::ServiceIdentity;

use crate::endpoint::Endpoint;
use crate::error::{Error, Result};
use crate::transport::{MuxTransport, Transport};

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Connected, peer not yet verified.
    Open,
    /// Peer verified by a handshake or ping.
    Verified,
    /// Peer failed verification; the session must not be used.
    Rejected,
    /// The underlying channel failed.
    Broken,
    Closed,
}

/// Result of waiting for a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Frames(Vec<Bytes>),
    TimedOut,
}

/// A connection to one endpoint, used for strictly sequential transactions.
pub struct Session<T: Transport = MuxTransport> {
    endpoint: Endpoint,
    transport: Option<T>,
    state: SessionState,
    pending: Option<String>,
    identity: Option<ServiceIdentity>,
}

impl<T: Transport> Session<T> {
    /// Connect to the endpoint, waiting at most `connect_timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connect`] if the endpoint is unreachable in time.
    pub async fn open(endpoint: Endpoint, connect_timeout: Duration) -> Result<Self> {
        let transport = T::connect(&endpoint, connect_timeout).await?;
        Ok(Self::with_transport(endpoint, transport))
    }

    /// Wrap an already connected transport.
    pub fn with_transport(endpoint: Endpoint, transport: T) -> Self {
        Self {
            endpoint,
            transport: Some(transport),
            state: SessionState::Open,
            pending: None,
            identity: None,
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Identity cached by a successful handshake.
    pub fn identity(&self) -> Option<&ServiceIdentity> {
        self.identity.as_ref()
    }

    pub fn is_usable(&self) -> bool {
        matches!(self.state, SessionState::Open | SessionState::Verified)
    }

    /// Command of the request still waiting for its reply, if any.
    pub fn pending_command(&self) -> Option<&str> {
        self.pending.as_deref()
    }

    fn ensure_usable(&self) -> Result<()> {
        match self.state {
            SessionState::Open | SessionState::Verified => Ok(()),
            SessionState::Rejected => Err(Error::SessionUnusable("peer failed verification")),
            SessionState::Broken => Err(Error::SessionUnusable("transport failed")),
            SessionState::Closed => Err(Error::SessionUnusable("session closed")),
        }
    }

    /// Fail unless the peer was verified by a handshake or ping.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionUnusable`] for dead sessions and
    /// [`Error::NotVerified`] for sessions that skipped verification.
    pub fn require_verified(&self) -> Result<()> {
        self.ensure_usable()?;
        if self.state == SessionState::Verified {
            Ok(())
        } else {
            Err(Error::NotVerified)
        }
    }

    pub(crate) fn mark_verified(&mut self, identity: Option<ServiceIdentity>) {
        if self.is_usable() {
            self.state = SessionState::Verified;
        }
        if identity.is_some() {
            self.identity = identity;
        }
    }

    pub(crate) fn reject(&mut self) {
        tracing::error!("Rejecting session to {}", self.endpoint);
        self.state = SessionState::Rejected;
    }

    /// Send one request as an atomic multi-part message.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TransactionPending`] if the previous request has not
    /// resolved yet, and a fatal transport error if sending fails.
    pub async fn send_frames(&mut self, frames: Vec<Bytes>) -> Result<()> {
        self.ensure_usable()?;
        if self.pending.is_some() {
            return Err(Error::TransactionPending);
        }

        let command = frames
            .first()
            .map(|f| String::from_utf8_lossy(f).into_owned())
            .unwrap_or_default();

        let Some(transport) = self.transport.as_mut() else {
            return Err(Error::SessionUnusable("session closed"));
        };

        tracing::debug!(
            "Sending '{}' ({} frames) to {}",
            command,
            frames.len(),
            self.endpoint
        );

        if let Err(e) = transport.send_frames(frames).await {
            self.state = SessionState::Broken;
            return Err(e);
        }

        self.pending = Some(command);
        Ok(())
    }

    /// Wait up to `timeout` for the reply to the pending request.
    ///
    /// A timeout is an outcome, not an error: the pending request is dropped,
    /// the transport is reset and the session stays usable. Resetting does
    /// not touch the network, so the call returns on schedule even when the
    /// daemon has gone away.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NothingPending`] if no request was sent, and a fatal
    /// transport error if the channel fails.
    pub async fn poll_receive(&mut self, timeout: Duration) -> Result<PollOutcome> {
        self.ensure_usable()?;
        let Some(command) = self.pending.clone() else {
            return Err(Error::NothingPending);
        };

        let Some(transport) = self.transport.as_mut() else {
            return Err(Error::SessionUnusable("session closed"));
        };

        match tokio::time::timeout(timeout, transport.recv_frames()).await {
            Ok(Ok(frames)) => {
                self.pending = None;
                tracing::debug!("Received {} frames for '{}'", frames.len(), command);
                Ok(PollOutcome::Frames(frames))
            }
            Ok(Err(e)) => {
                self.pending = None;
                self.state = SessionState::Broken;
                tracing::error!("Transport failed while waiting for '{}': {}", command, e);
                Err(e)
            }
            Err(_) => {
                self.pending = None;
                tracing::warn!(
                    "No reply to '{}' from {} within {} ms",
                    command,
                    self.endpoint,
                    timeout.as_millis()
                );
                if let Err(e) = transport.reset().await {
                    self.state = SessionState::Broken;
                    return Err(e);
                }
                Ok(PollOutcome::TimedOut)
            }
        }
    }

    /// Drop the channel. Any later use fails with [`Error::SessionUnusable`].
    pub fn close(&mut self) {
        self.transport = None;
        self.pending = None;
        self.state = SessionState::Closed;
    }
}
