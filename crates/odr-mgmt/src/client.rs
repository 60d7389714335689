//! Ready-to-use clients for the stats server and the remote control server.
//!
//! Each client owns one session, verifies the peer while connecting, and
//! applies the deadlines from [`ClientSettings`] to every call.

use std::time::Duration;

use odr_types::{RcModule, ServiceIdentity, StatsSnapshot};

use crate::endpoint::Endpoint;
use crate::engine::ping;
use crate::error::Result;
use crate::handshake::validate;
use crate::ptree::{self, ConfigReply, ConfigTree};
use crate::rc;
use crate::session::Session;
use crate::settings::ClientSettings;
use crate::stats::query_values;
use crate::transport::{MuxTransport, Transport};

/// Client for the statistics and configuration server.
pub struct StatsClient<T: Transport = MuxTransport> {
    session: Session<T>,
    identity: ServiceIdentity,
    liveness: Duration,
    bulk: Duration,
}

impl StatsClient {
    /// Connect to the stats server and run the handshake.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Connect`] for an unreachable endpoint and
    /// [`crate::Error::ProtocolMismatch`] when another service answers.
    pub async fn connect(settings: &ClientSettings) -> Result<Self> {
        Self::connect_to(settings.stats_endpoint(), settings).await
    }

    /// Connect to the legacy stream management server instead.
    ///
    /// # Errors
    ///
    /// Same as [`StatsClient::connect`].
    pub async fn connect_legacy(settings: &ClientSettings) -> Result<Self> {
        Self::connect_to(settings.legacy_endpoint(), settings).await
    }

    /// Connect to an explicit endpoint.
    ///
    /// # Errors
    ///
    /// Same as [`StatsClient::connect`].
    pub async fn connect_to(endpoint: Endpoint, settings: &ClientSettings) -> Result<Self> {
        let session = Session::open(endpoint, settings.connect_timeout()).await?;
        Self::from_session(session, settings).await
    }
}

impl<T: Transport> StatsClient<T> {
    /// Verify the peer behind an already opened session.
    ///
    /// # Errors
    ///
    /// Any handshake failure; the session is dropped.
    pub async fn from_session(mut session: Session<T>, settings: &ClientSettings) -> Result<Self> {
        let identity = validate(
            &mut session,
            &settings.expected_service,
            settings.liveness_timeout(),
        )
        .await?;

        tracing::info!("Connected to {} at {}", identity, session.endpoint());

        Ok(Self {
            session,
            identity,
            liveness: settings.liveness_timeout(),
            bulk: settings.bulk_timeout(),
        })
    }

    #[must_use]
    pub fn identity(&self) -> &ServiceIdentity {
        &self.identity
    }

    #[must_use]
    pub fn session(&self) -> &Session<T> {
        &self.session
    }

    /// # Errors
    ///
    /// Timeout, transport and decode errors of the `values` transaction.
    pub async fn values(&mut self) -> Result<StatsSnapshot> {
        query_values(&mut self.session, self.liveness).await
    }

    /// # Errors
    ///
    /// Timeout, transport and decode errors of the `config` transaction.
    pub async fn config(&mut self) -> Result<ConfigReply> {
        ptree::query_config(&mut self.session, self.bulk).await
    }

    /// # Errors
    ///
    /// Timeout, transport and decode errors of the `getptree` transaction.
    pub async fn read_tree(&mut self) -> Result<ConfigTree> {
        ptree::read_tree(&mut self.session, self.bulk).await
    }

    /// Returns whether the daemon accepted the tree.
    ///
    /// # Errors
    ///
    /// Timeout and transport errors of the `setptree` transaction.
    pub async fn write_tree(&mut self, tree: &ConfigTree) -> Result<bool> {
        ptree::write_tree(&mut self.session, tree, self.bulk).await
    }

    pub fn close(mut self) {
        self.session.close();
    }
}

/// Client for the remote control server.
pub struct RemoteControlClient<T: Transport = MuxTransport> {
    session: Session<T>,
    timeout: Duration,
}

impl RemoteControlClient {
    /// Connect to the remote control server and ping it.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Connect`] for an unreachable endpoint and the
    /// ping failure otherwise.
    pub async fn connect(settings: &ClientSettings) -> Result<Self> {
        let session = Session::open(settings.rc_endpoint(), settings.connect_timeout()).await?;
        Self::from_session(session, settings).await
    }
}

impl<T: Transport> RemoteControlClient<T> {
    /// Ping the peer behind an already opened session.
    ///
    /// # Errors
    ///
    /// Any ping failure; the session is dropped.
    pub async fn from_session(mut session: Session<T>, settings: &ClientSettings) -> Result<Self> {
        ping(&mut session, settings.liveness_timeout()).await?;
        tracing::debug!("Remote control at {} is alive", session.endpoint());

        Ok(Self {
            session,
            timeout: settings.liveness_timeout(),
        })
    }

    #[must_use]
    pub fn session(&self) -> &Session<T> {
        &self.session
    }

    /// # Errors
    ///
    /// See [`rc::list_modules`].
    pub async fn list_modules(&mut self) -> Result<Vec<String>> {
        rc::list_modules(&mut self.session, self.timeout).await
    }

    /// # Errors
    ///
    /// See [`rc::load_modules`].
    pub async fn load_modules(&mut self) -> Result<Vec<RcModule>> {
        rc::load_modules(&mut self.session, self.timeout).await
    }

    /// # Errors
    ///
    /// See [`rc::get_parameter`].
    pub async fn get(&mut self, module: &str, parameter: &str) -> Result<String> {
        rc::get_parameter(&mut self.session, module, parameter, self.timeout).await
    }

    /// # Errors
    ///
    /// See [`rc::set_parameter`].
    pub async fn set(&mut self, module: &str, parameter: &str, value: &str) -> Result<()> {
        rc::set_parameter(&mut self.session, module, parameter, value, self.timeout).await
    }

    pub fn close(mut self) {
        self.session.close();
    }
}
