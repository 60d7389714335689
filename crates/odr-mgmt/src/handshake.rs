//! Identity check performed before any other use of a session.

use std::time::Duration;

use odr_types::ServiceIdentity;

use crate::engine::{decode_json, execute, request};
use crate::error::{Error, Result};
use crate::session::Session;
use crate::transport::Transport;

/// Product prefix every ODR-DabMux service name starts with.
pub const DABMUX_SERVICE: &str = "ODR-DabMux";

/// Ask the peer who it is and accept it only if the service name starts with
/// `expected_prefix`.
///
/// The identity is cached on the session; validating an already verified
/// session returns the cached identity without another round trip. Any
/// failure rejects the session for good, since a wrong or silent service is
/// a configuration problem rather than a transient one.
///
/// # Errors
///
/// Returns [`Error::ProtocolMismatch`] for a foreign service, and the
/// underlying timeout, transport or decode error otherwise.
pub async fn validate<T: Transport>(
    session: &mut Session<T>,
    expected_prefix: &str,
    timeout: Duration,
) -> Result<ServiceIdentity> {
    if session.is_usable()
        && let Some(identity) = session.identity()
        && identity.matches(expected_prefix)
    {
        return Ok(identity.clone());
    }

    match query_identity(session, timeout).await {
        Ok(identity) if identity.matches(expected_prefix) => {
            tracing::debug!("Handshake with {}: {}", session.endpoint(), identity);
            session.mark_verified(Some(identity.clone()));
            Ok(identity)
        }
        Ok(identity) => {
            session.reject();
            Err(Error::ProtocolMismatch {
                expected: expected_prefix.to_string(),
                found: identity.service_name,
            })
        }
        Err(e) => {
            session.reject();
            Err(e)
        }
    }
}

/// Both transports put the identity JSON in the first reply frame; the stream
/// server additionally appends its answer to the unknown command.
async fn query_identity<T: Transport>(
    session: &mut Session<T>,
    timeout: Duration,
) -> Result<ServiceIdentity> {
    let reply = execute(session, request(["info"]), timeout).await?;
    let Some(first) = reply.first() else {
        return Err(Error::malformed("info", "empty reply"));
    };
    decode_json("info", first)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::Endpoint;
    use crate::session::SessionState;
    use crate::transport::mock::{Log, Script, ScriptedTransport, reply};

    fn session(scripts: Vec<Script>) -> (Session<ScriptedTransport>, Log) {
        let (transport, log) = ScriptedTransport::new(scripts);
        (
            Session::with_transport(Endpoint::stats("localhost"), transport),
            log,
        )
    }

    #[tokio::test]
    async fn test_handshake_accepts_dabmux() {
        let (mut session, log) = session(vec![reply(&[
            r#"{"service": "ODR-DabMux v4.4.0", "version": "v4.4.0"}"#,
        ])]);

        let identity = validate(&mut session, DABMUX_SERVICE, Duration::from_secs(1))
            .await
            .unwrap();

        assert_eq!(identity.service_name, "ODR-DabMux v4.4.0");
        assert_eq!(identity.version, "v4.4.0");
        assert_eq!(session.state(), SessionState::Verified);
        assert_eq!(session.identity(), Some(&identity));
        assert_eq!(log.sent_text(), vec![vec!["info".to_string()]]);
    }

    #[tokio::test]
    async fn test_handshake_is_cached() {
        let (mut session, log) = session(vec![reply(&[
            r#"{"service": "ODR-DabMux v4.4.0", "version": "v4.4.0"}"#,
        ])]);

        validate(&mut session, DABMUX_SERVICE, Duration::from_secs(1))
            .await
            .unwrap();
        let again = validate(&mut session, DABMUX_SERVICE, Duration::from_secs(1))
            .await
            .unwrap();

        assert_eq!(again.version, "v4.4.0");
        assert_eq!(log.sent_text().len(), 1);
    }

    #[tokio::test]
    async fn test_handshake_rejects_other_product() {
        let (mut session, _log) = session(vec![reply(&[
            r#"{"service": "Other-Product v1", "version": "1"}"#,
        ])]);

        let err = validate(&mut session, DABMUX_SERVICE, Duration::from_secs(1))
            .await
            .unwrap_err();

        match &err {
            Error::ProtocolMismatch { expected, found } => {
                assert_eq!(expected, "ODR-DabMux");
                assert_eq!(found, "Other-Product v1");
            }
            other => panic!("Expected ProtocolMismatch, got {other:?}"),
        }
        assert!(err.is_fatal());
        assert_eq!(session.state(), SessionState::Rejected);
        assert!(!session.is_usable());
        assert!(session.identity().is_none());
    }

    #[tokio::test]
    async fn test_handshake_tolerates_missing_version() {
        let (mut session, _log) = session(vec![reply(&[
            r#"{ "service": "ODR-DabMux v1.2.0 MGMT Server" }"#,
            "Invalid command\n",
        ])]);

        let identity = validate(&mut session, DABMUX_SERVICE, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(identity.version, odr_types::UNKNOWN);
    }

    #[tokio::test]
    async fn test_handshake_garbage_rejects_session() {
        let (mut session, _log) = session(vec![reply(&["hello there"])]);

        let err = validate(&mut session, DABMUX_SERVICE, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MalformedReply { .. }));
        assert_eq!(session.state(), SessionState::Rejected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_handshake_timeout_rejects_session() {
        let (mut session, _log) = session(vec![Script::Silent]);

        let err = validate(&mut session, DABMUX_SERVICE, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout { .. }));
        assert_eq!(session.state(), SessionState::Rejected);
    }
}
