//! Request/reply transactions over a [`Session`].
//!
//! Every decoder in this crate is built from [`execute`]: send the request
//! frames, wait a bounded time, hand the reply frames back verbatim. Nothing
//! here retries; that is the caller's decision.

use std::time::Duration;

use bytes::Bytes;
use serde::de::DeserializeOwned;

use crate::endpoint::TransportKind;
use crate::error::{Error, Result};
use crate::session::{PollOutcome, Session};
use crate::transport::Transport;

/// Sentinel the remote control server answers a ping with.
pub const PING_REPLY: &[u8] = b"ok";

/// Build request frames from text parts.
pub fn request<I, S>(parts: I) -> Vec<Bytes>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    parts.into_iter().map(|p| Bytes::from(p.into())).collect()
}

/// Run one request/reply cycle.
///
/// # Errors
///
/// Returns [`Error::Timeout`] when no reply arrives within `timeout`, leaving
/// the session usable. Transport failures and misuse of the session are
/// passed through from [`Session`].
pub async fn execute<T: Transport>(
    session: &mut Session<T>,
    frames: Vec<Bytes>,
    timeout: Duration,
) -> Result<Vec<Bytes>> {
    let command = frames
        .first()
        .map(|f| String::from_utf8_lossy(f).into_owned())
        .unwrap_or_default();

    session.send_frames(frames).await?;

    match session.poll_receive(timeout).await? {
        PollOutcome::Frames(reply) => Ok(reply),
        PollOutcome::TimedOut => Err(Error::Timeout { command, timeout }),
    }
}

/// Check that the peer is alive before issuing real commands.
///
/// A ping that fails in any way, including a timeout, leaves the session
/// rejected.
///
/// # Errors
///
/// Returns [`Error::PingFailed`] unless the reply is exactly one `ok` frame.
pub async fn ping<T: Transport>(session: &mut Session<T>, timeout: Duration) -> Result<()> {
    let reply = match execute(session, request(["ping"]), timeout).await {
        Ok(reply) => reply,
        Err(e) => {
            session.reject();
            return Err(e);
        }
    };

    if reply.len() == 1 && reply[0].as_ref() == PING_REPLY {
        session.mark_verified(None);
        Ok(())
    } else {
        session.reject();
        Err(Error::PingFailed(describe_frames(&reply)))
    }
}

/// The only frame of a reply that must have exactly one.
///
/// # Errors
///
/// Returns [`Error::MalformedReply`] for any other frame count.
pub fn single_frame(command: &str, mut frames: Vec<Bytes>) -> Result<Bytes> {
    if frames.len() == 1 {
        Ok(frames.remove(0))
    } else {
        Err(Error::malformed(
            command,
            format!("expected 1 frame, got {}", frames.len()),
        ))
    }
}

/// The frame carrying the answer to a stats server command.
///
/// Stream servers prepend their welcome line, so over a stream transport a
/// two-frame reply carries the answer in its second frame. Message queue
/// replies must be a single frame.
///
/// # Errors
///
/// Returns [`Error::MalformedReply`] for any other frame count.
pub fn reply_body(kind: TransportKind, command: &str, mut frames: Vec<Bytes>) -> Result<Bytes> {
    match (kind, frames.len()) {
        (_, 1) => Ok(frames.remove(0)),
        (TransportKind::Stream, 2) => {
            tracing::debug!(
                "'{}' answered by {}",
                command,
                String::from_utf8_lossy(&frames[0])
            );
            Ok(frames.remove(1))
        }
        (TransportKind::Stream, n) => Err(Error::malformed(
            command,
            format!("expected 1 or 2 frames, got {n}"),
        )),
        (TransportKind::MessageQueue, n) => Err(Error::malformed(
            command,
            format!("expected 1 frame, got {n}: {}", describe_frames(&frames)),
        )),
    }
}

/// Decode a frame as UTF-8 text.
///
/// # Errors
///
/// Returns [`Error::MalformedReply`] if the frame is not valid UTF-8.
pub fn frame_text(command: &str, frame: &[u8]) -> Result<String> {
    std::str::from_utf8(frame)
        .map(str::to_string)
        .map_err(|e| Error::malformed(command, format!("invalid UTF-8: {e}")))
}

/// Decode a frame as JSON.
///
/// # Errors
///
/// Returns [`Error::MalformedReply`] if the frame is not the expected JSON.
pub fn decode_json<D: DeserializeOwned>(command: &str, frame: &[u8]) -> Result<D> {
    serde_json::from_slice(frame).map_err(|e| Error::malformed(command, e.to_string()))
}

/// Render frames for log and error messages.
pub(crate) fn describe_frames(frames: &[Bytes]) -> String {
    let parts: Vec<String> = frames
        .iter()
        .map(|f| format!("{:?}", String::from_utf8_lossy(f)))
        .collect();
    format!("[{}]", parts.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::Endpoint;
    use crate::session::SessionState;
    use crate::transport::mock::{Script, ScriptedTransport, frames, reply};

    fn session(scripts: Vec<Script>) -> Session<ScriptedTransport> {
        let (transport, _log) = ScriptedTransport::new(scripts);
        Session::with_transport(Endpoint::remote_control("localhost"), transport)
    }

    #[tokio::test]
    async fn test_execute_returns_frames_verbatim() {
        let mut session = session(vec![reply(&["mod1", "mod2", "mod3"])]);

        let reply = execute(&mut session, request(["list"]), Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(reply, frames(&["mod1", "mod2", "mod3"]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_execute_timeout_keeps_session_open() {
        let mut session = session(vec![Script::Silent, reply(&["ok"])]);

        let err = execute(&mut session, request(["values"]), Duration::from_secs(1))
            .await
            .unwrap_err();
        match err {
            Error::Timeout { command, timeout } => {
                assert_eq!(command, "values");
                assert_eq!(timeout, Duration::from_secs(1));
            }
            other => panic!("Expected Timeout, got {other:?}"),
        }
        assert!(session.is_usable());

        let reply = execute(&mut session, request(["ping"]), Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(reply, frames(&["ok"]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_transaction_blocks_the_next_one() {
        let mut session = session(vec![Script::Delayed(
            Duration::from_secs(10),
            frames(&["late"]),
        )]);

        // Caller gives up on a slow responder without closing the session
        let abandoned = tokio::time::timeout(
            Duration::from_millis(50),
            execute(&mut session, request(["values"]), Duration::from_secs(30)),
        )
        .await;
        assert!(abandoned.is_err());
        assert_eq!(session.pending_command(), Some("values"));

        let err = execute(&mut session, request(["info"]), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::TransactionPending));
    }

    #[tokio::test]
    async fn test_ping_ok_verifies_session() {
        let mut session = session(vec![reply(&["ok"])]);

        ping(&mut session, Duration::from_secs(1)).await.unwrap();
        assert_eq!(session.state(), SessionState::Verified);
        assert!(session.identity().is_none());
    }

    #[tokio::test]
    async fn test_ping_wrong_reply_rejects_session() {
        let mut session = session(vec![reply(&["ok", "extra"])]);

        let err = ping(&mut session, Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, Error::PingFailed(_)));
        assert_eq!(session.state(), SessionState::Rejected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ping_without_answer_rejects_session() {
        let mut session = session(vec![Script::Silent]);

        let err = ping(&mut session, Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, Error::Timeout { .. }));
        assert_eq!(session.state(), SessionState::Rejected);
    }

    #[test]
    fn test_single_frame() {
        assert_eq!(
            single_frame("get", frames(&["42"])).unwrap(),
            Bytes::from("42")
        );

        let err = single_frame("get", frames(&["fail", "no such module"])).unwrap_err();
        assert!(matches!(err, Error::MalformedReply { .. }));
        assert!(err.to_string().contains("got 2"));

        assert!(single_frame("get", Vec::new()).is_err());
    }

    #[test]
    fn test_reply_body_skips_welcome_frame() {
        let stream = TransportKind::Stream;
        assert_eq!(
            reply_body(stream, "values", frames(&["{}"])).unwrap(),
            Bytes::from("{}")
        );
        assert_eq!(
            reply_body(stream, "values", frames(&[r#"{"service": "x"}"#, "{}"])).unwrap(),
            Bytes::from("{}")
        );
        assert!(reply_body(stream, "values", frames(&["a", "b", "c"])).is_err());
        assert!(reply_body(stream, "values", Vec::new()).is_err());
    }

    #[test]
    fn test_reply_body_message_queue_keeps_every_frame() {
        let mq = TransportKind::MessageQueue;
        assert_eq!(
            reply_body(mq, "values", frames(&["{}"])).unwrap(),
            Bytes::from("{}")
        );

        let err = reply_body(mq, "values", frames(&["{\"a\": 1}", "{}"])).unwrap_err();
        assert!(matches!(err, Error::MalformedReply { .. }));
        assert!(err.to_string().contains("got 2"));
        assert!(err.to_string().contains("{\\\"a\\\": 1}"));
    }

    #[test]
    fn test_frame_text_rejects_invalid_utf8() {
        let err = frame_text("list", &[0xff, 0xfe]).unwrap_err();
        assert!(matches!(err, Error::MalformedReply { .. }));
    }

    #[test]
    fn test_decode_json_maps_to_malformed() {
        let err = decode_json::<serde_json::Value>("values", b"{not json").unwrap_err();
        match err {
            Error::MalformedReply { command, .. } => assert_eq!(command, "values"),
            other => panic!("Expected MalformedReply, got {other:?}"),
        }
    }
}
