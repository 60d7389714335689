//! Live input statistics from the `values` command.
//!
//! The payload shape has grown over daemon releases: slow peaks, the state
//! string, encoder version, uptime and timestamp offset were all added later.
//! One decoder accepts every generation and fills what is missing with the
//! sentinels defined in `odr_types`.

use std::collections::BTreeMap;
use std::sync::LazyLock;
use std::time::Duration;

use odr_types::{InputStat, InputState, StatsSnapshot, UNKNOWN};
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use crate::engine::{decode_json, execute, reply_body, request};
use crate::error::{Error, Result};
use crate::session::Session;
use crate::transport::Transport;

const VALUES: &str = "values";

/// `Streaming (4)`: a word, then the authoritative code in parentheses.
static STATE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\w+ \((\d+)\)").expect("state pattern is valid"));

#[derive(Deserialize)]
struct ValuesReply {
    values: BTreeMap<String, Value>,
}

#[derive(Deserialize)]
struct InputEntry {
    inputstat: InputStat,
}

/// Decode the state string reported for an input.
///
/// Returns `None` when the string does not follow the `word (code)` pattern
/// or carries a code this client does not know.
#[must_use]
pub fn decode_state(text: &str) -> Option<InputState> {
    let captures = STATE_PATTERN.captures(text)?;
    let code: u8 = captures.get(1)?.as_str().parse().ok()?;
    InputState::from_code(code)
}

/// Decode a `values` reply payload.
///
/// Inputs whose state string cannot be decoded keep their text but get no
/// [`InputState`]; the other inputs are unaffected.
///
/// # Errors
///
/// Returns [`Error::MalformedReply`] if the payload is not JSON, has no
/// `values` section, or an input lacks one of the always-present counters.
pub fn decode_values(payload: &[u8]) -> Result<StatsSnapshot> {
    let reply: ValuesReply = decode_json(VALUES, payload)?;

    let mut snapshot = StatsSnapshot::default();
    for (ident, entry) in reply.values {
        let InputEntry { mut inputstat } = serde_json::from_value(entry)
            .map_err(|e| Error::malformed(VALUES, format!("input '{ident}': {e}")))?;

        if inputstat.state != UNKNOWN {
            inputstat.input_state = decode_state(&inputstat.state);
            if inputstat.input_state.is_none() {
                tracing::warn!("Cannot parse state '{}' of input {}", inputstat.state, ident);
            }
        }

        snapshot.inputs.insert(ident, inputstat);
    }

    Ok(snapshot)
}

/// Poll the daemon for a statistics snapshot.
///
/// # Errors
///
/// Fails on an unverified session, on timeout, and on malformed replies.
pub async fn query_values<T: Transport>(
    session: &mut Session<T>,
    timeout: Duration,
) -> Result<StatsSnapshot> {
    session.require_verified()?;
    let reply = execute(session, request([VALUES]), timeout).await?;
    let payload = reply_body(session.endpoint().kind(), VALUES, reply)?;
    decode_values(&payload)
}
