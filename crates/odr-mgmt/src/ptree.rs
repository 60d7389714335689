//! Reading and writing the daemon's live configuration tree.
//!
//! The daemon has answered `config` in two shapes over its history: a flat
//! list of input identifiers (`{"config": ["in-a", "in-b"]}`, used to set up
//! monitoring graphs) and the full nested configuration. Nothing in the reply
//! says which one it is, so [`decode_config`] looks at the keys.

use std::time::Duration;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::engine::{decode_json, describe_frames, execute, reply_body, request};
use crate::error::{Error, Result};
use crate::session::Session;
use crate::transport::Transport;

/// Reply the daemon sends when it accepted a new configuration tree.
pub const WRITE_ACCEPTED: &[u8] = b"OK";

/// Top-level sections of a full configuration tree.
pub const TREE_SECTIONS: [&str; 5] = [
    "general",
    "remotecontrol",
    "services",
    "subchannels",
    "components",
];

/// The daemon's configuration, kept as opaque JSON.
///
/// Only the sections the view builders need are ever interpreted; everything
/// else passes through a read/modify/write cycle untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigTree(Value);

impl ConfigTree {
    /// Wrap a JSON object.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedReply`] if the value is not an object.
    pub fn from_value(value: Value) -> Result<Self> {
        if value.is_object() {
            Ok(Self(value))
        } else {
            Err(Error::malformed("config", "configuration is not a JSON object"))
        }
    }

    #[must_use]
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    #[must_use]
    pub fn into_value(self) -> Value {
        self.0
    }

    /// Mutable access for callers editing the tree before a write.
    pub fn as_value_mut(&mut self) -> &mut Value {
        &mut self.0
    }

    /// A named top-level section.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingSection`] if the section is absent or is not
    /// an object.
    pub fn section(&self, name: &str) -> Result<&Map<String, Value>> {
        self.0
            .get(name)
            .and_then(Value::as_object)
            .ok_or_else(|| Error::MissingSection(name.to_string()))
    }

    fn looks_like_tree(value: &Value) -> bool {
        value
            .as_object()
            .is_some_and(|obj| TREE_SECTIONS.iter().any(|s| obj.contains_key(*s)))
    }
}

/// Either shape of a `config` reply.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigReply {
    /// Identifiers of the inputs the stats server tracks.
    Inputs(Vec<String>),
    Tree(ConfigTree),
}

/// Decode a `config` reply payload of either generation.
///
/// # Errors
///
/// Returns [`Error::MalformedReply`] if the payload is neither shape.
pub fn decode_config(payload: &[u8]) -> Result<ConfigReply> {
    let mut value: Value = decode_json("config", payload)?;

    match value.get_mut("config").map(Value::take) {
        Some(Value::Array(items)) => items
            .into_iter()
            .map(|item| match item {
                Value::String(ident) => Ok(ident),
                other => Err(Error::malformed(
                    "config",
                    format!("input identifier is not a string: {other}"),
                )),
            })
            .collect::<Result<Vec<_>>>()
            .map(ConfigReply::Inputs),
        Some(tree @ Value::Object(_)) => Ok(ConfigReply::Tree(ConfigTree(tree))),
        Some(other) => Err(Error::malformed(
            "config",
            format!("unexpected 'config' value: {other}"),
        )),
        None if ConfigTree::looks_like_tree(&value) => Ok(ConfigReply::Tree(ConfigTree(value))),
        None => Err(Error::malformed(
            "config",
            "neither an input list nor a configuration tree",
        )),
    }
}

/// Send `config` and decode whichever shape comes back.
///
/// # Errors
///
/// Fails on an unverified session, on timeout, and on malformed replies.
pub async fn query_config<T: Transport>(
    session: &mut Session<T>,
    timeout: Duration,
) -> Result<ConfigReply> {
    session.require_verified()?;
    let reply = execute(session, request(["config"]), timeout).await?;
    decode_config(&reply_body(session.endpoint().kind(), "config", reply)?)
}

/// Read the full configuration tree with `getptree`.
///
/// # Errors
///
/// Fails on an unverified session, on timeout, and when the body is not a
/// JSON object.
pub async fn read_tree<T: Transport>(
    session: &mut Session<T>,
    timeout: Duration,
) -> Result<ConfigTree> {
    session.require_verified()?;
    let reply = execute(session, request(["getptree"]), timeout).await?;
    let body = reply_body(session.endpoint().kind(), "getptree", reply)?;
    ConfigTree::from_value(decode_json("getptree", &body)?)
}

/// Replace the daemon's configuration with `tree`.
///
/// Returns whether the daemon acknowledged the write. A refused write may
/// still have changed nothing, or something; read the tree back to learn the
/// authoritative state.
///
/// # Errors
///
/// Fails on an unverified session, on timeout and on transport failure. A
/// refusal is `Ok(false)`, not an error.
pub async fn write_tree<T: Transport>(
    session: &mut Session<T>,
    tree: &ConfigTree,
    timeout: Duration,
) -> Result<bool> {
    session.require_verified()?;
    let body = serde_json::to_vec(tree)?;
    let frames = vec![Bytes::from_static(b"setptree"), Bytes::from(body)];

    let reply = execute(session, frames, timeout).await?;
    let accepted = reply.len() == 1 && reply[0].as_ref() == WRITE_ACCEPTED;
    if !accepted {
        tracing::warn!("Configuration write refused: {}", describe_frames(&reply));
    }
    Ok(accepted)
}
