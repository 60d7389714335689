//! Shared types for the ODR-DabMux management tools.
//!
//! This crate provides the typed records produced by the protocol decoders
//! and view builders in `odr-mgmt`, and consumed by presentation layers such
//! as `odr-cli`. All types are serializable so they can be re-emitted as JSON.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Sentinel substituted for optional text fields an older daemon omits.
pub const UNKNOWN: &str = "unknown";

fn unknown() -> String {
    UNKNOWN.to_string()
}

/// Identity reported by the daemon in reply to `info`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceIdentity {
    #[serde(rename = "service")]
    pub service_name: String,
    #[serde(default = "unknown")]
    pub version: String,
}

impl ServiceIdentity {
    #[must_use]
    pub fn new(service_name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            version: version.into(),
        }
    }

    /// Whether the service name belongs to the expected product family.
    #[must_use]
    pub fn matches(&self, expected_prefix: &str) -> bool {
        self.service_name.starts_with(expected_prefix)
    }
}

impl fmt::Display for ServiceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.service_name, self.version)
    }
}

/// Input state as computed by the daemon.
///
/// Only the numeric code is authoritative; the word in front of it is for
/// humans and has changed between daemon versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum InputState {
    Unknown = 0,
    NoData = 1,
    Unstable = 2,
    Silent = 3,
    Streaming = 4,
}

impl InputState {
    /// Map a numeric state code to a state. Codes outside `0..=4` are rejected.
    #[must_use]
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Unknown),
            1 => Some(Self::NoData),
            2 => Some(Self::Unstable),
            3 => Some(Self::Silent),
            4 => Some(Self::Streaming),
            _ => None,
        }
    }

    #[must_use]
    pub fn code(self) -> u8 {
        self as u8
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Unknown => "Unknown",
            Self::NoData => "NoData",
            Self::Unstable => "Unstable",
            Self::Silent => "Silent",
            Self::Streaming => "Streaming",
        }
    }
}

impl fmt::Display for InputState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.code())
    }
}

/// Uptime of the encoder feeding an input.
///
/// Daemons report seconds; when the field is absent it reads as [`UNKNOWN`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Uptime {
    Seconds(u64),
    Text(String),
}

impl Default for Uptime {
    fn default() -> Self {
        Self::Text(unknown())
    }
}

impl fmt::Display for Uptime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Seconds(s) => write!(f, "{s}"),
            Self::Text(t) => f.write_str(t),
        }
    }
}

/// Statistics for one input, as of the last `values` poll.
///
/// Field names follow the daemon's wire names so re-encoding a snapshot
/// reproduces the fields the daemon sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputStat {
    pub min_fill: i64,
    pub max_fill: i64,
    pub peak_left: i32,
    pub peak_right: i32,
    /// Slow-decay peaks, only exported by daemons newer than v2.0.0.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peak_left_slow: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peak_right_slow: Option<i32>,
    pub num_underruns: u64,
    pub num_overruns: u64,
    /// Human-readable state, e.g. `Streaming (4)`.
    #[serde(default = "unknown")]
    pub state: String,
    /// State code decoded from `state`; `None` when absent or unparseable.
    #[serde(skip)]
    pub input_state: Option<InputState>,
    #[serde(default = "unknown")]
    pub version: String,
    #[serde(default)]
    pub uptime: Uptime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_tist_offset: Option<serde_json::Number>,
}

/// All input statistics from one `values` poll, keyed by input identifier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatsSnapshot {
    pub inputs: BTreeMap<String, InputStat>,
}

impl StatsSnapshot {
    #[must_use]
    pub fn get(&self, ident: &str) -> Option<&InputStat> {
        self.inputs.get(ident)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &InputStat)> {
        self.inputs.iter()
    }
}

/// General multiplex options, from the `general` and `remotecontrol` sections.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneralOptions {
    pub nbframes: String,
    pub statsserverport: String,
    pub writescca: String,
    pub tist: String,
    pub dabmode: String,
    pub syslog: String,
    pub telnetport: String,
}

/// A service from the `services` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub name: String,
    pub id: String,
    pub label: String,
    pub shortlabel: String,
    pub pty: String,
    pub language: String,
}

/// A subchannel from the `subchannels` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subchannel {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub inputfile: String,
    pub zmq_buffer: String,
    pub zmq_prebuffering: String,
    pub bitrate: String,
    pub id: String,
    pub protection: String,
    pub encryption: String,
    pub secret_key: String,
    pub public_key: String,
    pub encoder_key: String,
}

/// A component from the `components` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Component {
    pub name: String,
    pub label: String,
    pub shortlabel: String,
    pub service: String,
    pub subchannel: String,
    pub figtype: String,
}

/// One remote-control parameter and its current value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RcParameter {
    pub name: String,
    pub value: String,
}

/// A remote-controllable module and its parameters, in daemon order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RcModule {
    pub name: String,
    pub parameters: Vec<RcParameter>,
}

impl RcModule {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: Vec::new(),
        }
    }

    /// Value of the named parameter, if the module exposes it.
    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.value.as_str())
    }
}
