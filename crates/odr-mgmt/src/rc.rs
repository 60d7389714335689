//! Remote control sub-protocol: enumerate modules, read and change their
//! parameters.
//!
//! Every call here requires a session that passed [`crate::engine::ping`].

use std::time::Duration;

use bytes::Bytes;
use odr_types::{RcModule, RcParameter};

use crate::engine::{describe_frames, execute, frame_text, request};
use crate::error::{Error, Result};
use crate::session::Session;
use crate::transport::Transport;

/// Separator between name and value in a `show` reply frame.
pub const PARAMETER_SEPARATOR: &str = ": ";

const FAIL: &[u8] = b"fail";
const SET_ACK: &[u8] = b"ok";

fn texts(command: &str, frames: &[Bytes]) -> Result<Vec<String>> {
    frames.iter().map(|f| frame_text(command, f)).collect()
}

/// Names of all remote-controllable modules, in daemon order.
///
/// # Errors
///
/// Fails on an unverified session, on timeout, and on non-UTF-8 names.
pub async fn list_modules<T: Transport>(
    session: &mut Session<T>,
    timeout: Duration,
) -> Result<Vec<String>> {
    session.require_verified()?;
    let reply = execute(session, request(["list"]), timeout).await?;
    texts("list", &reply)
}

/// Raw `name: value` lines of one module, in daemon order.
///
/// # Errors
///
/// Fails on an unverified session, on timeout, and on non-UTF-8 lines.
pub async fn show_parameters<T: Transport>(
    session: &mut Session<T>,
    module: &str,
    timeout: Duration,
) -> Result<Vec<String>> {
    session.require_verified()?;
    let reply = execute(session, request(["show", module]), timeout).await?;
    texts("show", &reply)
}

/// Split a `show` line on the first `": "`.
///
/// The value may itself contain the separator.
///
/// # Errors
///
/// Returns [`Error::MalformedReply`] if the separator is missing.
pub fn parse_parameter(line: &str) -> Result<RcParameter> {
    line.split_once(PARAMETER_SEPARATOR)
        .map(|(name, value)| RcParameter {
            name: name.to_string(),
            value: value.to_string(),
        })
        .ok_or_else(|| Error::malformed("show", format!("no '{PARAMETER_SEPARATOR}' in {line:?}")))
}

/// List every module and fetch its parameters, one `show` per module.
///
/// A parameter line that cannot be split is logged and skipped; the rest of
/// the module still loads.
///
/// # Errors
///
/// The first failing transaction aborts the load.
pub async fn load_modules<T: Transport>(
    session: &mut Session<T>,
    timeout: Duration,
) -> Result<Vec<RcModule>> {
    let names = list_modules(session, timeout).await?;
    let mut modules = Vec::with_capacity(names.len());

    for name in names {
        let lines = show_parameters(session, &name, timeout).await?;
        let mut module = RcModule::new(name);
        for line in lines {
            match parse_parameter(&line) {
                Ok(parameter) => module.parameters.push(parameter),
                Err(e) => tracing::warn!("Skipping parameter of {}: {}", module.name, e),
            }
        }
        modules.push(module);
    }

    Ok(modules)
}

fn rejection(module: &str, parameter: &str, reply: &[Bytes]) -> Option<Error> {
    match reply {
        [status, message] if status.as_ref() == FAIL => Some(Error::RcRejected {
            module: module.to_string(),
            parameter: parameter.to_string(),
            message: String::from_utf8_lossy(message).into_owned(),
        }),
        _ => None,
    }
}

/// Read one parameter value.
///
/// # Errors
///
/// Returns [`Error::RcRejected`] when the daemon refuses (unknown module or
/// parameter) and [`Error::MalformedReply`] for any other unexpected shape.
pub async fn get_parameter<T: Transport>(
    session: &mut Session<T>,
    module: &str,
    parameter: &str,
    timeout: Duration,
) -> Result<String> {
    session.require_verified()?;
    let reply = execute(session, request(["get", module, parameter]), timeout).await?;

    if let Some(err) = rejection(module, parameter, &reply) {
        return Err(err);
    }
    match reply.as_slice() {
        [value] => frame_text("get", value),
        _ => Err(Error::malformed("get", describe_frames(&reply))),
    }
}

/// Change one parameter.
///
/// # Errors
///
/// Returns [`Error::RcRejected`] when the daemon refuses the value and
/// [`Error::MalformedReply`] when the reply is neither an acknowledgment nor
/// a refusal.
pub async fn set_parameter<T: Transport>(
    session: &mut Session<T>,
    module: &str,
    parameter: &str,
    value: &str,
    timeout: Duration,
) -> Result<()> {
    session.require_verified()?;
    let frames = request(["set", module, parameter, value]);
    let reply = execute(session, frames, timeout).await?;

    if let Some(err) = rejection(module, parameter, &reply) {
        return Err(err);
    }
    match reply.as_slice() {
        [ack] if ack.as_ref() == SET_ACK => {
            tracing::debug!("Set {}.{} = {}", module, parameter, value);
            Ok(())
        }
        _ => Err(Error::malformed("set", describe_frames(&reply))),
    }
}
