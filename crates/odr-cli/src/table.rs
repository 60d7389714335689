//! Plain-text tables for terminal output.

use std::fmt::Write as _;

use odr_types::{
    Component, GeneralOptions, InputStat, RcModule, Service, StatsSnapshot, Subchannel,
};

fn optional<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

fn stats_row(out: &mut String, ident: &str, stat: &InputStat) {
    let _ = writeln!(
        out,
        "{:20}{:>8}{:>8}{:>8}{:>8}{:>8}{:>8}{:>8}{:>8}{:>16}{:>48}{:>10}{:>8}",
        ident,
        stat.max_fill,
        stat.min_fill,
        stat.num_underruns,
        stat.num_overruns,
        stat.peak_left,
        stat.peak_right,
        optional(stat.peak_left_slow),
        optional(stat.peak_right_slow),
        stat.state,
        stat.version,
        stat.uptime.to_string(),
        optional(stat.last_tist_offset.as_ref()),
    );
}

/// One row per input, sorted by identifier.
pub fn stats(snapshot: &StatsSnapshot) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:20}{:>8}{:>8}{:>8}{:>8}{:>8}{:>8}{:>8}{:>8}{:>16}{:>48}{:>10}{:>8}",
        "id",
        "max",
        "min",
        "under",
        "over",
        "audio L",
        "audio R",
        "peak L",
        "peak R",
        "state",
        "version",
        "uptime",
        "offset",
    );
    for (ident, stat) in snapshot.iter() {
        stats_row(&mut out, ident, stat);
    }
    out
}

pub fn services(services: &[Service]) -> String {
    let mut out = String::new();
    for s in services {
        let _ = writeln!(
            out,
            "{}: id={} label={:?} shortlabel={:?} pty={} language={}",
            s.name, s.id, s.label, s.shortlabel, s.pty, s.language
        );
    }
    out
}

pub fn subchannels(subchannels: &[Subchannel]) -> String {
    let mut out = String::new();
    for s in subchannels {
        let _ = writeln!(
            out,
            "{}: type={} id={} bitrate={} protection={} inputfile={}",
            s.name, s.kind, s.id, s.bitrate, s.protection, s.inputfile
        );
        if !s.zmq_buffer.is_empty() || !s.zmq_prebuffering.is_empty() {
            let _ = writeln!(
                out,
                "    zmq-buffer={} zmq-prebuffering={}",
                s.zmq_buffer, s.zmq_prebuffering
            );
        }
        if !s.encryption.is_empty() {
            let _ = writeln!(
                out,
                "    encryption={} secret-key={} public-key={} encoder-key={}",
                s.encryption, s.secret_key, s.public_key, s.encoder_key
            );
        }
    }
    out
}

pub fn components(components: &[Component]) -> String {
    let mut out = String::new();
    for c in components {
        let _ = writeln!(
            out,
            "{}: service={} subchannel={} label={:?} shortlabel={:?} figtype={}",
            c.name, c.service, c.subchannel, c.label, c.shortlabel, c.figtype
        );
    }
    out
}

pub fn general(general: &GeneralOptions) -> String {
    let mut out = String::new();
    for (name, value) in [
        ("dabmode", &general.dabmode),
        ("nbframes", &general.nbframes),
        ("statsserverport", &general.statsserverport),
        ("telnetport", &general.telnetport),
        ("writescca", &general.writescca),
        ("tist", &general.tist),
        ("syslog", &general.syslog),
    ] {
        let _ = writeln!(out, "{name:16}{value}");
    }
    out
}

pub fn modules(modules: &[RcModule]) -> String {
    let mut out = String::new();
    for module in modules {
        let _ = writeln!(out, "{}", module.name);
        for p in &module.parameters {
            let _ = writeln!(out, "    {}: {}", p.name, p.value);
        }
    }
    out
}
