//! Munin multigraph plugin output.

use std::fmt::Write as _;
use std::sync::LazyLock;

use odr_types::StatsSnapshot;
use regex::Regex;

/// Warn when the TAI bulletin has less than a month left.
const ONE_MONTH_SECS: u64 = 3600 * 24 * 30;

static DIGITS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)").expect("digit pattern is valid"));

const INPUT_GRAPHS: &str = "
multigraph buffers_{ident}
graph_title Contribution {ident} buffer
graph_order high low
graph_args --base 1000
graph_vlabel max/min buffer size bytes during last ${graph_period}
graph_category dabmux
graph_info This graph shows the high and low buffer sizes for the {ident} ZMQ input

high.info Max buffer size
high.label Max Buffer Bytes
high.min 0
high.warning 1:
low.info Min buffer size
low.label Min Buffer Bytes
low.min 0
low.warning 1:

multigraph over_underruns_{ident}
graph_title Contribution {ident} over/underruns
graph_order underruns overruns
graph_args --base 1000 --logarithmic
graph_vlabel number of underruns/overruns during last ${graph_period}
graph_category dabmux
graph_info This graph shows the number of under/overruns for the {ident} ZMQ input

underruns.info Number of underruns
underruns.label Number of underruns
underruns.min 0
underruns.warning 0:0
underruns.type COUNTER
overruns.info Number of overruns
overruns.label Number of overruns
overruns.min 0
overruns.warning 0:0
overruns.type COUNTER

multigraph audio_levels_{ident}
graph_title Contribution {ident} audio level (peak)
graph_order left left_slow right right_slow
graph_args --base 1000
graph_vlabel peak audio level during last ${graph_period}
graph_category encoders
graph_info This graph shows the audio level and peak of both channels of the {ident} ZMQ input

left.info Left channel audio level
left.label Left level
left.min -90
left.max 0
left.warning -40:0
left.critical -80:0
left_slow.info Left channel audio peak over last 5 minutes
left_slow.label Left peak
left_slow.min -90
left_slow.max 0
left_slow.warning -40:0
left_slow.critical -80:0
right.info Right channel audio level
right.label Right level
right.min -90
right.max 0
right.warning -40:0
right.critical -80:0
right_slow.info Right channel audio peak over last 5 minutes
right_slow.label Right peak
right_slow.min -90
right_slow.max 0
right_slow.warning -40:0
right_slow.critical -80:0

multigraph state_{ident}
graph_title State of contribution {ident}
graph_order state
graph_args --base 1000 --lower-limit 0 --upper-limit 5
graph_vlabel Current state of the input
graph_category dabmux
graph_info This graph shows the state for the {ident} ZMQ input

state.info Input state
state.label 0 Unknown, 1 NoData, 2 Unstable, 3 Silent, 4 Streaming
state.warning 4:4
state.critical 2:4
";

/// Munin field names cannot contain dashes.
pub fn graph_ident(ident: &str) -> String {
    ident.replace('-', "_")
}

/// Seconds until expiry as reported by `clocktai`, or `U` when unknown.
pub fn expiry_value(text: Option<&str>) -> String {
    text.and_then(|t| DIGITS.captures(t))
        .and_then(|c| c.get(1))
        .map_or_else(|| "U".to_string(), |m| m.as_str().to_string())
}

/// Graph definitions for `munin config`.
pub fn config(inputs: &[String]) -> String {
    let mut out = String::new();
    let _ = write!(
        out,
        "
multigraph clocktai_expiry
graph_title Time to expiry for TAI bulletin
graph_order expiry
graph_args --base 1000
graph_vlabel Number of seconds until expiry
graph_category dabmux
graph_info This graph shows the number of remaining seconds this bulletin is valid

expiry.info Seconds until expiry
expiry.label Seconds until expiry
expiry.min 0
expiry.warning {ONE_MONTH_SECS}:
"
    );

    for ident in inputs {
        out.push_str(&INPUT_GRAPHS.replace("{ident}", &graph_ident(ident)));
    }
    out
}

/// Current values for a munin fetch.
///
/// Slow peaks and state are only emitted when the daemon reports them.
pub fn values(expiry: Option<&str>, snapshot: &StatsSnapshot) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "multigraph clocktai_expiry");
    let _ = writeln!(out, "expiry.value {}", expiry_value(expiry));

    for (ident, stat) in snapshot.iter() {
        let ident = graph_ident(ident);

        let _ = writeln!(out, "multigraph buffers_{ident}");
        let _ = writeln!(out, "high.value {}", stat.max_fill);
        let _ = writeln!(out, "low.value {}", stat.min_fill);

        let _ = writeln!(out, "multigraph over_underruns_{ident}");
        let _ = writeln!(out, "underruns.value {}", stat.num_underruns);
        let _ = writeln!(out, "overruns.value {}", stat.num_overruns);

        let _ = writeln!(out, "multigraph audio_levels_{ident}");
        let _ = writeln!(out, "left.value {}", stat.peak_left);
        let _ = writeln!(out, "right.value {}", stat.peak_right);
        if let (Some(left), Some(right)) = (stat.peak_left_slow, stat.peak_right_slow) {
            let _ = writeln!(out, "left_slow.value {left}");
            let _ = writeln!(out, "right_slow.value {right}");
        }

        if let Some(state) = stat.input_state {
            let _ = writeln!(out, "multigraph state_{ident}");
            let _ = writeln!(out, "state.value {}", state.code());
        }
    }
    out
}
