//! Decision metrics over the `metrics` facade.
//!
//! The crate only records; the host process installs whatever recorder or
//! exporter it wants. With no recorder installed these calls are no-ops.

use std::time::Duration;

use metrics::{counter, histogram};

/// Record one authorization decision outcome.
pub fn record_decision(source: &str, allowed: bool, duration: Duration) {
    let result = if allowed { "allowed" } else { "denied" };

    counter!(
        "authorization_decisions_total",
        "source" => source.to_string(),
        "result" => result.to_string()
    )
    .increment(1);

    histogram!(
        "authorization_decision_duration_seconds",
        "source" => source.to_string()
    )
    .record(duration.as_secs_f64());
}
