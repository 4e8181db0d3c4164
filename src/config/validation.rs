//! Configuration validation helpers.

use crate::utils::error::{Result, SaverError};
use std::time::Duration;

/// Shortest window the saver will accept outside of test mode. Traffic
/// counters are cumulative, so sampling faster than once a minute produces
/// rates too noisy to act on.
pub const MIN_WINDOW: Duration = Duration::from_secs(60);

/// Parse a single-unit duration string such as `"500ms"`, `"30s"`, `"5m"`
/// or `"1h"`. Malformed or unit-less input is a configuration error.
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return Err(SaverError::config("duration must not be empty"));
    }

    let split = s
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .unwrap_or(s.len());
    let (number, unit) = s.split_at(split);

    let value: f64 = number
        .parse()
        .map_err(|_| SaverError::config(format!("invalid duration: {s}")))?;
    if !value.is_finite() || value < 0.0 {
        return Err(SaverError::config(format!("invalid duration: {s}")));
    }

    let secs = match unit {
        "ms" => value / 1000.0,
        "s" => value,
        "m" => value * 60.0,
        "h" => value * 3600.0,
        _ => return Err(SaverError::config(format!("invalid duration unit: {s}"))),
    };

    // Values large enough to overflow Duration are well-formed per the
    // grammar but still a configuration error, never a panic.
    Duration::try_from_secs_f64(secs)
        .map_err(|_| SaverError::config(format!("duration out of range: {s}")))
}
