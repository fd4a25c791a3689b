//! Human-readable durations (`100ms`, `2s`, `1m30s`, `1s 500ms`).

use std::time::Duration;

use crate::ConfigError;

/// Parse a duration with unit suffixes.
///
/// Accepts everything `humantime` does: `ns`, `us`/`µs`, `ms`, `s`, `m`, `h`
/// and longer units, combined as in `1m30s` or `1s 500ms`. A bare number is
/// rejected because the unit is ambiguous.
pub fn parse_duration(input: &str) -> Result<Duration, ConfigError> {
    humantime::parse_duration(input.trim()).map_err(|e| ConfigError::InvalidDuration {
        input: input.to_owned(),
        message: e.to_string(),
    })
}
