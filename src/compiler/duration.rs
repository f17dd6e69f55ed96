use chrono::Duration;
use once_cell::sync::Lazy;
use regex::Regex;

use super::CompileError;

/// Grammar for `sliding { duration }` (spec.md §4.2):
/// `^(\d+)([smhdwM])$`. `m` is minutes, `M` is 30 days — the distinction
/// is case-sensitive and deliberate (spec.md §9).
static SLIDING_DURATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d+)([smhdwM])$").unwrap());

/// Canonical unit durations in seconds. `w = 7*24h`, `M = 30*24h` (spec.md
/// §4.2).
fn unit_seconds(unit: char) -> Option<i64> {
    match unit {
        's' => Some(1),
        'm' => Some(60),
        'h' => Some(3_600),
        'd' => Some(86_400),
        'w' => Some(7 * 86_400),
        'M' => Some(30 * 86_400),
        _ => None,
    }
}

/// Parses a sliding-window duration string, e.g. `"7d"`, `"30m"`, `"1M"`.
///
/// Tries the unit-suffixed grammar first; falls back to a bare integer
/// interpreted as whole seconds (the "standard duration parse" fallback of
/// spec.md §4.2). Any unknown unit or missing duration is a `CompileError`.
pub fn parse_sliding_duration(spec: &str) -> Result<Duration, CompileError> {
    if let Some(caps) = SLIDING_DURATION.captures(spec) {
        let n: i64 = caps[1]
            .parse()
            .map_err(|_| CompileError::InvalidDuration(spec.to_string()))?;
        let unit = caps[2].chars().next().unwrap();
        let secs = unit_seconds(unit).ok_or_else(|| CompileError::InvalidDuration(spec.to_string()))?;
        return Ok(Duration::seconds(n * secs));
    }

    // Fallback: a bare non-negative integer is treated as whole seconds.
    if let Ok(secs) = spec.parse::<i64>() {
        if secs >= 0 {
            return Ok(Duration::seconds(secs));
        }
    }

    Err(CompileError::InvalidDuration(spec.to_string()))
}
