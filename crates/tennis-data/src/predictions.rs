//! Prediction row parsing helpers.

use tracing::debug;

/// Parses a numeric cell; blank, non-numeric and non-finite cells give `None`.
pub fn parse_number(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parses the `Awin` outcome cell.
///
/// Hand-edited files mark some outcomes with a stray `x` (`1x`); it is
/// stripped. Only 0 and 1 (also `0.0`/`1.0`) are accepted.
pub fn parse_outcome(raw: &str) -> Option<bool> {
    let cleaned = raw.replace('x', "");
    match parse_number(&cleaned)? {
        v if v == 1.0 => Some(true),
        v if v == 0.0 => Some(false),
        other => {
            debug!(value = other, "ignoring out-of-range Awin value");
            None
        }
    }
}
