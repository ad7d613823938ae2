//! Small numeric and timing helpers for yag_core.
use std::time::Duration;

/// Round `x` to `decimals` places, half away from zero.
#[inline]
pub fn round_to(x: f64, decimals: u32) -> f64 {
    let scale = 10f64.powi(decimals as i32);
    (x * scale).round() / scale
}

/// Convert a poll interval in (possibly fractional) seconds to a `Duration`.
/// Negative and non-finite inputs map to zero, i.e. continuous polling.
pub fn secs_f64_to_duration(secs: f64) -> Duration {
    if secs.is_finite() && secs > 0.0 {
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    } else {
        Duration::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_to_requested_precision() {
        assert_eq!(round_to(12.346, 2), 12.35);
        assert_eq!(round_to(7.04, 1), 7.0);
        assert_eq!(round_to(1499.6, 0), 1500.0);
    }

    #[test]
    fn poll_interval_conversion() {
        assert_eq!(secs_f64_to_duration(0.5), Duration::from_millis(500));
        assert_eq!(secs_f64_to_duration(0.0), Duration::ZERO);
        assert_eq!(secs_f64_to_duration(-1.0), Duration::ZERO);
        assert_eq!(secs_f64_to_duration(f64::NAN), Duration::ZERO);
    }
}
