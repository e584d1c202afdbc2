//! Time utilities for the fixed-step simulation

use std::time::Instant;

/// Tick rate configuration
pub const SIMULATION_TPS: u32 = 60; // matches the host render cadence
pub const TICK_DURATION_MICROS: u64 = 1_000_000 / SIMULATION_TPS as u64;

/// Convert a millisecond duration to whole ticks (rounded to nearest).
pub fn ms_to_ticks(ms: u64) -> u64 {
    ms.saturating_mul(SIMULATION_TPS as u64).saturating_add(500) / 1000
}

/// Convert a millisecond duration to ticks, never less than one tick.
///
/// Used for timed phases: a zero-length phase would fire on the tick it was
/// scheduled and skip the phase entirely.
pub fn ms_to_ticks_min1(ms: u64) -> u64 {
    ms_to_ticks(ms).max(1)
}

/// Convert ticks back to milliseconds (truncating)
pub fn ticks_to_ms(ticks: u64) -> u64 {
    ticks.saturating_mul(1000) / SIMULATION_TPS as u64
}

/// A simple timer for measuring durations
#[derive(Debug, Clone)]
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed_micros(&self) -> u64 {
        self.start.elapsed().as_micros() as u64
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ms_to_ticks_rounds_to_nearest() {
        assert_eq!(ms_to_ticks(0), 0);
        assert_eq!(ms_to_ticks(300), 18);
        assert_eq!(ms_to_ticks(250), 15);
        assert_eq!(ms_to_ticks(400), 24);
        assert_eq!(ms_to_ticks(1000), 60);
        // 10ms = 0.6 ticks
        assert_eq!(ms_to_ticks(10), 1);
    }

    #[test]
    fn test_min1_never_zero() {
        assert_eq!(ms_to_ticks_min1(0), 1);
        assert_eq!(ms_to_ticks_min1(5), 1);
        assert_eq!(ms_to_ticks_min1(700), 42);
    }

    #[test]
    fn test_huge_durations_saturate() {
        assert_eq!(ms_to_ticks(u64::MAX), u64::MAX / 1000);
        assert!(ms_to_ticks_min1(u64::MAX / 2) > 0);
        assert_eq!(ticks_to_ms(u64::MAX), u64::MAX / 60);
    }

    #[test]
    fn test_ticks_to_ms() {
        assert_eq!(ticks_to_ms(60), 1000);
        assert_eq!(ticks_to_ms(18), 300);
    }
}
