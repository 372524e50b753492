//! Round-trip time to distance conversion.

use crate::record::PayloadUnit;
use sonar_core::constants::{DEAD_ZONE_CM, MAX_RANGE_CM, NS_PER_CM};

/// Turns raw round-trip nanoseconds into relayable values.
///
/// The dead zone is subtracted first (saturating at zero), then the result
/// is clamped to the maximum range.
///
/// # Examples
///
/// ```
/// use sonar_relay::DistanceConverter;
///
/// let converter = DistanceConverter::default();
/// assert_eq!(converter.adjust(300_000), 0);
/// assert_eq!(converter.centimeters(5_800_000), 90);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DistanceConverter {
    dead_zone_ns: u64,
    max_ns: u64,
}

impl DistanceConverter {
    pub fn new(dead_zone_cm: u64, max_range_cm: u64) -> Self {
        Self {
            dead_zone_ns: dead_zone_cm.saturating_mul(NS_PER_CM),
            max_ns: max_range_cm.saturating_mul(NS_PER_CM),
        }
    }

    /// Dead-zone adjusted and clamped round-trip time in nanoseconds.
    pub fn adjust(&self, raw_ns: u64) -> u64 {
        raw_ns.saturating_sub(self.dead_zone_ns).min(self.max_ns)
    }

    pub fn centimeters(&self, raw_ns: u64) -> u64 {
        self.adjust(raw_ns) / NS_PER_CM
    }

    /// Value to relay for `raw_ns` in the requested unit.
    pub fn payload(&self, raw_ns: u64, unit: PayloadUnit) -> u64 {
        match unit {
            PayloadUnit::AdjustedNanos => self.adjust(raw_ns),
            PayloadUnit::Centimeters => self.centimeters(raw_ns),
        }
    }
}

impl Default for DistanceConverter {
    fn default() -> Self {
        Self::new(DEAD_ZONE_CM, MAX_RANGE_CM)
    }
}
