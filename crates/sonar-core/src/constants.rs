//! Core constants for the ultrasonic ranging driver.
//!
//! This module defines the timing, sizing and wiring constants shared by the
//! driver and the relay utility. The values match the HC-SR04 sensor and the
//! reference Raspberry Pi wiring.
//!
//! # Measurement Cycle
//!
//! ```text
//! trigger ──┐‾‾‾‾‾‾‾‾‾‾┌──────────────────────────────
//!           │  10 µs   │
//!                      ^ start
//! echo    ─────────────────────┐‾‾‾‾‾‾‾‾‾‾‾‾‾‾┌──────
//!                                             ^ end (falling edge)
//! result = end - start  (nanoseconds, reported raw)
//! ```
//!
//! # Usage
//!
//! ```
//! use sonar_core::constants::*;
//! use std::time::Duration;
//!
//! let timeout = Duration::from_micros(ECHO_TIMEOUT_US);
//! assert_eq!(timeout.as_micros(), 62_500);
//! assert_eq!(RESULT_WIDTH, std::mem::size_of::<u64>());
//! ```

// ============================================================================
// Channels
// ============================================================================

/// Number of sensor channels served by one driver instance.
///
/// Valid channel ids are `0..CHANNEL_COUNT`.
pub const CHANNEL_COUNT: usize = 2;

/// Width in bytes of a single measurement result (one `u64`).
///
/// A read must request exactly this many bytes.
pub const RESULT_WIDTH: usize = 8;

// ============================================================================
// Timing
// ============================================================================

/// Width of the trigger pulse in microseconds.
///
/// The HC-SR04 datasheet requires at least 10 µs high on TRIG.
pub const TRIGGER_PULSE_WIDTH_US: u64 = 10;

/// Maximum time to wait for the echo falling edge, in microseconds.
///
/// # Value: 62 500 µs (1/16 s)
///
/// Sized for the maximum supported range: 600 cm at 58 µs/cm is 34.8 ms of
/// round trip, plus the echo pulse itself.
pub const ECHO_TIMEOUT_US: u64 = 62_500;

/// Minimum spacing between two successful measurements, in microseconds.
///
/// Applies globally across channels so that the ringing of one transducer
/// does not reach the other sensor's receiver.
pub const MIN_MEASUREMENT_INTERVAL_US: u64 = 600;

// ============================================================================
// Default Wiring (BCM numbering)
// ============================================================================

/// Trigger line of channel 0.
pub const DEFAULT_TRIGGER0_LINE: u32 = 17;

/// Echo line of channel 0.
pub const DEFAULT_ECHO0_LINE: u32 = 4;

/// Trigger line of channel 1.
pub const DEFAULT_TRIGGER1_LINE: u32 = 22;

/// Echo line of channel 1.
pub const DEFAULT_ECHO1_LINE: u32 = 27;

/// Consumer label used when claiming echo lines.
pub const ECHO_LINE_LABEL: &str = "HC-SR04 echo interrupt";

/// Consumer label used when claiming trigger lines.
pub const TRIGGER_LINE_LABEL: &str = "HC-SR04 trigger pin";

/// Human readable device description.
pub const DEVICE_DESCRIPTION: &str = "HC-SR04 sonar";

// ============================================================================
// Distance Conversion (consumer side)
// ============================================================================

/// Round-trip nanoseconds per centimetre of distance.
///
/// Sound travels roughly 343 m/s, so one centimetre away costs about 58 µs
/// of echo time (there and back).
pub const NS_PER_CM: u64 = 58_000;

/// Blind zone of the transducer, in centimetres.
///
/// Subtracted from every reading before relaying.
pub const DEAD_ZONE_CM: u64 = 10;

/// Maximum supported range, in centimetres. Readings are clamped to this.
pub const MAX_RANGE_CM: u64 = 600;

// ============================================================================
// Relay Defaults
// ============================================================================

/// Default destination host of relayed readings.
pub const DEFAULT_RELAY_HOST: [u8; 4] = [10, 42, 0, 1];

/// Default destination UDP port of relayed readings.
pub const DEFAULT_RELAY_PORT: u16 = 14141;

/// Default pause after each channel read, in milliseconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

/// Default GPIO character device.
pub const DEFAULT_GPIO_CHIP: &str = "/dev/gpiochip0";
