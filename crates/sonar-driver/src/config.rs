//! Driver configuration.
//!
//! Defaults match the reference Raspberry Pi wiring: channel 0 on BCM 17/4,
//! channel 1 on BCM 22/27, a 10 µs trigger pulse, a 62.5 ms echo timeout and
//! 600 µs between measurements.
//!
//! # Example
//!
//! ```
//! use sonar_driver::{DriverConfig, RateLimitPolicy};
//!
//! let config = DriverConfig {
//!     rate_limit: RateLimitPolicy::EveryAttempt,
//!     ..DriverConfig::default()
//! };
//! assert!(config.validate().is_ok());
//! ```

use serde::{Deserialize, Serialize};
use sonar_core::constants::{
    CHANNEL_COUNT, DEFAULT_ECHO0_LINE, DEFAULT_ECHO1_LINE, DEFAULT_TRIGGER0_LINE,
    DEFAULT_TRIGGER1_LINE, ECHO_TIMEOUT_US, MIN_MEASUREMENT_INTERVAL_US, TRIGGER_PULSE_WIDTH_US,
};
use sonar_core::{ChannelId, Error, Result};
use std::collections::HashSet;
use std::time::Duration;

/// GPIO lines of one sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelPins {
    /// Output line pulsed to start a measurement.
    pub trigger: u32,

    /// Input line whose falling edge ends the measurement.
    pub echo: u32,
}

/// Whether a failed cycle consumes the rate-limit window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateLimitPolicy {
    /// Only successful measurements restart the minimum interval.
    #[default]
    SuccessOnly,

    /// Every completed trigger cycle restarts it, including timeouts.
    EveryAttempt,
}

/// Configuration of a [`DeviceRegistry`](crate::DeviceRegistry).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Pin assignment per channel, indexed by channel id.
    pub channels: [ChannelPins; CHANNEL_COUNT],

    /// Trigger pulse width in microseconds.
    pub pulse_width_us: u64,

    /// Echo wait bound in microseconds.
    pub echo_timeout_us: u64,

    /// Minimum spacing between measurements in microseconds.
    pub min_interval_us: u64,

    pub rate_limit: RateLimitPolicy,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            channels: [
                ChannelPins {
                    trigger: DEFAULT_TRIGGER0_LINE,
                    echo: DEFAULT_ECHO0_LINE,
                },
                ChannelPins {
                    trigger: DEFAULT_TRIGGER1_LINE,
                    echo: DEFAULT_ECHO1_LINE,
                },
            ],
            pulse_width_us: TRIGGER_PULSE_WIDTH_US,
            echo_timeout_us: ECHO_TIMEOUT_US,
            min_interval_us: MIN_MEASUREMENT_INTERVAL_US,
            rate_limit: RateLimitPolicy::default(),
        }
    }
}

impl DriverConfig {
    /// Check timing values and that no line is used twice.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.pulse_width_us == 0 {
            return Err(Error::config("pulse_width_us must be greater than 0"));
        }
        if self.echo_timeout_us == 0 {
            return Err(Error::config("echo_timeout_us must be greater than 0"));
        }

        let mut seen = HashSet::new();
        for pins in &self.channels {
            for line in [pins.trigger, pins.echo] {
                if !seen.insert(line) {
                    return Err(Error::config(format!("line {line} assigned twice")));
                }
            }
        }
        Ok(())
    }

    pub fn pins(&self, channel: ChannelId) -> ChannelPins {
        self.channels[channel.index()]
    }

    pub fn pulse_width(&self) -> Duration {
        Duration::from_micros(self.pulse_width_us)
    }

    pub fn echo_timeout(&self) -> Duration {
        Duration::from_micros(self.echo_timeout_us)
    }

    pub fn min_interval(&self) -> Duration {
        Duration::from_micros(self.min_interval_us)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_wiring() {
        let config = DriverConfig::default();
        let channel0 = config.pins(ChannelId::new(0).unwrap());
        let channel1 = config.pins(ChannelId::new(1).unwrap());

        assert_eq!((channel0.trigger, channel0.echo), (17, 4));
        assert_eq!((channel1.trigger, channel1.echo), (22, 27));
        assert_eq!(config.pulse_width(), Duration::from_micros(10));
        assert_eq!(config.echo_timeout(), Duration::from_micros(62_500));
        assert_eq!(config.min_interval(), Duration::from_micros(600));
        assert_eq!(config.rate_limit, RateLimitPolicy::SuccessOnly);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_duplicate_line_rejected() {
        let mut config = DriverConfig::default();
        config.channels[1].echo = config.channels[0].trigger;

        let err = config.validate().unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
        assert!(err.to_string().contains("line 17"));
    }

    #[test]
    fn test_zero_timing_rejected() {
        let config = DriverConfig {
            echo_timeout_us: 0,
            ..DriverConfig::default()
        };
        assert!(config.validate().is_err());

        let config = DriverConfig {
            pulse_width_us: 0,
            ..DriverConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: DriverConfig = toml::from_str(
            r#"
            min_interval_us = 1000
            rate_limit = "every_attempt"
            "#,
        )
        .unwrap();

        assert_eq!(config.min_interval_us, 1000);
        assert_eq!(config.rate_limit, RateLimitPolicy::EveryAttempt);
        assert_eq!(config.channels, DriverConfig::default().channels);
    }

    #[test]
    fn test_toml_pins() {
        let config: DriverConfig = toml::from_str(
            r#"
            channels = [
                { trigger = 5, echo = 6 },
                { trigger = 13, echo = 19 },
            ]
            "#,
        )
        .unwrap();

        assert_eq!(config.channels[1], ChannelPins { trigger: 13, echo: 19 });
        assert!(config.validate().is_ok());
    }
}
