//! Relay configuration.
//!
//! Loaded from a TOML file; every key is optional and falls back to the
//! built-in defaults.
//!
//! ```toml
//! target = "10.42.0.1:14141"
//! poll_interval_ms = 100
//! channels = [0, 1]
//! layout = "aligned"
//! payload = "adjusted_nanos"
//! gpio_chip = "/dev/gpiochip0"
//!
//! [driver]
//! min_interval_us = 600
//! ```

use crate::distance::DistanceConverter;
use crate::record::{PayloadUnit, RecordLayout};
use crate::{RelayError, Result};
use serde::{Deserialize, Serialize};
use sonar_core::ChannelId;
use sonar_core::constants::{
    DEAD_ZONE_CM, DEFAULT_GPIO_CHIP, DEFAULT_POLL_INTERVAL_MS, DEFAULT_RELAY_HOST,
    DEFAULT_RELAY_PORT, MAX_RANGE_CM,
};
use sonar_driver::DriverConfig;
use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Destination of the reading records.
    pub target: SocketAddr,

    /// Pause after each channel read, in milliseconds.
    pub poll_interval_ms: u64,

    /// Channels to poll, in polling order.
    pub channels: Vec<ChannelId>,

    pub layout: RecordLayout,
    pub payload: PayloadUnit,

    pub dead_zone_cm: u64,
    pub max_range_cm: u64,

    /// GPIO character device holding the sensor lines.
    pub gpio_chip: PathBuf,

    /// Use simulated sensors instead of the GPIO chip.
    pub simulate: bool,

    pub driver: DriverConfig,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            target: SocketAddr::from((DEFAULT_RELAY_HOST, DEFAULT_RELAY_PORT)),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            channels: ChannelId::all().collect(),
            layout: RecordLayout::default(),
            payload: PayloadUnit::default(),
            dead_zone_cm: DEAD_ZONE_CM,
            max_range_cm: MAX_RANGE_CM,
            gpio_chip: PathBuf::from(DEFAULT_GPIO_CHIP),
            simulate: false,
            driver: DriverConfig::default(),
        }
    }
}

impl RelayConfig {
    /// Read and validate a TOML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: Self = text.parse()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns `RelayError::Config` for an empty or duplicated channel list
    /// or a zero range, and `RelayError::Driver` for an invalid driver
    /// section.
    pub fn validate(&self) -> Result<()> {
        if self.channels.is_empty() {
            return Err(RelayError::Config("no channels selected".into()));
        }
        let mut seen = HashSet::new();
        if let Some(duplicate) = self.channels.iter().find(|c| !seen.insert(**c)) {
            return Err(RelayError::Config(format!("channel {duplicate} listed twice")));
        }
        if self.max_range_cm == 0 {
            return Err(RelayError::Config("max_range_cm must be greater than 0".into()));
        }
        self.driver.validate()?;
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn converter(&self) -> DistanceConverter {
        DistanceConverter::new(self.dead_zone_cm, self.max_range_cm)
    }
}

impl std::str::FromStr for RelayConfig {
    type Err = RelayError;

    fn from_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sonar_driver::RateLimitPolicy;

    #[test]
    fn test_defaults() {
        let config = RelayConfig::default();

        assert_eq!(config.target.to_string(), "10.42.0.1:14141");
        assert_eq!(config.poll_interval(), Duration::from_millis(100));
        assert_eq!(config.channels.len(), 2);
        assert_eq!(config.layout, RecordLayout::Aligned);
        assert_eq!(config.payload, PayloadUnit::AdjustedNanos);
        assert_eq!(config.converter(), DistanceConverter::default());
        assert!(!config.simulate);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_overrides() {
        let config: RelayConfig = r#"
            target = "127.0.0.1:9000"
            channels = [1]
            layout = "packed"
            simulate = true

            [driver]
            rate_limit = "every_attempt"
        "#
        .parse()
        .unwrap();

        assert_eq!(config.target.port(), 9000);
        assert_eq!(config.channels, vec![ChannelId::new(1).unwrap()]);
        assert_eq!(config.layout, RecordLayout::Packed);
        assert!(config.simulate);
        assert_eq!(config.driver.rate_limit, RateLimitPolicy::EveryAttempt);
        assert_eq!(config.driver.min_interval_us, 600);
    }

    #[test]
    fn test_invalid_channel_rejected() {
        let err = "channels = [0, 2]".parse::<RelayConfig>().unwrap_err();
        assert!(matches!(err, RelayError::Parse(_)));
    }

    #[test]
    fn test_duplicate_channel_rejected() {
        let err = "channels = [1, 1]".parse::<RelayConfig>().unwrap_err();
        assert!(matches!(err, RelayError::Config(_)));
    }

    #[test]
    fn test_empty_channels_rejected() {
        let err = "channels = []".parse::<RelayConfig>().unwrap_err();
        assert!(matches!(err, RelayError::Config(_)));
    }

    #[test]
    fn test_bad_driver_section_rejected() {
        let err = "[driver]\necho_timeout_us = 0".parse::<RelayConfig>().unwrap_err();
        assert!(matches!(
            err,
            RelayError::Driver(sonar_core::Error::Config { .. })
        ));
    }
}
