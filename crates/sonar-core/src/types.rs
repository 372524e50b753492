use crate::{Result, constants::CHANNEL_COUNT, error::Error};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Sensor channel identifier (0 or 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct ChannelId(u8);

impl ChannelId {
    /// Create a new channel ID with validation.
    ///
    /// # Errors
    /// Returns `Error::InvalidChannel` if the ID is not below [`CHANNEL_COUNT`].
    pub fn new(id: u8) -> Result<Self> {
        if usize::from(id) >= CHANNEL_COUNT {
            return Err(Error::InvalidChannel { id });
        }
        Ok(ChannelId(id))
    }

    /// All valid channel ids in ascending order.
    pub fn all() -> impl Iterator<Item = ChannelId> {
        (0..CHANNEL_COUNT as u8).map(ChannelId)
    }

    #[must_use]
    pub fn as_u8(&self) -> u8 {
        self.0
    }

    #[must_use]
    pub fn index(&self) -> usize {
        usize::from(self.0)
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u8> for ChannelId {
    type Error = Error;

    fn try_from(id: u8) -> Result<Self> {
        ChannelId::new(id)
    }
}

impl From<ChannelId> for u8 {
    fn from(id: ChannelId) -> u8 {
        id.0
    }
}

impl std::str::FromStr for ChannelId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let id: u8 = s.trim().parse().map_err(|_| Error::Config {
            message: format!("Invalid channel id: {s}"),
        })?;
        ChannelId::new(id)
    }
}

/// Point on a monotonic timeline, in nanoseconds since an arbitrary epoch.
///
/// Timestamps from different clocks are not comparable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp(u64);

impl Timestamp {
    pub const ZERO: Timestamp = Timestamp(0);

    #[must_use]
    pub const fn from_nanos(nanos: u64) -> Self {
        Timestamp(nanos)
    }

    #[must_use]
    pub const fn as_nanos(&self) -> u64 {
        self.0
    }

    /// Nanoseconds elapsed since `earlier`, zero if `earlier` is in the future.
    #[must_use]
    pub fn nanos_since(&self, earlier: Timestamp) -> u64 {
        self.0.saturating_sub(earlier.0)
    }

    #[must_use]
    pub fn saturating_add(&self, duration: Duration) -> Timestamp {
        let nanos = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);
        Timestamp(self.0.saturating_add(nanos))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}ns", self.0)
    }
}

/// Logic level of a GPIO line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Low,
    High,
}

impl Level {
    #[must_use]
    pub fn as_u8(&self) -> u8 {
        match self {
            Level::Low => 0,
            Level::High => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0)]
    #[case(1)]
    fn test_channel_id_valid(#[case] id: u8) {
        let channel = ChannelId::new(id).unwrap();
        assert_eq!(channel.as_u8(), id);
        assert_eq!(channel.index(), usize::from(id));
    }

    #[rstest]
    #[case(2)]
    #[case(5)]
    #[case(255)]
    fn test_channel_id_invalid(#[case] id: u8) {
        assert!(matches!(
            ChannelId::new(id),
            Err(Error::InvalidChannel { id: rejected }) if rejected == id
        ));
    }

    #[test]
    fn test_channel_id_all() {
        let ids: Vec<u8> = ChannelId::all().map(|c| c.as_u8()).collect();
        assert_eq!(ids, vec![0, 1]);
    }

    #[test]
    fn test_channel_id_from_str() {
        assert_eq!("1".parse::<ChannelId>().unwrap().as_u8(), 1);
        assert_eq!(" 0 ".parse::<ChannelId>().unwrap().as_u8(), 0);
        assert!(matches!(
            "2".parse::<ChannelId>(),
            Err(Error::InvalidChannel { id: 2 })
        ));
        assert!(matches!(
            "left".parse::<ChannelId>(),
            Err(Error::Config { .. })
        ));
    }

    #[test]
    fn test_timestamp_arithmetic() {
        let start = Timestamp::from_nanos(1_000);
        let end = start.saturating_add(Duration::from_nanos(5_000));
        assert_eq!(end.as_nanos(), 6_000);
        assert_eq!(end.nanos_since(start), 5_000);
        assert_eq!(start.nanos_since(end), 0);
    }

    #[test]
    fn test_level_as_u8() {
        assert_eq!(Level::High.as_u8(), 1);
        assert_eq!(Level::Low.as_u8(), 0);
    }
}
