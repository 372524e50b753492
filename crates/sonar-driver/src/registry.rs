//! Sensor device registry.
//!
//! [`DeviceRegistry`] owns every GPIO resource of the driver, enforces one
//! open handle per channel and turns reads into serialized measurement
//! cycles.
//!
//! # Example
//!
//! ```
//! use sonar_driver::{DeviceRegistry, DriverConfig};
//! use sonar_hardware::mock::{EchoResponse, MockGpio, SimClock};
//! use sonar_hardware::LineId;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> sonar_core::Result<()> {
//! let clock = SimClock::new();
//! let (gpio, sensors) = MockGpio::new(Arc::new(clock.clone()));
//! sensors.wire(LineId(17), LineId(4), EchoResponse::After(Duration::from_micros(580)));
//!
//! let registry = DeviceRegistry::init(Arc::new(gpio), Arc::new(clock), DriverConfig::default())?;
//! let handle = registry.open(0)?;
//! assert_eq!(registry.measure(&handle).await?, 580_000);
//! registry.release(handle)?;
//! # Ok(())
//! # }
//! ```

use crate::claims::HardwareClaims;
use crate::config::{DriverConfig, RateLimitPolicy};
use crate::gate::SerializationGate;
use crate::session::{MeasurementSession, SessionState, Timing};
use serde::Serialize;
use sonar_core::constants::{
    CHANNEL_COUNT, DEVICE_DESCRIPTION, ECHO_LINE_LABEL, RESULT_WIDTH, TRIGGER_LINE_LABEL,
};
use sonar_core::{ChannelId, Error, Level, Result, Timestamp};
use sonar_hardware::{Clock, GpioBackend, LineId};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Exclusive access to one channel, obtained from [`DeviceRegistry::open`].
#[derive(Debug, PartialEq, Eq)]
pub struct SensorHandle {
    channel: ChannelId,
}

impl SensorHandle {
    pub fn channel(&self) -> ChannelId {
        self.channel
    }
}

/// Snapshot of one channel for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChannelStatus {
    pub channel: ChannelId,
    pub open: bool,
    pub state: SessionState,
    pub echo_ready: bool,
}

struct ChannelSlot {
    open: AtomicBool,
    session: MeasurementSession,
}

/// Owner of both sensor channels and their shared measurement gate.
pub struct DeviceRegistry {
    slots: Vec<ChannelSlot>,
    gate: SerializationGate,
    clock: Arc<dyn Clock>,
    claims: HardwareClaims,
}

impl DeviceRegistry {
    /// Claim every line and notification and build the channels.
    ///
    /// On any failure, everything acquired so far is released before the
    /// error is returned.
    ///
    /// # Errors
    ///
    /// - `Error::Config` if `config` is invalid
    /// - `Error::InitializationFailed` if a line or notification cannot be
    ///   acquired
    pub fn init(
        backend: Arc<dyn GpioBackend>,
        clock: Arc<dyn Clock>,
        config: DriverConfig,
    ) -> Result<Self> {
        config.validate()?;

        let timing = Timing {
            pulse_width: config.pulse_width(),
            echo_timeout: config.echo_timeout(),
        };
        let mut claims = HardwareClaims::new(Arc::clone(&backend));
        let mut slots = Vec::with_capacity(CHANNEL_COUNT);

        for channel in ChannelId::all() {
            let pins = config.pins(channel);
            let (trigger, echo) = (LineId(pins.trigger), LineId(pins.echo));

            claims.output(trigger, TRIGGER_LINE_LABEL, Level::Low)?;
            claims.input(echo, ECHO_LINE_LABEL)?;

            let session = MeasurementSession::new(
                channel,
                trigger,
                Arc::clone(&backend),
                Arc::clone(&clock),
                timing,
            );
            claims.edge_notification(echo, DEVICE_DESCRIPTION, Arc::new(session.notifier()))?;

            debug!(%channel, %trigger, %echo, "Channel ready");
            slots.push(ChannelSlot {
                open: AtomicBool::new(false),
                session,
            });
        }

        info!(
            channels = CHANNEL_COUNT,
            resources = claims.len(),
            policy = ?config.rate_limit,
            "{} driver loaded",
            DEVICE_DESCRIPTION
        );

        Ok(Self {
            slots,
            gate: SerializationGate::new(config.min_interval(), config.rate_limit),
            clock,
            claims,
        })
    }

    /// Take exclusive access to channel `id`.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidChannel` if `id` is not a channel
    /// - `Error::AlreadyOpen` if the channel is held by another handle
    pub fn open(&self, id: u8) -> Result<SensorHandle> {
        let channel = ChannelId::new(id).inspect_err(|_| debug!(id, "Invalid channel"))?;
        let slot = self.slot(channel)?;

        if slot
            .open
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!(%channel, "Already opened");
            return Err(Error::AlreadyOpen { channel: id });
        }

        debug!(%channel, "Opened");
        Ok(SensorHandle { channel })
    }

    /// Give channel access back. Never waits on the gate.
    pub fn release(&self, handle: SensorHandle) -> Result<()> {
        let slot = self.slot(handle.channel)?;
        slot.open.store(false, Ordering::Release);
        debug!(channel = %handle.channel, "Released");
        Ok(())
    }

    /// Measure once and write the round-trip time into `buf`.
    ///
    /// `length` is the requested transfer size and must equal
    /// [`RESULT_WIDTH`]; the result is written as a native-endian `u64`.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidSize` if `length` is wrong (checked before the gate)
    /// - `Error::TooFrequent` if the last measurement was too recent
    /// - `Error::HardwareTimeout` if no echo arrived
    /// - `Error::TransferFault` if `buf` cannot hold the result
    pub async fn read(&self, handle: &SensorHandle, buf: &mut [u8], length: usize) -> Result<usize> {
        self.read_interruptible(handle, buf, length, &CancellationToken::new())
            .await
    }

    /// [`read`](Self::read) whose wait for the gate can be interrupted.
    ///
    /// # Errors
    ///
    /// As [`read`](Self::read), plus `Error::Interrupted` if `cancel` fires
    /// while waiting for another cycle to finish.
    pub async fn read_interruptible(
        &self,
        handle: &SensorHandle,
        buf: &mut [u8],
        length: usize,
        cancel: &CancellationToken,
    ) -> Result<usize> {
        if length != RESULT_WIDTH {
            debug!(channel = %handle.channel, length, "Invalid size");
            return Err(Error::InvalidSize {
                expected: RESULT_WIDTH,
                actual: length,
            });
        }
        let slot = self.slot(handle.channel)?;

        let mut gate = self.gate.acquire(cancel).await?;
        gate.check_rate_limit(self.clock.now())?;

        let delivered = slot
            .session
            .run()
            .await
            .and_then(|round_trip| deliver(round_trip, buf));

        match delivered {
            Ok(written) => {
                gate.record_success(self.clock.now());
                Ok(written)
            }
            Err(e) => {
                gate.record_failure(self.clock.now());
                Err(e)
            }
        }
    }

    /// Measure once and return the round-trip time in nanoseconds.
    pub async fn measure(&self, handle: &SensorHandle) -> Result<u64> {
        let mut buf = [0u8; RESULT_WIDTH];
        self.read(handle, &mut buf, RESULT_WIDTH).await?;
        Ok(u64::from_ne_bytes(buf))
    }

    /// Whether channel `id` currently has an open handle.
    pub fn is_open(&self, id: u8) -> Result<bool> {
        let channel = ChannelId::new(id)?;
        Ok(self.slot(channel)?.open.load(Ordering::Acquire))
    }

    pub fn status(&self, id: u8) -> Result<ChannelStatus> {
        let channel = ChannelId::new(id)?;
        let slot = self.slot(channel)?;
        Ok(ChannelStatus {
            channel,
            open: slot.open.load(Ordering::Acquire),
            state: slot.session.state(),
            echo_ready: slot.session.echo_ready(),
        })
    }

    /// Time of the last measurement counted by the rate limiter.
    pub async fn last_measurement(&self) -> Option<Timestamp> {
        self.gate.last_measurement().await
    }

    pub fn rate_limit_policy(&self) -> RateLimitPolicy {
        self.gate.policy()
    }

    fn slot(&self, channel: ChannelId) -> Result<&ChannelSlot> {
        self.slots.get(channel.index()).ok_or(Error::InvalidChannel {
            id: channel.as_u8(),
        })
    }
}

fn deliver(round_trip: u64, buf: &mut [u8]) -> Result<usize> {
    let bytes = round_trip.to_ne_bytes();
    let available = buf.len();
    let target = buf.get_mut(..RESULT_WIDTH).ok_or(Error::TransferFault {
        required: RESULT_WIDTH,
        available,
    })?;
    target.copy_from_slice(&bytes);
    Ok(RESULT_WIDTH)
}

impl Drop for DeviceRegistry {
    fn drop(&mut self) {
        info!(resources = self.claims.len(), "{} driver unloaded", DEVICE_DESCRIPTION);
    }
}

impl std::fmt::Debug for DeviceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceRegistry")
            .field(
                "sessions",
                &self.slots.iter().map(|s| &s.session).collect::<Vec<_>>(),
            )
            .field("gate", &self.gate)
            .field("claims", &self.claims)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sonar_hardware::mock::{EchoResponse, MockGpio, MockGpioHandle, SimClock};
    use std::time::Duration;

    fn registry() -> (DeviceRegistry, MockGpioHandle, SimClock) {
        let clock = SimClock::new();
        let (gpio, handle) = MockGpio::new(Arc::new(clock.clone()));
        handle.wire(LineId(17), LineId(4), EchoResponse::After(Duration::from_nanos(5_000)));
        handle.wire(LineId(22), LineId(27), EchoResponse::After(Duration::from_nanos(9_000)));
        let registry =
            DeviceRegistry::init(Arc::new(gpio), Arc::new(clock.clone()), DriverConfig::default())
                .unwrap();
        (registry, handle, clock)
    }

    #[test]
    fn test_deliver_writes_native_endian() {
        let mut buf = [0u8; 12];
        assert_eq!(deliver(0x0102_0304, &mut buf).unwrap(), 8);
        assert_eq!(&buf[..8], &0x0102_0304u64.to_ne_bytes());
        assert_eq!(&buf[8..], &[0; 4]);
    }

    #[test]
    fn test_deliver_short_buffer() {
        let mut buf = [0u8; 3];
        assert!(matches!(
            deliver(1, &mut buf),
            Err(Error::TransferFault {
                required: 8,
                available: 3
            })
        ));
    }

    #[test]
    fn test_init_claims_lines_with_labels() {
        let (_registry, handle, _clock) = registry();

        assert_eq!(
            handle.claimed_lines(),
            vec![LineId(4), LineId(17), LineId(22), LineId(27)]
        );
        assert_eq!(handle.label(LineId(17)).as_deref(), Some(TRIGGER_LINE_LABEL));
        assert_eq!(handle.label(LineId(27)).as_deref(), Some(ECHO_LINE_LABEL));
        assert_eq!(handle.level(LineId(22)), Some(Level::Low));
        assert_eq!(handle.active_notifications(), 2);
    }

    #[test]
    fn test_invalid_config_claims_nothing() {
        let clock = SimClock::new();
        let (gpio, handle) = MockGpio::new(Arc::new(clock.clone()));
        let config = DriverConfig {
            pulse_width_us: 0,
            ..DriverConfig::default()
        };

        let err = DeviceRegistry::init(Arc::new(gpio), Arc::new(clock), config).unwrap_err();

        assert!(matches!(err, Error::Config { .. }));
        assert!(handle.claimed_lines().is_empty());
    }

    #[tokio::test]
    async fn test_rate_limit_spans_channels() {
        let (registry, _handle, clock) = registry();
        let first = registry.open(0).unwrap();
        let second = registry.open(1).unwrap();

        assert_eq!(registry.measure(&first).await.unwrap(), 5_000);
        let err = registry.measure(&second).await.unwrap_err();
        assert!(matches!(err, Error::TooFrequent { elapsed_ns: 0, .. }));

        clock.advance(Duration::from_micros(600));
        assert_eq!(registry.measure(&second).await.unwrap(), 9_000);
    }

    #[test]
    fn test_status_of_fresh_channel() {
        let (registry, _handle, _clock) = registry();
        let status = registry.status(1).unwrap();

        assert_eq!(status.channel.as_u8(), 1);
        assert!(!status.open);
        assert_eq!(status.state, SessionState::Idle);
        assert!(!status.echo_ready);
        assert!(registry.status(2).is_err());
    }
}
