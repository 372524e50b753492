//! Polling loop: read each channel, convert, relay, pause.

use crate::Result;
use crate::distance::DistanceConverter;
use crate::record::{PayloadUnit, ReadingRecord};
use crate::sender::UdpRelay;
use sonar_core::ChannelId;
use sonar_driver::{DeviceRegistry, SensorHandle};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Counters reported when the loop stops.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PollStats {
    pub sent: u64,
    pub read_errors: u64,
    pub send_errors: u64,
}

/// Reads the configured channels in turn and relays every reading.
///
/// Read and send failures are logged and counted; the loop keeps going
/// until shut down. Channel handles are released when the poller is
/// dropped.
pub struct Poller {
    registry: Arc<DeviceRegistry>,
    handles: Vec<SensorHandle>,
    relay: UdpRelay,
    converter: DistanceConverter,
    payload: PayloadUnit,
    interval: Duration,
}

impl Poller {
    /// Open `channels` on `registry`.
    ///
    /// # Errors
    ///
    /// Fails if any channel cannot be opened; channels opened before the
    /// failure are released again.
    pub fn new(
        registry: Arc<DeviceRegistry>,
        channels: &[ChannelId],
        relay: UdpRelay,
        converter: DistanceConverter,
        payload: PayloadUnit,
        interval: Duration,
    ) -> Result<Self> {
        let mut poller = Self {
            registry,
            handles: Vec::with_capacity(channels.len()),
            relay,
            converter,
            payload,
            interval,
        };
        for channel in channels {
            let handle = poller.registry.open(channel.as_u8())?;
            poller.handles.push(handle);
        }
        Ok(poller)
    }

    pub fn channels(&self) -> Vec<ChannelId> {
        self.handles.iter().map(SensorHandle::channel).collect()
    }

    /// Poll until `shutdown` fires.
    ///
    /// A read in progress when `shutdown` fires is abandoned.
    pub async fn run(&self, shutdown: CancellationToken) -> PollStats {
        let mut stats = PollStats::default();
        info!(
            channels = ?self.channels(),
            target = %self.relay.target(),
            "Relaying readings"
        );

        'poll: loop {
            for handle in &self.handles {
                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => break 'poll,
                    _ = self.poll_channel(handle, &mut stats) => {}
                }
                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => break 'poll,
                    _ = tokio::time::sleep(self.interval) => {}
                }
            }
        }

        info!(
            sent = stats.sent,
            read_errors = stats.read_errors,
            send_errors = stats.send_errors,
            "Relay stopped"
        );
        stats
    }

    /// Read one channel once and relay the result.
    pub async fn poll_channel(&self, handle: &SensorHandle, stats: &mut PollStats) {
        let channel = handle.channel();
        let raw = match self.registry.measure(handle).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(%channel, "Read failed: {}", e);
                stats.read_errors += 1;
                return;
            }
        };

        info!("{} - {} cm", channel, self.converter.centimeters(raw));

        let record = ReadingRecord::new(channel, self.converter.payload(raw, self.payload));
        match self.relay.send(&record).await {
            Ok(_) => stats.sent += 1,
            Err(e) => {
                warn!(%channel, "Send failed: {}", e);
                stats.send_errors += 1;
            }
        }
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        for handle in self.handles.drain(..) {
            if let Err(e) = self.registry.release(handle) {
                warn!("Failed to release channel: {}", e);
            }
        }
    }
}

impl std::fmt::Debug for Poller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Poller")
            .field("channels", &self.channels())
            .field("relay", &self.relay)
            .field("payload", &self.payload)
            .field("interval", &self.interval)
            .finish()
    }
}
