//! Simulated sensors for running the relay without hardware.

use sonar_core::ChannelId;
use sonar_core::constants::NS_PER_CM;
use sonar_driver::DriverConfig;
use sonar_hardware::mock::{EchoResponse, MockGpio};
use sonar_hardware::{Clock, GpioBackend, LineId};
use std::sync::Arc;
use std::time::Duration;

/// Distance of the simulated obstacle in front of each channel.
pub const SIMULATED_DISTANCE_CM: [u64; 2] = [100, 250];

/// Mock backend wired like `config`, with each sensor facing a fixed
/// obstacle.
///
/// Meant for a real `clock`: echoes are due exactly one flight time after the
/// trigger falls, and no pin activity is logged.
pub fn simulated_backend(config: &DriverConfig, clock: Arc<dyn Clock>) -> Arc<dyn GpioBackend> {
    let (gpio, sensors) = MockGpio::with_echo_latency(clock, Duration::ZERO);
    sensors.set_recording(false);
    for channel in ChannelId::all() {
        let pins = config.pins(channel);
        let distance = SIMULATED_DISTANCE_CM[channel.index()];
        sensors.wire(
            LineId(pins.trigger),
            LineId(pins.echo),
            EchoResponse::After(Duration::from_nanos(distance * NS_PER_CM)),
        );
    }
    Arc::new(gpio)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DistanceConverter;
    use sonar_driver::DeviceRegistry;
    use sonar_hardware::MonotonicClock;

    #[tokio::test]
    async fn test_simulated_sensors_report_fixed_distances() {
        let config = DriverConfig {
            min_interval_us: 0,
            ..DriverConfig::default()
        };
        let clock: Arc<dyn Clock> = Arc::new(MonotonicClock::new());
        let backend = simulated_backend(&config, Arc::clone(&clock));
        let registry = DeviceRegistry::init(backend, clock, config).unwrap();
        let converter = DistanceConverter::new(0, 600);

        for channel in ChannelId::all() {
            let handle = registry.open(channel.as_u8()).unwrap();
            let expected = SIMULATED_DISTANCE_CM[channel.index()] * NS_PER_CM;
            for _ in 0..3 {
                let raw = registry.measure(&handle).await.unwrap();
                assert!(
                    raw.abs_diff(expected) < NS_PER_CM,
                    "channel {channel}: {raw} ns ({} cm), expected {expected} ns",
                    converter.centimeters(raw)
                );
            }
            registry.release(handle).unwrap();
        }
    }
}
