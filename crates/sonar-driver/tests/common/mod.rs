//! Common test utilities for driver integration tests.
//!
//! Builds a [`DeviceRegistry`] over a [`MockGpio`] with the default wiring
//! and exposes the mock handle and clock for scripting and inspection.

#![allow(dead_code)]

use sonar_driver::{DeviceRegistry, DriverConfig};
use sonar_hardware::mock::{EchoResponse, MockGpio, MockGpioHandle, PinEvent, PinEventKind, SimClock};
use sonar_hardware::{Clock, LineId};
use std::sync::Arc;
use std::time::Duration;

pub const TRIGGER0: LineId = LineId(17);
pub const ECHO0: LineId = LineId(4);
pub const TRIGGER1: LineId = LineId(22);
pub const ECHO1: LineId = LineId(27);

/// Registry under test plus the controls of its simulated hardware.
pub struct Rig {
    pub registry: Arc<DeviceRegistry>,
    pub gpio: MockGpioHandle,
    pub clock: SimClock,
}

/// Rig on a simulated clock where both sensors answer after `flight`.
pub fn rig(flight: Duration) -> Rig {
    rig_with(EchoResponse::After(flight), DriverConfig::default())
}

pub fn rig_with(response: EchoResponse, config: DriverConfig) -> Rig {
    let clock = SimClock::new();
    let (registry, gpio) = registry_on(Arc::new(clock.clone()), response, config);
    Rig {
        registry,
        gpio,
        clock,
    }
}

/// Registry on an arbitrary clock with both channels wired to `response`.
pub fn registry_on(
    clock: Arc<dyn Clock>,
    response: EchoResponse,
    config: DriverConfig,
) -> (Arc<DeviceRegistry>, MockGpioHandle) {
    let (backend, gpio) = MockGpio::new(Arc::clone(&clock));
    gpio.wire(TRIGGER0, ECHO0, response);
    gpio.wire(TRIGGER1, ECHO1, response);

    let registry = DeviceRegistry::init(Arc::new(backend), clock, config)
        .expect("registry initialization failed");
    (Arc::new(registry), gpio)
}

/// Channel served by a trigger or echo line of the default wiring.
pub fn channel_of(line: LineId) -> u8 {
    match line {
        TRIGGER0 | ECHO0 => 0,
        TRIGGER1 | ECHO1 => 1,
        other => panic!("line {other} is not part of the default wiring"),
    }
}

/// Assert that trigger/echo cycles in `events` never interleave.
///
/// Every cycle must read: trigger high, trigger low, echo edge, all on the
/// same channel, before the next trigger goes high.
pub fn assert_cycles_do_not_overlap(events: &[PinEvent]) -> usize {
    let mut in_flight: Option<u8> = None;
    let mut lowered = false;
    let mut cycles = 0;

    for event in events {
        let channel = channel_of(event.line);
        match event.kind {
            PinEventKind::Set(sonar_core::Level::High) => {
                assert_eq!(
                    in_flight, None,
                    "channel {channel} triggered during a cycle: {event:?}"
                );
                in_flight = Some(channel);
                lowered = false;
            }
            PinEventKind::Set(sonar_core::Level::Low) => {
                assert_eq!(in_flight, Some(channel), "unexpected trigger low: {event:?}");
                lowered = true;
            }
            PinEventKind::FallingEdge => {
                assert_eq!(in_flight, Some(channel), "echo outside its cycle: {event:?}");
                assert!(lowered, "echo before trigger low: {event:?}");
                in_flight = None;
                cycles += 1;
            }
        }
    }
    assert_eq!(in_flight, None, "cycle left unfinished");
    cycles
}
