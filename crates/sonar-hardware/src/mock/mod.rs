//! Mock backend implementations for testing and development.
//!
//! This module provides a simulated GPIO chip with scriptable HC-SR04 echoes
//! and a manually driven clock, so the driver can be exercised without
//! physical hardware.

pub mod clock;
pub mod gpio;

// Re-export commonly used types
pub use clock::SimClock;
pub use gpio::{EchoResponse, MockGpio, MockGpioHandle, PinEvent, PinEventKind};
