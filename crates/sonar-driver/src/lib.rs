//! Ultrasonic time-of-flight ranging driver.
//!
//! Serves two HC-SR04 style sensors through a [`DeviceRegistry`]. A client
//! opens a channel, and every read then runs one trigger/echo cycle and
//! returns the raw round-trip time in nanoseconds.
//!
//! # Components
//!
//! - [`DeviceRegistry`]: owns GPIO resources, open handles and the read path
//! - [`SerializationGate`]: one cycle at a time, with a minimum interval
//! - [`MeasurementSession`]: the trigger/echo cycle of one channel
//! - [`EdgeNotifier`]: falling-edge callback that completes a cycle
//!
//! # Concurrency
//!
//! Reads on different channels may be issued concurrently; they queue on the
//! gate. Echo notifications arrive from the backend's own thread or task and
//! never take a lock.

mod claims;
pub mod config;
pub mod gate;
pub mod notifier;
pub mod registry;
pub mod session;

pub use config::{ChannelPins, DriverConfig, RateLimitPolicy};
pub use gate::{GateGuard, SerializationGate};
pub use notifier::EdgeNotifier;
pub use registry::{ChannelStatus, DeviceRegistry, SensorHandle};
pub use session::{MeasurementSession, SessionState, Timing};
