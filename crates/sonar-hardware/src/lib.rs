//! GPIO abstraction layer for the sonar ranging driver.
//!
//! This crate provides the capability interfaces the driver needs from the
//! platform: claiming and driving GPIO lines, receiving falling-edge
//! notifications, and reading a monotonic nanosecond clock. The traits allow
//! substituting a deterministic simulation (for development and testing) for
//! the real Linux GPIO character device.
//!
//! # Design Philosophy
//!
//! - **Non-blocking**: every [`GpioBackend`] operation completes immediately;
//!   the only waiting in the system happens in the driver.
//! - **Object-safe**: backends and clocks are used as `Arc<dyn Trait>`.
//! - **Thread-safe**: all traits require `Send + Sync`; edge notifications
//!   arrive on a backend-owned thread or task.
//! - **Narrow callbacks**: notifications are delivered through [`EdgeSink`],
//!   which exposes a single non-blocking method.
//!
//! # Example
//!
//! ```
//! use sonar_core::Level;
//! use sonar_hardware::mock::{EchoResponse, MockGpio, SimClock};
//! use sonar_hardware::traits::{EdgeSink, GpioBackend, LineId};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! struct Print;
//!
//! impl EdgeSink for Print {
//!     fn on_falling_edge(&self) {
//!         println!("echo");
//!     }
//! }
//!
//! # fn main() -> sonar_hardware::Result<()> {
//! let (gpio, handle) = MockGpio::new(Arc::new(SimClock::new()));
//! handle.wire(LineId(17), LineId(4), EchoResponse::After(Duration::from_micros(580)));
//!
//! gpio.request_input(LineId(4), "echo")?;
//! gpio.request_edge_notification(LineId(4), "echo", Arc::new(Print))?;
//! # Ok(())
//! # }
//! ```
//!
//! # Backends
//!
//! - [`mock::MockGpio`]: always available.
//! - `cdev::CdevGpio`: Linux `/dev/gpiochipN`, behind the
//!   `hardware-gpio-cdev` feature.
//!
//! [`GpioBackend`]: traits::GpioBackend
//! [`EdgeSink`]: traits::EdgeSink

#[cfg(feature = "hardware-gpio-cdev")]
pub mod cdev;
pub mod clock;
pub mod error;
pub mod mock;
pub mod traits;

// Re-export commonly used types for convenience
pub use clock::MonotonicClock;
pub use error::{HardwareError, Result};
pub use traits::{Clock, EdgeSink, GpioBackend, LineId, NotificationId};
