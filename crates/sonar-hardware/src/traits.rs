//! GPIO backend and timebase trait definitions.
//!
//! This module defines the contract between the ranging driver and the
//! hardware it drives. Unlike higher level device traits these operations are
//! synchronous: claiming a line, toggling an output and registering for edge
//! notifications never block, so the traits stay object-safe and are used as
//! `Arc<dyn GpioBackend>` / `Arc<dyn Clock>`.

use crate::error::Result;
use sonar_core::{Level, Timestamp};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// GPIO line offset on the backend's chip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LineId(pub u32);

impl fmt::Display for LineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handle of an edge-notification registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NotificationId(pub u32);

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Receiver of falling-edge notifications.
///
/// Implementations run in the backend's notification context (an interrupt
/// handler on real hardware). They must complete in bounded time and must
/// never block, sleep or wait on a lock held by a caller thread.
pub trait EdgeSink: Send + Sync {
    /// Called once per falling edge on the registered line.
    fn on_falling_edge(&self);
}

/// GPIO capability interface.
///
/// Implemented once for real hardware and once for deterministic simulation
/// (see [`crate::mock::MockGpio`]); the driver only ever sees this trait.
///
/// # Examples
///
/// ```
/// use sonar_core::Level;
/// use sonar_hardware::traits::{GpioBackend, LineId};
/// use sonar_hardware::Result;
///
/// fn pulse(gpio: &dyn GpioBackend, line: LineId) -> Result<()> {
///     gpio.set_output(line, Level::High)?;
///     gpio.set_output(line, Level::Low)
/// }
/// ```
pub trait GpioBackend: Send + Sync {
    /// Claim `line` as an output driven to `initial`.
    ///
    /// # Errors
    ///
    /// Returns an error if the line is already claimed or does not exist.
    fn request_output(&self, line: LineId, label: &str, initial: Level) -> Result<()>;

    /// Claim `line` as an input.
    ///
    /// # Errors
    ///
    /// Returns an error if the line is already claimed or does not exist.
    fn request_input(&self, line: LineId, label: &str) -> Result<()>;

    /// Drive a claimed output line.
    ///
    /// # Errors
    ///
    /// Returns an error if the line is not claimed as an output.
    fn set_output(&self, line: LineId, level: Level) -> Result<()>;

    /// Deliver falling edges of an input line to `sink` until released.
    ///
    /// # Errors
    ///
    /// Returns an error if the line is not claimed as an input or the
    /// backend cannot watch it.
    fn request_edge_notification(
        &self,
        line: LineId,
        label: &str,
        sink: Arc<dyn EdgeSink>,
    ) -> Result<NotificationId>;

    /// Stop delivering notifications for `id`. Unknown ids are ignored.
    fn release_notification(&self, id: NotificationId);

    /// Give a claimed line back. Unknown lines are ignored.
    fn release_line(&self, line: LineId);
}

/// Monotonic nanosecond timebase.
pub trait Clock: Send + Sync {
    /// Current time on this clock.
    fn now(&self) -> Timestamp;

    /// Let `duration` pass without suspending the caller.
    ///
    /// Used for the microsecond-scale trigger pulse, so real clocks busy-wait.
    fn delay(&self, duration: Duration);
}
