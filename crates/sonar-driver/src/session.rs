//! One measurement cycle on one channel.
//!
//! # States
//!
//! - `Idle`: no cycle in progress
//! - `Triggered`: trigger pulse being generated
//! - `WaitingEcho`: pulse done, waiting for the echo falling edge
//! - `Measured`: echo arrived, result computed
//! - `TimedOut`: no echo within the timeout
//!
//! # Valid Transitions
//!
//! - Idle → Triggered → WaitingEcho → Measured/TimedOut → Idle
//! - Triggered → Idle (trigger line could not be driven)
//!
//! A session always ends in `Idle`, including when its future is dropped
//! while waiting for the echo.

use crate::notifier::{EchoState, EdgeNotifier};
use serde::{Deserialize, Serialize};
use sonar_core::{ChannelId, Error, Level, Result, Timestamp};
use sonar_hardware::{Clock, GpioBackend, LineId};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;
use tracing::{trace, warn};

/// Phase of a channel's measurement cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Triggered,
    WaitingEcho,
    Measured,
    TimedOut,
}

impl SessionState {
    /// Check if moving to `target` is allowed from this state.
    ///
    /// ```
    /// use sonar_driver::SessionState;
    ///
    /// assert!(SessionState::Idle.can_transition_to(&SessionState::Triggered));
    /// assert!(!SessionState::Idle.can_transition_to(&SessionState::Measured));
    /// ```
    pub fn can_transition_to(&self, target: &SessionState) -> bool {
        matches!(
            (self, target),
            (SessionState::Idle, SessionState::Triggered)
                | (SessionState::Triggered, SessionState::WaitingEcho | SessionState::Idle)
                | (
                    SessionState::WaitingEcho,
                    SessionState::Measured | SessionState::TimedOut | SessionState::Idle
                )
                | (SessionState::Measured | SessionState::TimedOut, SessionState::Idle)
        )
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => SessionState::Triggered,
            2 => SessionState::WaitingEcho,
            3 => SessionState::Measured,
            4 => SessionState::TimedOut,
            _ => SessionState::Idle,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            SessionState::Idle => 0,
            SessionState::Triggered => 1,
            SessionState::WaitingEcho => 2,
            SessionState::Measured => 3,
            SessionState::TimedOut => 4,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state_str = match self {
            SessionState::Idle => "Idle",
            SessionState::Triggered => "Triggered",
            SessionState::WaitingEcho => "WaitingEcho",
            SessionState::Measured => "Measured",
            SessionState::TimedOut => "TimedOut",
        };
        write!(f, "{}", state_str)
    }
}

/// Pulse width and echo bound used by every cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    pub pulse_width: Duration,
    pub echo_timeout: Duration,
}

/// Trigger/echo cycle of one channel.
///
/// Callers must hold the measurement gate while calling [`run`](Self::run);
/// the session itself does no serialization.
pub struct MeasurementSession {
    channel: ChannelId,
    trigger: LineId,
    state: AtomicU8,
    echo: Arc<EchoState>,
    backend: Arc<dyn GpioBackend>,
    clock: Arc<dyn Clock>,
    timing: Timing,
}

/// Resets the session to `Idle` when a cycle ends, however it ends.
struct IdleOnExit<'a>(&'a MeasurementSession);

impl Drop for IdleOnExit<'_> {
    fn drop(&mut self) {
        self.0.enter(SessionState::Idle);
    }
}

impl MeasurementSession {
    pub(crate) fn new(
        channel: ChannelId,
        trigger: LineId,
        backend: Arc<dyn GpioBackend>,
        clock: Arc<dyn Clock>,
        timing: Timing,
    ) -> Self {
        Self {
            channel,
            trigger,
            state: AtomicU8::new(SessionState::Idle.as_u8()),
            echo: Arc::new(EchoState::new()),
            backend,
            clock,
            timing,
        }
    }

    /// Edge callback to register on this channel's echo line.
    pub fn notifier(&self) -> EdgeNotifier {
        EdgeNotifier::new(self.channel, Arc::clone(&self.echo), Arc::clone(&self.clock))
    }

    pub fn channel(&self) -> ChannelId {
        self.channel
    }

    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Whether an echo edge has been recorded since the last trigger.
    pub fn echo_ready(&self) -> bool {
        self.echo.is_ready()
    }

    /// Run one cycle and return the round-trip time in nanoseconds.
    ///
    /// # Errors
    ///
    /// - `Error::HardwareTimeout` if no echo arrives within the timeout
    /// - `Error::Gpio` if the trigger line cannot be driven
    pub async fn run(&self) -> Result<u64> {
        let _idle = IdleOnExit(self);

        let start = self.pulse()?;
        self.enter(SessionState::WaitingEcho);

        if self.echo.wait(self.timing.echo_timeout).await {
            self.enter(SessionState::Measured);
            let round_trip = self.echo.end().nanos_since(start);
            trace!(channel = %self.channel, round_trip_ns = round_trip, "Measured");
            Ok(round_trip)
        } else {
            self.enter(SessionState::TimedOut);
            let timeout_us = u64::try_from(self.timing.echo_timeout.as_micros()).unwrap_or(u64::MAX);
            warn!(channel = %self.channel, timeout_us, "Timeout waiting for echo");
            Err(Error::HardwareTimeout {
                channel: self.channel.as_u8(),
                timeout_us,
            })
        }
    }

    /// Drive the trigger pulse and return the time it ended.
    ///
    /// Synchronous from raise to lower, so the line cannot be left high by a
    /// cancelled caller.
    fn pulse(&self) -> Result<Timestamp> {
        self.echo.arm();
        self.enter(SessionState::Triggered);
        trace!(channel = %self.channel, trigger = %self.trigger, "Triggering");

        if let Err(e) = self.backend.set_output(self.trigger, Level::High) {
            warn!(channel = %self.channel, "Failed to raise trigger line: {}", e);
            if let Err(e) = self.backend.set_output(self.trigger, Level::Low) {
                warn!(channel = %self.channel, "Trigger line may be stuck high: {}", e);
            }
            return Err(e.into());
        }
        self.clock.delay(self.timing.pulse_width);

        if let Err(e) = self.backend.set_output(self.trigger, Level::Low) {
            warn!(channel = %self.channel, "Failed to lower trigger line: {}", e);
            // One more attempt before giving up on the cycle.
            self.backend.set_output(self.trigger, Level::Low)?;
        }
        Ok(self.clock.now())
    }

    fn enter(&self, next: SessionState) {
        let previous = SessionState::from_u8(self.state.swap(next.as_u8(), Ordering::AcqRel));
        debug_assert!(
            previous == next || previous.can_transition_to(&next),
            "invalid session transition {previous} -> {next}"
        );
    }
}

impl fmt::Debug for MeasurementSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MeasurementSession")
            .field("channel", &self.channel)
            .field("trigger", &self.trigger)
            .field("state", &self.state())
            .field("timing", &self.timing)
            .finish()
    }
}
