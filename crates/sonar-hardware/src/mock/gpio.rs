//! Mock GPIO chip for testing and development.
//!
//! This module provides a simulated GPIO backend wired to simulated HC-SR04
//! sensors. When a trigger line falls after being driven high, the sensor
//! wired to it answers with a scripted echo delivered from a separate
//! thread, the same way an interrupt arrives asynchronously on real hardware.

use crate::{
    HardwareError, Result,
    traits::{Clock, EdgeSink, GpioBackend, LineId, NotificationId},
};
use parking_lot::Mutex;
use sonar_core::{Level, Timestamp};
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

/// Default real time the responder waits before touching the clock.
///
/// Gives the caller room to capture its start timestamp before a simulated
/// clock is moved by the responder. The echo is still due at the trigger's
/// falling edge plus the flight time.
pub const ECHO_LATENCY: Duration = Duration::from_millis(1);

/// How a simulated sensor answers one trigger pulse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EchoResponse {
    /// Echo line falls this long (on the backend clock) after the trigger falls.
    After(Duration),

    /// Nothing comes back.
    Silent,
}

/// Kind of recorded pin activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinEventKind {
    /// Output driven to a level.
    Set(Level),

    /// Falling edge delivered on an input line.
    FallingEdge,
}

/// One entry of the mock's pin activity log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinEvent {
    pub line: LineId,
    pub kind: PinEventKind,
    pub at: Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Input,
    Output,
}

#[derive(Debug)]
struct LineState {
    direction: Direction,
    level: Level,
    label: String,
}

struct Subscription {
    line: LineId,
    sink: Arc<dyn EdgeSink>,
}

#[derive(Default)]
struct MockState {
    recording: bool,

    lines: HashMap<LineId, LineState>,
    subscriptions: HashMap<NotificationId, Subscription>,
    next_notification: u32,

    /// trigger line -> echo line
    wiring: HashMap<LineId, LineId>,
    default_echo: HashMap<LineId, EchoResponse>,
    scripted_echo: HashMap<LineId, VecDeque<EchoResponse>>,

    failing_requests: HashSet<LineId>,
    failing_notifications: HashSet<LineId>,
    failing_outputs: HashSet<LineId>,

    events: Vec<PinEvent>,
}

impl MockState {
    fn record(&mut self, line: LineId, kind: PinEventKind, at: Timestamp) {
        if self.recording {
            self.events.push(PinEvent { line, kind, at });
        }
    }

    fn next_echo(&mut self, echo: LineId) -> EchoResponse {
        self.scripted_echo
            .get_mut(&echo)
            .and_then(VecDeque::pop_front)
            .or_else(|| self.default_echo.get(&echo).copied())
            .unwrap_or(EchoResponse::Silent)
    }

    fn claim(&mut self, line: LineId, direction: Direction, label: &str, level: Level) -> Result<()> {
        if self.failing_requests.contains(&line) || self.lines.contains_key(&line) {
            return Err(HardwareError::LineBusy { line });
        }
        self.lines.insert(
            line,
            LineState {
                direction,
                level,
                label: label.to_string(),
            },
        );
        Ok(())
    }
}

/// Mock GPIO backend for testing and development.
///
/// Created together with a [`MockGpioHandle`] which wires simulated sensors,
/// scripts their echoes, injects failures and inspects pin activity.
///
/// Pin activity is logged until [`MockGpioHandle::set_recording`] turns the
/// log off.
///
/// # Examples
///
/// ```
/// use sonar_core::Level;
/// use sonar_hardware::mock::{EchoResponse, MockGpio, SimClock};
/// use sonar_hardware::traits::{GpioBackend, LineId};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// # fn main() -> sonar_hardware::Result<()> {
/// let (gpio, handle) = MockGpio::new(Arc::new(SimClock::new()));
/// handle.wire(LineId(17), LineId(4), EchoResponse::After(Duration::from_micros(580)));
///
/// gpio.request_output(LineId(17), "trigger", Level::Low)?;
/// gpio.set_output(LineId(17), Level::High)?;
/// gpio.set_output(LineId(17), Level::Low)?;
///
/// assert_eq!(handle.pulse_count(LineId(17)), 1);
/// # Ok(())
/// # }
/// ```
pub struct MockGpio {
    state: Arc<Mutex<MockState>>,
    clock: Arc<dyn Clock>,
    echo_latency: Duration,
}

impl MockGpio {
    /// Create a new mock chip timestamping on `clock`.
    pub fn new(clock: Arc<dyn Clock>) -> (Self, MockGpioHandle) {
        Self::with_echo_latency(clock, ECHO_LATENCY)
    }

    /// Create a mock chip whose responders wait `latency` of real time
    /// before they start timing the echo.
    ///
    /// A [`SimClock`](super::SimClock) needs a non-zero latency. A real clock
    /// can use [`Duration::ZERO`], which lets echoes shorter than
    /// [`ECHO_LATENCY`] arrive on time.
    pub fn with_echo_latency(clock: Arc<dyn Clock>, latency: Duration) -> (Self, MockGpioHandle) {
        let state = Arc::new(Mutex::new(MockState {
            recording: true,
            ..MockState::default()
        }));

        let gpio = Self {
            state: Arc::clone(&state),
            clock: Arc::clone(&clock),
            echo_latency: latency,
        };
        let handle = MockGpioHandle { state, clock };

        (gpio, handle)
    }

    /// Deliver a falling edge on `echo` once the clock reaches `due`.
    fn spawn_echo(&self, echo: LineId, due: Timestamp) {
        let state = Arc::clone(&self.state);
        let clock = Arc::clone(&self.clock);
        let latency = self.echo_latency;

        std::thread::spawn(move || {
            if !latency.is_zero() {
                std::thread::sleep(latency);
            }
            let remaining = due.nanos_since(clock.now());
            if remaining > 0 {
                clock.delay(Duration::from_nanos(remaining));
            }
            deliver_edge(&state, clock.as_ref(), echo);
        });
    }
}

impl fmt::Debug for MockGpio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("MockGpio")
            .field("lines", &state.lines.len())
            .field("subscriptions", &state.subscriptions.len())
            .finish()
    }
}

/// Log the edge and hand it to every sink watching `line`.
///
/// Sinks are called after the state lock is dropped.
fn deliver_edge(state: &Mutex<MockState>, clock: &dyn Clock, line: LineId) {
    let sinks: Vec<Arc<dyn EdgeSink>> = {
        let mut guard = state.lock();
        let state = &mut *guard;
        state.record(line, PinEventKind::FallingEdge, clock.now());
        if let Some(entry) = state.lines.get_mut(&line) {
            entry.level = Level::Low;
        }
        state
            .subscriptions
            .values()
            .filter(|s| s.line == line)
            .map(|s| Arc::clone(&s.sink))
            .collect()
    };

    trace!(line = line.0, sinks = sinks.len(), "mock falling edge");
    for sink in sinks {
        sink.on_falling_edge();
    }
}

impl GpioBackend for MockGpio {
    fn request_output(&self, line: LineId, label: &str, initial: Level) -> Result<()> {
        self.state
            .lock()
            .claim(line, Direction::Output, label, initial)
    }

    fn request_input(&self, line: LineId, label: &str) -> Result<()> {
        self.state
            .lock()
            .claim(line, Direction::Input, label, Level::Low)
    }

    fn set_output(&self, line: LineId, level: Level) -> Result<()> {
        let echo = {
            let mut guard = self.state.lock();
            let state = &mut *guard;

            if state.failing_outputs.contains(&line) {
                return Err(HardwareError::backend(format!("line {line} stuck")));
            }
            let entry = state
                .lines
                .get_mut(&line)
                .ok_or(HardwareError::UnknownLine { line })?;
            if entry.direction != Direction::Output {
                return Err(HardwareError::NotOutput { line });
            }

            let previous = std::mem::replace(&mut entry.level, level);
            let at = self.clock.now();
            state.record(line, PinEventKind::Set(level), at);

            if previous == Level::High && level == Level::Low {
                match state.wiring.get(&line).copied() {
                    Some(echo) => Some((echo, state.next_echo(echo), at)),
                    None => None,
                }
            } else {
                None
            }
        };

        if let Some((echo, EchoResponse::After(flight), fell)) = echo {
            self.spawn_echo(echo, fell.saturating_add(flight));
        }
        Ok(())
    }

    fn request_edge_notification(
        &self,
        line: LineId,
        _label: &str,
        sink: Arc<dyn EdgeSink>,
    ) -> Result<NotificationId> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        match state.lines.get(&line) {
            Some(entry) if entry.direction == Direction::Input => {}
            Some(_) => {
                return Err(HardwareError::backend(format!(
                    "line {line} is not an input"
                )));
            }
            None => return Err(HardwareError::UnknownLine { line }),
        }
        if state.failing_notifications.contains(&line) {
            return Err(HardwareError::backend(format!(
                "no interrupt for line {line}"
            )));
        }

        let id = NotificationId(state.next_notification);
        state.next_notification += 1;
        state.subscriptions.insert(id, Subscription { line, sink });
        Ok(id)
    }

    fn release_notification(&self, id: NotificationId) {
        self.state.lock().subscriptions.remove(&id);
    }

    fn release_line(&self, line: LineId) {
        self.state.lock().lines.remove(&line);
    }
}

/// Handle for controlling a mock GPIO chip.
///
/// Cloneable; all clones act on the same chip.
#[derive(Clone)]
pub struct MockGpioHandle {
    state: Arc<Mutex<MockState>>,
    clock: Arc<dyn Clock>,
}

impl MockGpioHandle {
    /// Attach a simulated sensor: pulses on `trigger` produce `response` on `echo`.
    pub fn wire(&self, trigger: LineId, echo: LineId, response: EchoResponse) {
        let mut state = self.state.lock();
        state.wiring.insert(trigger, echo);
        state.default_echo.insert(echo, response);
    }

    /// Change the standing response of the sensor behind `echo`.
    pub fn set_echo(&self, echo: LineId, response: EchoResponse) {
        self.state.lock().default_echo.insert(echo, response);
    }

    /// Queue a one-shot response, used before the standing one.
    pub fn push_echo(&self, echo: LineId, response: EchoResponse) {
        self.state
            .lock()
            .scripted_echo
            .entry(echo)
            .or_default()
            .push_back(response);
    }

    /// Deliver a falling edge on `line` right now, from the calling thread.
    pub fn fire_edge(&self, line: LineId) {
        deliver_edge(&self.state, self.clock.as_ref(), line);
    }

    /// Make the next claims of `line` fail as if another consumer held it.
    pub fn fail_requests_for(&self, line: LineId) {
        self.state.lock().failing_requests.insert(line);
    }

    /// Make edge-notification registration on `line` fail.
    pub fn fail_notifications_for(&self, line: LineId) {
        self.state.lock().failing_notifications.insert(line);
    }

    /// Make driving `line` fail.
    pub fn fail_outputs_for(&self, line: LineId) {
        self.state.lock().failing_outputs.insert(line);
    }

    /// Remove every injected failure.
    pub fn clear_failures(&self) {
        let mut state = self.state.lock();
        state.failing_requests.clear();
        state.failing_notifications.clear();
        state.failing_outputs.clear();
    }

    pub fn is_claimed(&self, line: LineId) -> bool {
        self.state.lock().lines.contains_key(&line)
    }

    /// Claimed lines in ascending order.
    pub fn claimed_lines(&self) -> Vec<LineId> {
        let mut lines: Vec<LineId> = self.state.lock().lines.keys().copied().collect();
        lines.sort();
        lines
    }

    pub fn label(&self, line: LineId) -> Option<String> {
        self.state.lock().lines.get(&line).map(|l| l.label.clone())
    }

    pub fn level(&self, line: LineId) -> Option<Level> {
        self.state.lock().lines.get(&line).map(|l| l.level)
    }

    pub fn active_notifications(&self) -> usize {
        self.state.lock().subscriptions.len()
    }

    /// Snapshot of the pin activity log.
    pub fn events(&self) -> Vec<PinEvent> {
        self.state.lock().events.clone()
    }

    pub fn clear_events(&self) {
        self.state.lock().events.clear();
    }

    /// Turn the pin activity log on or off. It starts on.
    ///
    /// The log only shrinks through [`clear_events`](Self::clear_events);
    /// leave it off on a chip that runs indefinitely.
    pub fn set_recording(&self, on: bool) {
        self.state.lock().recording = on;
    }

    /// Number of times `line` was driven high.
    pub fn pulse_count(&self, line: LineId) -> usize {
        self.state
            .lock()
            .events
            .iter()
            .filter(|e| e.line == line && e.kind == PinEventKind::Set(Level::High))
            .count()
    }
}

impl fmt::Debug for MockGpioHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockGpioHandle").finish_non_exhaustive()
    }
}
