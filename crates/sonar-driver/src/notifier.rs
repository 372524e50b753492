//! Echo completion signalling.
//!
//! [`EdgeNotifier`] runs in the backend's notification context. It stamps the
//! time, marks the channel's [`EchoState`] ready and wakes the waiting
//! session. Nothing in it blocks.

use sonar_core::{ChannelId, Timestamp};
use sonar_hardware::{Clock, EdgeSink};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::trace;

/// Per-channel completion state shared by a session and its notifier.
#[derive(Debug, Default)]
pub(crate) struct EchoState {
    ready: AtomicBool,
    end: AtomicU64,
    signal: Notify,
}

impl EchoState {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Forget any earlier edge. Called before every trigger.
    pub(crate) fn arm(&self) {
        self.ready.store(false, Ordering::Release);
    }

    pub(crate) fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Time of the first falling edge since the last [`arm`](Self::arm).
    pub(crate) fn end(&self) -> Timestamp {
        Timestamp::from_nanos(self.end.load(Ordering::Acquire))
    }

    fn complete(&self, at: Timestamp) -> bool {
        if self.ready.load(Ordering::Acquire) {
            return false;
        }
        self.end.store(at.as_nanos(), Ordering::Release);
        self.ready.store(true, Ordering::Release);
        self.signal.notify_one();
        true
    }

    /// Wait until the state is ready or `timeout` elapses.
    ///
    /// Returns whether the echo arrived. Wakeups that find the state not
    /// ready (a permit left by an edge from an earlier cycle) are ignored.
    pub(crate) async fn wait(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            let notified = self.signal.notified();
            if self.is_ready() {
                return true;
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return self.is_ready();
            }
        }
    }
}

/// Falling-edge callback of one channel.
pub struct EdgeNotifier {
    channel: ChannelId,
    state: Arc<EchoState>,
    clock: Arc<dyn Clock>,
}

impl EdgeNotifier {
    pub(crate) fn new(channel: ChannelId, state: Arc<EchoState>, clock: Arc<dyn Clock>) -> Self {
        Self {
            channel,
            state,
            clock,
        }
    }

    pub fn channel(&self) -> ChannelId {
        self.channel
    }
}

impl EdgeSink for EdgeNotifier {
    fn on_falling_edge(&self) {
        let now = self.clock.now();
        if self.state.complete(now) {
            trace!(channel = %self.channel, at = %now, "Echo received");
        }
    }
}

impl std::fmt::Debug for EdgeNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EdgeNotifier")
            .field("channel", &self.channel)
            .field("ready", &self.state.is_ready())
            .finish()
    }
}
