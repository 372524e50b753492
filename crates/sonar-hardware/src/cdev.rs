//! Linux GPIO character device backend.
//!
//! Drives lines through `/dev/gpiochipN` with the `gpio-cdev` crate. Falling
//! edges are read from the kernel's line-event file descriptor on a tokio
//! task, which plays the part of the interrupt handler: it only forwards each
//! event to the registered [`EdgeSink`].
//!
//! The sink stamps the edge when the task runs, not at the kernel's event
//! timestamp, so scheduling latency on the watcher task adds to the measured
//! round trip (each 58 µs reads as one more centimetre).
//!
//! Requires the `hardware-gpio-cdev` feature and a running tokio runtime.

use crate::{
    HardwareError, Result,
    traits::{EdgeSink, GpioBackend, LineId, NotificationId},
};
use futures::StreamExt;
use gpio_cdev::{AsyncLineEventHandle, Chip, EventRequestFlags, Line, LineHandle, LineRequestFlags};
use parking_lot::Mutex;
use sonar_core::Level;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

fn cdev_error(error: gpio_cdev::Error) -> HardwareError {
    HardwareError::backend(error.to_string())
}

#[derive(Default)]
struct ClaimedLines {
    outputs: HashMap<LineId, LineHandle>,
    /// Inputs are claimed by the kernel once their events are requested.
    inputs: HashMap<LineId, Line>,
}

impl ClaimedLines {
    fn contains(&self, line: LineId) -> bool {
        self.outputs.contains_key(&line) || self.inputs.contains_key(&line)
    }
}

struct Watcher {
    line: LineId,
    task: JoinHandle<()>,
}

/// [`GpioBackend`] over a Linux GPIO chip.
pub struct CdevGpio {
    chip: Mutex<Chip>,
    lines: Mutex<ClaimedLines>,
    watchers: Mutex<HashMap<NotificationId, Watcher>>,
    next_notification: AtomicU32,
    runtime: Handle,
}

impl CdevGpio {
    /// Open the chip at `path` (for example `/dev/gpiochip0`).
    ///
    /// # Errors
    ///
    /// Returns an error if the chip cannot be opened or no tokio runtime is
    /// running on the calling thread.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let runtime = Handle::try_current()
            .map_err(|e| HardwareError::backend(format!("no tokio runtime: {e}")))?;
        let chip = Chip::new(path.as_ref()).map_err(cdev_error)?;
        debug!("Opened GPIO chip {}", path.as_ref().display());

        Ok(Self {
            chip: Mutex::new(chip),
            lines: Mutex::new(ClaimedLines::default()),
            watchers: Mutex::new(HashMap::new()),
            next_notification: AtomicU32::new(0),
            runtime,
        })
    }

    fn resolve(&self, line: LineId) -> Result<Line> {
        self.chip
            .lock()
            .get_line(line.0)
            .map_err(|_| HardwareError::UnknownLine { line })
    }
}

impl GpioBackend for CdevGpio {
    fn request_output(&self, line: LineId, label: &str, initial: Level) -> Result<()> {
        let mut lines = self.lines.lock();
        if lines.contains(line) {
            return Err(HardwareError::LineBusy { line });
        }
        let handle = self
            .resolve(line)?
            .request(LineRequestFlags::OUTPUT, initial.as_u8(), label)
            .map_err(cdev_error)?;
        lines.outputs.insert(line, handle);
        Ok(())
    }

    fn request_input(&self, line: LineId, _label: &str) -> Result<()> {
        let mut lines = self.lines.lock();
        if lines.contains(line) {
            return Err(HardwareError::LineBusy { line });
        }
        let resolved = self.resolve(line)?;
        lines.inputs.insert(line, resolved);
        Ok(())
    }

    fn set_output(&self, line: LineId, level: Level) -> Result<()> {
        let lines = self.lines.lock();
        match lines.outputs.get(&line) {
            Some(handle) => handle.set_value(level.as_u8()).map_err(cdev_error),
            None if lines.inputs.contains_key(&line) => Err(HardwareError::NotOutput { line }),
            None => Err(HardwareError::UnknownLine { line }),
        }
    }

    fn request_edge_notification(
        &self,
        line: LineId,
        label: &str,
        sink: Arc<dyn EdgeSink>,
    ) -> Result<NotificationId> {
        let resolved = self
            .lines
            .lock()
            .inputs
            .get(&line)
            .cloned()
            .ok_or(HardwareError::UnknownLine { line })?;

        let events = resolved
            .events(
                LineRequestFlags::INPUT,
                EventRequestFlags::FALLING_EDGE,
                label,
            )
            .map_err(cdev_error)?;

        // Registering the fd with the reactor needs the runtime context.
        let _runtime = self.runtime.enter();
        let mut stream = AsyncLineEventHandle::new(events).map_err(cdev_error)?;

        let task = self.runtime.spawn(async move {
            while let Some(event) = stream.next().await {
                match event {
                    Ok(_) => sink.on_falling_edge(),
                    Err(e) => {
                        warn!(line = line.0, "Edge event stream failed: {}", e);
                        break;
                    }
                }
            }
        });

        let id = NotificationId(self.next_notification.fetch_add(1, Ordering::Relaxed));
        self.watchers.lock().insert(id, Watcher { line, task });
        debug!(line = line.0, notification = %id, "Watching falling edges");
        Ok(id)
    }

    fn release_notification(&self, id: NotificationId) {
        if let Some(watcher) = self.watchers.lock().remove(&id) {
            // Aborting drops the event handle, which gives the line back to the kernel.
            watcher.task.abort();
            debug!(line = watcher.line.0, notification = %id, "Stopped watching edges");
        }
    }

    fn release_line(&self, line: LineId) {
        let mut lines = self.lines.lock();
        lines.outputs.remove(&line);
        lines.inputs.remove(&line);
    }
}
