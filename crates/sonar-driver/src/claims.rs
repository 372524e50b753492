//! Ordered record of acquired GPIO resources.

use sonar_core::{Error, Level, Result};
use sonar_hardware::{EdgeSink, GpioBackend, LineId, NotificationId};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Claim {
    Line(LineId),
    Notification(NotificationId),
}

/// Lines and notifications held by a registry.
///
/// Everything recorded is released in reverse acquisition order when the
/// set is dropped, so a half-finished initialization unwinds exactly what it
/// acquired.
pub(crate) struct HardwareClaims {
    backend: Arc<dyn GpioBackend>,
    claims: Vec<Claim>,
}

impl HardwareClaims {
    pub(crate) fn new(backend: Arc<dyn GpioBackend>) -> Self {
        Self {
            backend,
            claims: Vec::new(),
        }
    }

    pub(crate) fn output(&mut self, line: LineId, label: &str, initial: Level) -> Result<()> {
        self.backend
            .request_output(line, label, initial)
            .map_err(|e| Error::initialization_failed(format!("trigger line {line}: {e}")))?;
        self.claims.push(Claim::Line(line));
        Ok(())
    }

    pub(crate) fn input(&mut self, line: LineId, label: &str) -> Result<()> {
        self.backend
            .request_input(line, label)
            .map_err(|e| Error::initialization_failed(format!("echo line {line}: {e}")))?;
        self.claims.push(Claim::Line(line));
        Ok(())
    }

    pub(crate) fn edge_notification(
        &mut self,
        line: LineId,
        label: &str,
        sink: Arc<dyn EdgeSink>,
    ) -> Result<()> {
        let id = self
            .backend
            .request_edge_notification(line, label, sink)
            .map_err(|e| Error::initialization_failed(format!("edge notification on {line}: {e}")))?;
        self.claims.push(Claim::Notification(id));
        Ok(())
    }

    pub(crate) fn len(&self) -> usize {
        self.claims.len()
    }
}

impl Drop for HardwareClaims {
    fn drop(&mut self) {
        if self.claims.is_empty() {
            return;
        }
        debug!(count = self.claims.len(), "Releasing GPIO resources");
        for claim in self.claims.drain(..).rev() {
            match claim {
                Claim::Line(line) => self.backend.release_line(line),
                Claim::Notification(id) => self.backend.release_notification(id),
            }
        }
    }
}

impl std::fmt::Debug for HardwareClaims {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HardwareClaims")
            .field("claims", &self.claims)
            .finish()
    }
}
