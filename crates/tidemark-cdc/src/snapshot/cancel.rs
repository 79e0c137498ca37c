//! Cooperative cancellation and run context

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::Span;

/// Externally-set stop signal polled at table boundaries.
///
/// Clones share the same flag; the run controller keeps one and hands another
/// to the snapshot. A stop takes effect before the next table is processed,
/// never in the middle of a lock or metadata call.
#[derive(Debug, Clone)]
pub struct CancellationMonitor {
    running: Arc<AtomicBool>,
}

impl CancellationMonitor {
    /// Create a monitor in the running state
    pub fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Check if the run may continue
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Request the run to stop
    pub fn cancel(&self) {
        self.running.store(false, Ordering::Release);
    }

    /// Check if a stop was requested
    pub fn is_cancelled(&self) -> bool {
        !self.is_running()
    }
}

impl Default for CancellationMonitor {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-run context handed to the coordinator.
///
/// Carries the cancellation signal and the span every log line of the run is
/// recorded under.
#[derive(Debug, Clone)]
pub struct SnapshotContext {
    monitor: CancellationMonitor,
    span: Span,
}

impl SnapshotContext {
    /// Create a context with a fresh monitor and a `snapshot` span
    pub fn new() -> Self {
        Self::with_monitor(CancellationMonitor::new())
    }

    /// Create a context around an existing monitor
    pub fn with_monitor(monitor: CancellationMonitor) -> Self {
        Self {
            monitor,
            span: tracing::info_span!("snapshot"),
        }
    }

    /// Replace the run's span
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Cancellation signal
    pub fn monitor(&self) -> &CancellationMonitor {
        &self.monitor
    }

    /// Run-scoped span
    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Check if the run may continue
    pub fn is_running(&self) -> bool {
        self.monitor.is_running()
    }
}

impl Default for SnapshotContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_flag() {
        let monitor = CancellationMonitor::new();
        let handle = monitor.clone();
        assert!(monitor.is_running());

        handle.cancel();
        assert!(!monitor.is_running());
        assert!(monitor.is_cancelled());
    }

    #[test]
    fn test_context_reflects_monitor() {
        let monitor = CancellationMonitor::new();
        let ctx = SnapshotContext::with_monitor(monitor.clone());
        assert!(ctx.is_running());

        monitor.cancel();
        assert!(!ctx.is_running());
        assert!(ctx.monitor().is_cancelled());
    }
}
