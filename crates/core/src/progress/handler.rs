//! Progress handler trait and events

use std::path::PathBuf;
use std::time::Duration;

/// Events emitted while an init run progresses
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Run started
    Started { root: PathBuf, mode: &'static str },

    /// A workflow phase is about to run
    PhaseStarted { phase: &'static str },

    /// A workflow phase finished
    PhaseComplete {
        phase: &'static str,
        elapsed: Duration,
    },

    /// Walk and per-file detection finished
    ScanComplete {
        files_scanned: usize,
        builders: usize,
        resources: usize,
        findings: usize,
        scan_time: Duration,
    },

    /// A builder was committed to an image
    PairingCommitted { path: PathBuf, image: String },

    /// Several builders could produce one image
    Ambiguous { image: String, candidates: usize },

    /// Run finished successfully
    Completed {
        artifacts: usize,
        total_time: Duration,
    },

    /// Run aborted
    Failed { error: String },
}

/// Trait for handling progress events during an init run
pub trait ProgressHandler: Send + Sync {
    fn on_progress(&self, event: &ProgressEvent);
}

/// No-op handler that ignores all events
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpHandler;

impl ProgressHandler for NoOpHandler {
    fn on_progress(&self, _event: &ProgressEvent) {}
}
