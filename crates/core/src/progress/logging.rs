//! Logging-based progress handler

use super::{ProgressEvent, ProgressHandler};
use tracing::{debug, error, info, warn};

/// Handler that logs progress events using tracing
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingHandler;

impl ProgressHandler for LoggingHandler {
    fn on_progress(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::Started { root, mode } => {
                info!(root = %root.display(), mode, "Starting init");
            }
            ProgressEvent::PhaseStarted { phase } => {
                debug!(phase, "Phase started");
            }
            ProgressEvent::PhaseComplete { phase, elapsed } => {
                debug!(phase, elapsed_ms = elapsed.as_millis(), "Phase complete");
            }
            ProgressEvent::ScanComplete {
                files_scanned,
                builders,
                resources,
                findings,
                scan_time,
            } => {
                info!(
                    files = files_scanned,
                    builders,
                    resources,
                    findings,
                    scan_time_ms = scan_time.as_millis(),
                    "Scan complete"
                );
            }
            ProgressEvent::PairingCommitted { path, image } => {
                debug!(path = %path.display(), image = %image, "Paired builder");
            }
            ProgressEvent::Ambiguous { image, candidates } => {
                warn!(image = %image, candidates, "Several builders match image");
            }
            ProgressEvent::Completed {
                artifacts,
                total_time,
            } => {
                info!(
                    artifacts,
                    total_time_ms = total_time.as_millis(),
                    "Init complete"
                );
            }
            ProgressEvent::Failed { error } => {
                error!(error = %error, "Init failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;

    #[test]
    fn test_logging_handler_accepts_all_events() {
        let handler = LoggingHandler;
        let events = vec![
            ProgressEvent::Started {
                root: PathBuf::from("/repo"),
                mode: "analyze",
            },
            ProgressEvent::PhaseStarted { phase: "detect" },
            ProgressEvent::PhaseComplete {
                phase: "detect",
                elapsed: Duration::from_millis(3),
            },
            ProgressEvent::PairingCommitted {
                path: PathBuf::from("/repo/Dockerfile"),
                image: "repo".to_string(),
            },
            ProgressEvent::Failed {
                error: "boom".to_string(),
            },
        ];

        for event in &events {
            handler.on_progress(event);
        }
    }
}
