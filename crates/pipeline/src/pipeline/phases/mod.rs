// Init phases, numbered in run order. Analyze mode swaps resolve and emit
// for a single report phase.

#[path = "03_analyze.rs"]
pub mod analyze;
#[path = "02_detect.rs"]
pub mod detect;
#[path = "04_emit.rs"]
pub mod emit;
#[path = "03_resolve.rs"]
pub mod resolve;
#[path = "01_scan.rs"]
pub mod scan;

use pipegen_core::Finding;
use std::path::Path;

/// One-line explanation for reports.
pub(crate) fn describe_finding(finding: &Finding) -> String {
    match finding {
        Finding::Unusable { kind, reason, .. } => format!("{} found but unusable: {}", kind, reason),
        Finding::KindDisagreement { kinds, .. } => {
            format!("claimed by several detectors: {}", kinds.join(", "))
        }
        Finding::Unreadable { reason, .. } => format!("unreadable: {}", reason),
        Finding::TooLarge { size, .. } => format!("skipped, {} bytes exceeds the size limit", size),
    }
}

/// Root-relative display form with `/` separators; absolute paths outside
/// the root are returned unchanged.
pub(crate) fn relative_to(root: &Path, path: &Path) -> String {
    match path.strip_prefix(root) {
        Ok(rel) => rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().to_string())
            .collect::<Vec<_>>()
            .join("/"),
        Err(_) => path.display().to_string(),
    }
}
