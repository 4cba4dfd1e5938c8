//! Rendering of init results for the terminal, and the write of the
//! generated config to its target.

use anyhow::{Context, Result};
use pipegen_core::{InitError, InitReport};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

/// Format of the run summary printed to stderr
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// JSON format (machine-readable)
    Json,
    /// Human-readable formatted text
    Human,
}

pub struct OutputFormatter {
    format: OutputFormat,
}

impl OutputFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Summarise a generating run. `target` is where the config went.
    pub fn format_report(&self, report: &InitReport, target: &Path) -> Result<String> {
        match self.format {
            OutputFormat::Json => self.format_json(report, target),
            OutputFormat::Human => Ok(self.format_human(report, target)),
        }
    }

    fn format_json(&self, report: &InitReport, target: &Path) -> Result<String> {
        let value = serde_json::json!({
            "target": target.display().to_string(),
            "report": report,
        });
        serde_json::to_string_pretty(&value).context("Failed to serialize init report to JSON")
    }

    fn format_human(&self, report: &InitReport, target: &Path) -> String {
        let mut out = String::new();
        if target.as_os_str() == "-" {
            let _ = writeln!(out, "Generated pipeline config");
        } else {
            let _ = writeln!(out, "Wrote {}", target.display());
        }

        if !report.pairings.is_empty() {
            let _ = writeln!(out, "\nPairings:");
            for pairing in &report.pairings {
                let _ = writeln!(out, "  {} -> {}", pairing.path, pairing.image);
            }
        }

        section(&mut out, "Images without a builder", &report.unresolved);
        section(&mut out, "Builders without an image", &report.unpaired);

        if !report.conflicts.is_empty() {
            let _ = writeln!(out, "\nConflicts:");
            for conflict in &report.conflicts {
                let _ = writeln!(out, "  {}: {}", conflict.image, conflict.paths.join(", "));
            }
        }

        if !report.findings.is_empty() {
            let _ = writeln!(out, "\nSkipped files:");
            for finding in &report.findings {
                let _ = writeln!(out, "  {}: {}", finding.path, finding.message);
            }
        }

        section(&mut out, "Warnings", &report.warnings);
        out
    }
}

fn section(out: &mut String, title: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    let _ = writeln!(out, "\n{}:", title);
    for item in items {
        let _ = writeln!(out, "  {}", item);
    }
}

fn staging_path(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "pipegen".to_string());
    target.with_file_name(format!(".{}.tmp", name))
}

/// Write `content` next to `target` and rename it into place, so a reader
/// never sees a half-written config.
pub fn write_atomically(target: &Path, content: &str) -> Result<(), InitError> {
    let staging = staging_path(target);
    fs::write(&staging, content).map_err(|e| InitError::io(&staging, e))?;
    if let Err(e) = fs::rename(&staging, target) {
        let _ = fs::remove_file(&staging);
        return Err(InitError::io(target, e));
    }
    Ok(())
}
