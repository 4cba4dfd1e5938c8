use crate::interaction::Interaction;
use pipegen_core::{
    AnalysisReport, BuilderArtifact, CancelSignal, DeploySource, FileSystem, Finding, InitConfig,
    InitError, InitReport, ManifestResource, PipelineConfig, ProgressHandler, ResolutionSet,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Raw per-file results of the scan phase, sorted by path.
#[derive(Debug, Clone, Default)]
pub struct ScanResult {
    pub files_scanned: usize,
    pub builders: Vec<BuilderArtifact>,
    pub resources: Vec<ManifestResource>,
    pub findings: Vec<Finding>,
    pub scan_time: Duration,
}

/// Everything the run found, before any pairing decision.
#[derive(Debug, Clone, Default)]
pub struct Detection {
    pub builders: Vec<BuilderArtifact>,
    pub resources: Vec<ManifestResource>,
    /// Distinct images referenced by workloads, sorted
    pub images: Vec<String>,
    pub deploy_paths: Vec<PathBuf>,
    pub deploy_source: DeploySource,
    pub findings: Vec<Finding>,
    pub warnings: Vec<String>,
}

impl Detection {
    pub fn is_empty(&self) -> bool {
        self.builders.is_empty() && self.resources.is_empty() && self.deploy_paths.is_empty()
    }
}

#[derive(Debug, Clone)]
pub enum InitOutcome {
    Generated {
        config: PipelineConfig,
        report: InitReport,
        /// `-` when the config goes to standard output
        target: PathBuf,
    },
    Analysis(AnalysisReport),
}

pub struct InitContext {
    pub config: InitConfig,
    pub fs: Arc<dyn FileSystem>,
    pub cancel: CancelSignal,
    pub progress: Arc<dyn ProgressHandler>,
    /// Taken by the resolve phase while it runs
    pub interaction: Option<Box<dyn Interaction>>,
    pub scan: Option<ScanResult>,
    pub detection: Option<Detection>,
    pub resolution: Option<ResolutionSet>,
    pub outcome: Option<InitOutcome>,
}

impl InitContext {
    pub fn new(
        config: InitConfig,
        fs: Arc<dyn FileSystem>,
        cancel: CancelSignal,
        progress: Arc<dyn ProgressHandler>,
        interaction: Box<dyn Interaction>,
    ) -> Self {
        Self {
            config,
            fs,
            cancel,
            progress,
            interaction: Some(interaction),
            scan: None,
            detection: None,
            resolution: None,
            outcome: None,
        }
    }

    pub fn check_cancelled(&self) -> Result<(), InitError> {
        if self.cancel.is_cancelled() {
            Err(InitError::Cancelled)
        } else {
            Ok(())
        }
    }

    pub fn scan(&self) -> Result<&ScanResult, InitError> {
        self.scan
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("Scan phase has not run").into())
    }

    pub fn detection(&self) -> Result<&Detection, InitError> {
        self.detection
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("Detect phase has not run").into())
    }

    /// Hand the resolution to its single consumer.
    pub fn take_resolution(&mut self) -> Result<ResolutionSet, InitError> {
        self.resolution
            .take()
            .ok_or_else(|| anyhow::anyhow!("Resolve phase has not run").into())
    }
}
