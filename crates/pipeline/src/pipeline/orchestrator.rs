use super::context::{InitContext, InitOutcome};
use super::phase_trait::WorkflowPhase;
use super::phases::{
    analyze::AnalyzePhase, detect::DetectPhase, emit::EmitPhase, resolve::ResolvePhase,
    scan::ScanPhase,
};
use crate::interaction::{Interaction, NoInteraction};
use pipegen_core::{
    CancelSignal, FileSystem, InitConfig, InitError, LoggingHandler, ProgressEvent,
    ProgressHandler, RealFileSystem,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Runs one init: validation, then scan → detect → resolve → emit, or
/// scan → detect → analyze in analyze mode.
pub struct PipelineOrchestrator {
    config: InitConfig,
    fs: Arc<dyn FileSystem>,
    interaction: Box<dyn Interaction>,
    cancel: CancelSignal,
    progress: Arc<dyn ProgressHandler>,
}

impl PipelineOrchestrator {
    pub fn new(config: InitConfig) -> Self {
        Self {
            config,
            fs: Arc::new(RealFileSystem),
            interaction: Box::new(NoInteraction),
            cancel: CancelSignal::never(),
            progress: Arc::new(LoggingHandler),
        }
    }

    pub fn with_fs(mut self, fs: Arc<dyn FileSystem>) -> Self {
        self.fs = fs;
        self
    }

    pub fn with_interaction(mut self, interaction: Box<dyn Interaction>) -> Self {
        self.interaction = interaction;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelSignal) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressHandler>) -> Self {
        self.progress = progress;
        self
    }

    fn phases(analyze: bool) -> Vec<Box<dyn WorkflowPhase>> {
        if analyze {
            vec![
                Box::new(ScanPhase),
                Box::new(DetectPhase),
                Box::new(AnalyzePhase),
            ]
        } else {
            vec![
                Box::new(ScanPhase),
                Box::new(DetectPhase),
                Box::new(ResolvePhase),
                Box::new(EmitPhase),
            ]
        }
    }

    pub async fn execute(self) -> Result<InitOutcome, InitError> {
        let progress = self.progress.clone();
        let result = self.run().await;
        if let Err(e) = &result {
            progress.on_progress(&ProgressEvent::Failed {
                error: e.to_string(),
            });
        }
        result
    }

    /// The project root as every phase sees it: resolved through links and
    /// required to be a directory.
    pub fn project_root(&self) -> Result<PathBuf, InitError> {
        let given = &self.config.root;
        let root = self.fs.canonicalize(given).map_err(|e| {
            e.context(format!("Project root {} is not accessible", given.display()))
        })?;
        if !self.fs.is_dir(&root) {
            return Err(
                anyhow::anyhow!("Project root {} is not a directory", root.display()).into(),
            );
        }
        Ok(root)
    }

    async fn run(self) -> Result<InitOutcome, InitError> {
        let start = Instant::now();
        self.config.validate()?;
        let root = self.project_root()?;
        let mut config = self.config;
        config.root = root;
        debug!("{}", config);

        // Fail before any scanning work
        if !config.analyze && !config.force && !config.writes_to_stdout() {
            let target = config.target_path();
            if self.fs.exists(&target) {
                return Err(InitError::WouldOverwrite(target));
            }
        }

        let analyze = config.analyze;
        info!(
            root = %config.root.display(),
            analyze,
            force = config.force,
            "Starting init pipeline"
        );
        self.progress.on_progress(&ProgressEvent::Started {
            root: config.root.clone(),
            mode: if analyze { "analyze" } else { "generate" },
        });

        let mut context = InitContext::new(
            config,
            self.fs,
            self.cancel,
            self.progress.clone(),
            self.interaction,
        );

        for phase in Self::phases(analyze) {
            context.check_cancelled()?;
            let phase_name = phase.name();
            info!(phase = %phase_name, "Starting phase");
            self.progress
                .on_progress(&ProgressEvent::PhaseStarted { phase: phase_name });

            let phase_start = Instant::now();
            phase.execute(&mut context).await?;

            info!(
                phase = %phase_name,
                duration_ms = phase_start.elapsed().as_millis(),
                "Phase complete"
            );
            self.progress.on_progress(&ProgressEvent::PhaseComplete {
                phase: phase_name,
                elapsed: phase_start.elapsed(),
            });
        }

        let outcome = context
            .outcome
            .take()
            .ok_or_else(|| anyhow::anyhow!("Pipeline finished without an outcome"))?;

        let artifacts = match &outcome {
            InitOutcome::Generated { config, .. } => config.artifacts().len(),
            InitOutcome::Analysis(report) => report.builders.len(),
        };
        info!(
            artifacts,
            total_time_ms = start.elapsed().as_millis(),
            "Init complete"
        );
        self.progress.on_progress(&ProgressEvent::Completed {
            artifacts,
            total_time: start.elapsed(),
        });

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipegen_core::{MockFileSystem, NoOpHandler};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<String>>);

    impl ProgressHandler for Recorder {
        fn on_progress(&self, event: &ProgressEvent) {
            let label = match event {
                ProgressEvent::PhaseStarted { phase } => phase.to_string(),
                ProgressEvent::Failed { .. } => "failed".to_string(),
                ProgressEvent::Completed { .. } => "completed".to_string(),
                _ => return,
            };
            self.0.lock().unwrap().push(label);
        }
    }

    fn repo() -> Arc<MockFileSystem> {
        let fs = MockFileSystem::with_root(PathBuf::from("/repo"));
        fs.add_file("web/Dockerfile", "FROM nginx\n");
        fs.add_file(
            "k8s/web.yaml",
            "apiVersion: v1\nkind: Pod\nmetadata:\n  name: web\nspec:\n  containers:\n  - image: web\n",
        );
        Arc::new(fs)
    }

    #[test]
    fn test_project_root_follows_links() {
        let fs = repo();
        fs.add_symlink("/work", "/repo");

        let orchestrator = PipelineOrchestrator::new(InitConfig::new("/work")).with_fs(fs.clone());
        assert_eq!(orchestrator.project_root().unwrap(), PathBuf::from("/repo"));

        let missing = PipelineOrchestrator::new(InitConfig::new("/elsewhere")).with_fs(fs.clone());
        assert!(missing.project_root().is_err());

        let file = PipelineOrchestrator::new(InitConfig::new("/repo/web/Dockerfile")).with_fs(fs);
        assert!(file.project_root().is_err());
    }

    #[tokio::test]
    async fn test_phase_order() {
        let recorder = Arc::new(Recorder::default());
        PipelineOrchestrator::new(InitConfig::new("/repo"))
            .with_fs(repo())
            .with_progress(recorder.clone())
            .execute()
            .await
            .unwrap();

        assert_eq!(
            *recorder.0.lock().unwrap(),
            vec!["ScanPhase", "DetectPhase", "ResolvePhase", "EmitPhase", "completed"]
        );
    }

    #[tokio::test]
    async fn test_analyze_phase_order() {
        let recorder = Arc::new(Recorder::default());
        let mut config = InitConfig::new("/repo");
        config.analyze = true;
        let outcome = PipelineOrchestrator::new(config)
            .with_fs(repo())
            .with_progress(recorder.clone())
            .execute()
            .await
            .unwrap();

        assert!(matches!(outcome, InitOutcome::Analysis(_)));
        assert_eq!(
            *recorder.0.lock().unwrap(),
            vec!["ScanPhase", "DetectPhase", "AnalyzePhase", "completed"]
        );
    }

    #[tokio::test]
    async fn test_existing_target_fails_before_scan() {
        let fs = repo();
        fs.add_file("pipegen.yaml", "apiVersion: pipegen/v1\n");
        let recorder = Arc::new(Recorder::default());

        let err = PipelineOrchestrator::new(InitConfig::new("/repo"))
            .with_fs(fs)
            .with_progress(recorder.clone())
            .execute()
            .await
            .unwrap_err();

        assert!(matches!(err, InitError::WouldOverwrite(_)));
        assert_eq!(*recorder.0.lock().unwrap(), vec!["failed"]);
    }

    #[tokio::test]
    async fn test_missing_root() {
        let err = PipelineOrchestrator::new(InitConfig::new("/nowhere"))
            .with_fs(repo())
            .with_progress(Arc::new(NoOpHandler))
            .execute()
            .await
            .unwrap_err();
        assert_eq!(err.exit_code(), 1);
    }
}
