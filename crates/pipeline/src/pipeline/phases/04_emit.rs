use super::{describe_finding, relative_to};
use crate::pipeline::context::{InitContext, InitOutcome};
use crate::pipeline::phase_trait::WorkflowPhase;
use async_trait::async_trait;
use pipegen_core::output::schema::{
    ArtifactConfig, BuildConfig, BuildpacksArtifact, ComposeDeploy, ConflictEntry, DeployConfig,
    DockerArtifact, FindingEntry, JibArtifact, KubectlDeploy, PairingEntry,
};
use pipegen_core::{
    BuilderArtifact, BuilderKind, DeploySource, Finding, InitConfig, InitError, InitReport,
    PipelineConfig, ResolutionSet,
};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const DEFAULT_DOCKERFILE: &str = "Dockerfile";

fn artifact_config(root: &Path, artifact: &BuilderArtifact, image: &str) -> ArtifactConfig {
    let context = relative_to(root, &artifact.context);
    let mut config = ArtifactConfig {
        image: image.to_string(),
        context: (!context.is_empty()).then_some(context),
        docker: None,
        jib: None,
        buildpacks: None,
    };

    let custom_dockerfile =
        |name: Option<&String>| name.filter(|n| *n != DEFAULT_DOCKERFILE).cloned();

    match &artifact.kind {
        BuilderKind::Docker { dockerfile } => {
            config.docker = Some(DockerArtifact {
                dockerfile: custom_dockerfile(Some(dockerfile)),
            })
        }
        BuilderKind::ComposeService { dockerfile, .. } => {
            config.docker = Some(DockerArtifact {
                dockerfile: custom_dockerfile(dockerfile.as_ref()),
            })
        }
        BuilderKind::JibMaven { project } => {
            config.jib = Some(JibArtifact {
                project: project.clone(),
                kind: "maven".to_string(),
            })
        }
        BuilderKind::JibGradle { project } => {
            config.jib = Some(JibArtifact {
                project: project.clone(),
                kind: "gradle".to_string(),
            })
        }
        BuilderKind::Buildpacks { builder } => {
            config.buildpacks = Some(BuildpacksArtifact {
                builder: builder.clone(),
            })
        }
    }
    config
}

/// Render the resolution as a pipeline config. Same input, same output.
pub fn pipeline_config(config: &InitConfig, set: &ResolutionSet) -> PipelineConfig {
    let root = &config.root;
    let name = root
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "project".to_string());
    let mut pipeline = PipelineConfig::new(name);

    if !config.skip_build {
        let mut entries: Vec<(&BuilderArtifact, String)> = set
            .pairings
            .iter()
            .map(|p| (&p.artifact, p.image.clone()))
            .collect();
        if config.skip_deploy {
            entries.extend(
                set.unpaired
                    .iter()
                    .filter_map(|b| b.effective_image().map(|image| (b, image))),
            );
        }
        entries.sort_by(|a, b| (&a.0.path, &a.1).cmp(&(&b.0.path, &b.1)));

        let artifacts: Vec<ArtifactConfig> = entries
            .iter()
            .map(|(artifact, image)| artifact_config(root, artifact, image))
            .collect();
        if !artifacts.is_empty() {
            pipeline.build = Some(BuildConfig { artifacts });
        }
    }

    if !config.skip_deploy {
        pipeline.deploy = match set.deploy_source {
            DeploySource::Kubectl => {
                let manifests: BTreeSet<String> = set
                    .deploy_paths
                    .iter()
                    .map(|p| relative_to(root, p))
                    .collect();
                (!manifests.is_empty()).then(|| DeployConfig {
                    kubectl: Some(KubectlDeploy {
                        manifests: manifests.into_iter().collect(),
                    }),
                    compose: None,
                })
            }
            DeploySource::Compose => set.deploy_paths.first().map(|file| DeployConfig {
                kubectl: None,
                compose: Some(ComposeDeploy {
                    file: relative_to(root, file),
                }),
            }),
            DeploySource::Skipped => None,
        };
    }

    pipeline
}

pub fn init_report(root: &Path, set: &ResolutionSet, findings: &[Finding]) -> InitReport {
    InitReport {
        pairings: set
            .pairings
            .iter()
            .map(|p| PairingEntry {
                path: relative_to(root, &p.artifact.path),
                image: p.image.clone(),
            })
            .collect(),
        unresolved: set.unresolved.clone(),
        unpaired: set
            .unpaired
            .iter()
            .map(|b| relative_to(root, &b.path))
            .collect(),
        conflicts: set
            .conflicts
            .iter()
            .map(|c| ConflictEntry {
                image: c.image.clone(),
                paths: c.paths.iter().map(|p| relative_to(root, p)).collect(),
            })
            .collect(),
        findings: findings
            .iter()
            .map(|f| FindingEntry {
                path: relative_to(root, f.path()),
                message: describe_finding(f),
            })
            .collect(),
        warnings: set.warnings.clone(),
    }
}

pub struct EmitPhase;

#[async_trait]
impl WorkflowPhase for EmitPhase {
    fn name(&self) -> &'static str {
        "EmitPhase"
    }

    async fn execute(&self, context: &mut InitContext) -> Result<(), InitError> {
        let set = context.take_resolution()?;
        let config = &context.config;
        let target = if config.writes_to_stdout() {
            PathBuf::from("-")
        } else {
            let target = config.target_path();
            if !config.force && context.fs.exists(&target) {
                return Err(InitError::WouldOverwrite(target));
            }
            target
        };

        let pipeline = pipeline_config(config, &set);
        let report = init_report(&config.root, &set, &context.detection()?.findings);

        debug!(target = %target.display(), "Pipeline config ready");
        info!(
            artifacts = pipeline.artifacts().len(),
            manifests = pipeline.manifests().len(),
            "Emitted pipeline config"
        );

        context.outcome = Some(InitOutcome::Generated {
            config: pipeline,
            report,
            target,
        });
        Ok(())
    }
}
