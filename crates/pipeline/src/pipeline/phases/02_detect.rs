use super::relative_to;
use crate::pipeline::context::{Detection, InitContext};
use crate::pipeline::phase_trait::WorkflowPhase;
use async_trait::async_trait;
use pipegen_core::{DeploySource, InitError};
use pipegen_stack::builder::buildpacks;
use pipegen_stack::{compose, explicit_artifact};
use std::collections::BTreeSet;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Turns raw scan results into one detection: buildpacks collapsed per
/// directory, the deploy source chosen, explicit artifacts merged in.
pub struct DetectPhase;

#[async_trait]
impl WorkflowPhase for DetectPhase {
    fn name(&self) -> &'static str {
        "DetectPhase"
    }

    async fn execute(&self, context: &mut InitContext) -> Result<(), InitError> {
        let scan = context.scan()?.clone();
        let config = &context.config;

        let mut builders = buildpacks::one_per_directory(scan.builders);
        let mut resources = scan.resources;
        let mut warnings = Vec::new();

        let (deploy_source, deploy_paths) = if let Some(compose_path) = config.compose_path() {
            let content = context.fs.read_to_string(&compose_path).map_err(|e| {
                e.context(format!(
                    "Failed to read compose file {}",
                    compose_path.display()
                ))
            })?;
            let import = compose::import(&compose_path, &content)?;
            info!(
                services = import.resources.len(),
                builders = import.artifacts.len(),
                "Imported compose file"
            );
            builders.extend(import.artifacts);

            if resources.is_empty() {
                resources = import.resources;
                (DeploySource::Compose, vec![compose_path])
            } else {
                let paths: BTreeSet<PathBuf> = resources.iter().map(|r| r.path.clone()).collect();
                warn!(
                    compose = %compose_path.display(),
                    manifests = paths.len(),
                    "Native Kubernetes manifests found, ignoring compose services"
                );
                warnings.push(format!(
                    "{}: native Kubernetes manifests found; deploying those instead of the compose services",
                    relative_to(&config.root, &compose_path)
                ));
                (DeploySource::Kubectl, paths.into_iter().collect())
            }
        } else if config.skip_deploy {
            resources.clear();
            (DeploySource::Skipped, Vec::new())
        } else if !config.cli_kubernetes_manifests.is_empty() {
            let patterns = config
                .cli_kubernetes_manifests
                .iter()
                .map(PathBuf::from)
                .collect();
            (DeploySource::Kubectl, patterns)
        } else {
            let paths: BTreeSet<PathBuf> = resources.iter().map(|r| r.path.clone()).collect();
            (DeploySource::Kubectl, paths.into_iter().collect())
        };

        for declared in config.artifact_overrides()? {
            let artifact = explicit_artifact(&declared, &config.root, &config.buildpacks_builder);
            debug!(
                path = %artifact.path.display(),
                image = ?artifact.image,
                "Explicit artifact"
            );
            builders.retain(|b| b.path != artifact.path);
            builders.push(artifact);
        }
        builders.sort_by(|a, b| a.path.cmp(&b.path));

        let images: BTreeSet<String> = resources
            .iter()
            .filter(|r| r.workload)
            .flat_map(|r| r.images.iter().cloned())
            .collect();

        let detection = Detection {
            builders,
            resources,
            images: images.into_iter().collect(),
            deploy_paths,
            deploy_source,
            findings: scan.findings,
            warnings,
        };

        if detection.is_empty() && !config.analyze {
            return Err(InitError::NothingDetected(config.root.clone()));
        }

        info!(
            builders = detection.builders.len(),
            images = detection.images.len(),
            manifests = detection.deploy_paths.len(),
            "Detection complete"
        );

        context.detection = Some(detection);
        Ok(())
    }
}
