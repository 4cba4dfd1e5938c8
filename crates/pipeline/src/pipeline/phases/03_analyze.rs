use super::resolve::find_conflicts;
use super::{describe_finding, relative_to};
use crate::pipeline::context::{Detection, InitContext, InitOutcome};
use crate::pipeline::phase_trait::WorkflowPhase;
use async_trait::async_trait;
use pipegen_core::output::schema::{BuilderEntry, ConflictEntry, FindingEntry, ImageEntry};
use pipegen_core::{AnalysisReport, InitError};
use pipegen_stack::ImageRef;
use std::path::Path;
use tracing::info;

/// Raw detections as data. Nothing is paired and nothing is written.
pub struct AnalyzePhase;

pub fn report(root: &Path, detection: &Detection) -> AnalysisReport {
    let builders = detection
        .builders
        .iter()
        .map(|b| {
            let context = relative_to(root, &b.context);
            BuilderEntry {
                path: relative_to(root, &b.path),
                builder: b.kind.name().to_string(),
                image: b.image.clone(),
                context: if context.is_empty() {
                    ".".to_string()
                } else {
                    context
                },
            }
        })
        .collect();

    let images = detection
        .images
        .iter()
        .map(|image| {
            let reference = ImageRef::parse(image);
            let found_match = detection.builders.iter().any(|b| match b.image.as_deref() {
                Some(declared) => reference.is_produced_by(declared),
                None => b.inferred_name().as_deref() == Some(reference.short_name()),
            });
            ImageEntry {
                name: image.clone(),
                found_match,
            }
        })
        .collect();

    let conflicts = find_conflicts(&detection.builders)
        .into_iter()
        .map(|c| ConflictEntry {
            image: c.image,
            paths: c.paths.iter().map(|p| relative_to(root, p)).collect(),
        })
        .collect();

    AnalysisReport {
        builders,
        images,
        manifests: detection
            .deploy_paths
            .iter()
            .map(|p| relative_to(root, p))
            .collect(),
        conflicts,
        findings: detection
            .findings
            .iter()
            .map(|f| FindingEntry {
                path: relative_to(root, f.path()),
                message: describe_finding(f),
            })
            .collect(),
    }
}

#[async_trait]
impl WorkflowPhase for AnalyzePhase {
    fn name(&self) -> &'static str {
        "AnalyzePhase"
    }

    async fn execute(&self, context: &mut InitContext) -> Result<(), InitError> {
        let analysis = report(&context.config.root, context.detection()?);
        info!(
            builders = analysis.builders.len(),
            images = analysis.images.len(),
            conflicts = analysis.conflicts.len(),
            "Analysis complete"
        );
        context.outcome = Some(InitOutcome::Analysis(analysis));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipegen_core::{BuilderArtifact, BuilderKind, DeploySource, Finding};
    use std::path::PathBuf;

    fn dockerfile(path: &str, image: Option<&str>) -> BuilderArtifact {
        BuilderArtifact::detected(
            PathBuf::from(path),
            BuilderKind::Docker {
                dockerfile: "Dockerfile".to_string(),
            },
            image.map(str::to_string),
        )
    }

    #[test]
    fn test_report_lists_everything_relative() {
        let detection = Detection {
            builders: vec![
                dockerfile("/repo/Dockerfile", None),
                dockerfile("/repo/a/Dockerfile", Some("gcr.io/p/web")),
                dockerfile("/repo/b/Dockerfile", Some("gcr.io/p/web")),
            ],
            images: vec!["gcr.io/p/web:1".to_string(), "redis".to_string()],
            deploy_paths: vec![PathBuf::from("/repo/k8s/web.yaml")],
            deploy_source: DeploySource::Kubectl,
            findings: vec![Finding::TooLarge {
                path: PathBuf::from("/repo/big/Dockerfile"),
                size: 10_000_000,
            }],
            ..Default::default()
        };

        let report = report(Path::new("/repo"), &detection);

        assert_eq!(report.builders[0].path, "Dockerfile");
        assert_eq!(report.builders[0].context, ".");
        assert_eq!(report.builders[1].context, "a");
        assert!(report.images[0].found_match);
        assert!(!report.images[1].found_match);
        assert_eq!(report.manifests, vec!["k8s/web.yaml"]);
        assert_eq!(report.conflicts.len(), 1);
        assert_eq!(report.conflicts[0].paths, vec!["a/Dockerfile", "b/Dockerfile"]);
        assert_eq!(report.findings[0].path, "big/Dockerfile");
        assert!(report.findings[0].message.contains("size limit"));
    }
}
