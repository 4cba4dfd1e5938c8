//! Builder detectors: one per build-descriptor family.
//!
//! The set is closed; dispatch is a `match` on [`BuilderDetector`].

pub mod buildpacks;
pub mod docker;
pub mod jib;

use pipegen_core::{ArtifactOverride, BuilderArtifact, BuilderKind, Origin, OverrideKind};
use std::path::Path;

/// Result of offering one file to one detector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Probe {
    NoMatch,
    Artifact(BuilderArtifact),
    /// The file has this detector's signature but cannot be used
    Unusable(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuilderDetector {
    Docker,
    Jib,
    Buildpacks { default_builder: String },
}

impl BuilderDetector {
    pub fn family(&self) -> &'static str {
        match self {
            BuilderDetector::Docker => "Docker",
            BuilderDetector::Jib => "Jib",
            BuilderDetector::Buildpacks { .. } => "Buildpacks",
        }
    }

    /// Cheap file-name check run before anything is read.
    pub fn claims(&self, file_name: &str) -> bool {
        match self {
            BuilderDetector::Docker => docker::claims(file_name),
            BuilderDetector::Jib => jib::claims(file_name),
            BuilderDetector::Buildpacks { .. } => buildpacks::claims(file_name),
        }
    }

    pub fn probe(&self, path: &Path, content: &str) -> Probe {
        let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        if !self.claims(file_name) {
            return Probe::NoMatch;
        }

        match self {
            BuilderDetector::Docker => docker::probe(path, content),
            BuilderDetector::Jib => jib::probe(path, content),
            BuilderDetector::Buildpacks { default_builder } => {
                buildpacks::probe(path, content, default_builder)
            }
        }
    }
}

/// Turn a user-declared override into an artifact, anchored at `root`.
pub fn explicit_artifact(
    artifact: &ArtifactOverride,
    root: &Path,
    default_builder: &str,
) -> BuilderArtifact {
    let path = if artifact.path.is_absolute() {
        artifact.path.clone()
    } else {
        root.join(&artifact.path)
    };

    let kind = match artifact.kind {
        OverrideKind::Docker => BuilderKind::Docker {
            dockerfile: path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| "Dockerfile".to_string()),
        },
        OverrideKind::JibMaven => BuilderKind::JibMaven {
            project: artifact.project.clone(),
        },
        OverrideKind::JibGradle => BuilderKind::JibGradle {
            project: artifact.project.clone(),
        },
        OverrideKind::Buildpacks => BuilderKind::Buildpacks {
            builder: default_builder.to_string(),
        },
    };

    let mut built = BuilderArtifact::detected(path, kind, Some(artifact.image.clone()));
    built.origin = Origin::Explicit;
    built
}
