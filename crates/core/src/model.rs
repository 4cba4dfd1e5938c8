//! Detection results shared by the detectors, the resolver and the emitter.

use serde::Serialize;
use std::path::{Path, PathBuf};

/// Closed set of builder families, each carrying what its descriptor told us.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum BuilderKind {
    Docker {
        /// Descriptor file name relative to the context
        dockerfile: String,
    },
    JibMaven {
        project: Option<String>,
    },
    JibGradle {
        project: Option<String>,
    },
    Buildpacks {
        builder: String,
    },
    ComposeService {
        service: String,
        dockerfile: Option<String>,
    },
}

impl BuilderKind {
    /// Human readable builder name, as used in analyze output and JSON overrides.
    pub fn name(&self) -> &'static str {
        match self {
            BuilderKind::Docker { .. } => "Docker",
            BuilderKind::JibMaven { .. } => "Jib Maven Plugin",
            BuilderKind::JibGradle { .. } => "Jib Gradle Plugin",
            BuilderKind::Buildpacks { .. } => "Buildpacks",
            BuilderKind::ComposeService { .. } => "Docker Compose",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Detected,
    Explicit,
}

/// A build descriptor that can produce a container image.
///
/// Identity is the absolute descriptor path. Never mutated after detection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuilderArtifact {
    pub path: PathBuf,
    pub kind: BuilderKind,
    pub image: Option<String>,
    pub context: PathBuf,
    pub origin: Origin,
}

impl BuilderArtifact {
    pub fn detected(path: PathBuf, kind: BuilderKind, image: Option<String>) -> Self {
        let context = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("/"));
        Self {
            path,
            kind,
            image,
            context,
            origin: Origin::Detected,
        }
    }

    pub fn with_context(mut self, context: PathBuf) -> Self {
        self.context = context;
        self
    }

    pub fn is_explicit(&self) -> bool {
        self.origin == Origin::Explicit
    }

    /// Image name implied by the layout: the context directory's name, lowercased.
    pub fn inferred_name(&self) -> Option<String> {
        self.context
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.to_lowercase())
    }

    /// Declared image, falling back to the inferred name.
    pub fn effective_image(&self) -> Option<String> {
        self.image.clone().or_else(|| self.inferred_name())
    }
}

/// One Kubernetes document (or synthesized compose service) worth deploying.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManifestResource {
    pub path: PathBuf,
    pub name: String,
    pub kind: String,
    pub images: Vec<String>,
    pub workload: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pairing {
    pub artifact: BuilderArtifact,
    pub image: String,
}

/// Two or more builders declaring the same image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Conflict {
    pub image: String,
    pub paths: Vec<PathBuf>,
}

/// Non-fatal observations collected during scanning and detection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "finding", rename_all = "camelCase")]
pub enum Finding {
    /// Matched a detector's signature but could not be parsed
    Unusable {
        path: PathBuf,
        kind: String,
        reason: String,
    },
    /// More than one detector family claimed the file
    KindDisagreement { path: PathBuf, kinds: Vec<String> },
    Unreadable { path: PathBuf, reason: String },
    TooLarge { path: PathBuf, size: u64 },
}

impl Finding {
    pub fn path(&self) -> &Path {
        match self {
            Finding::Unusable { path, .. }
            | Finding::KindDisagreement { path, .. }
            | Finding::Unreadable { path, .. }
            | Finding::TooLarge { path, .. } => path,
        }
    }
}

/// Which source decides what gets deployed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeploySource {
    #[default]
    Kubectl,
    Compose,
    Skipped,
}

/// Everything the resolver decided, handed to the emitter exactly once.
#[derive(Debug, Clone, Default)]
pub struct ResolutionSet {
    pub pairings: Vec<Pairing>,
    pub unpaired: Vec<BuilderArtifact>,
    pub unresolved: Vec<String>,
    /// Manifest paths (or raw patterns) for the deploy section
    pub deploy_paths: Vec<PathBuf>,
    pub deploy_source: DeploySource,
    pub conflicts: Vec<Conflict>,
    pub warnings: Vec<String>,
}

impl ResolutionSet {
    pub fn is_paired(&self, path: &Path) -> bool {
        self.pairings.iter().any(|p| p.artifact.path == path)
    }

    pub fn image_is_paired(&self, image: &str) -> bool {
        self.pairings.iter().any(|p| p.image == image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dockerfile(path: &str) -> BuilderArtifact {
        BuilderArtifact::detected(
            PathBuf::from(path),
            BuilderKind::Docker {
                dockerfile: "Dockerfile".to_string(),
            },
            None,
        )
    }

    #[test]
    fn test_context_defaults_to_parent() {
        let artifact = dockerfile("/repo/service/Dockerfile");
        assert_eq!(artifact.context, PathBuf::from("/repo/service"));
        assert_eq!(artifact.origin, Origin::Detected);
    }

    #[test]
    fn test_inferred_name_is_lowercased_dir() {
        let artifact = dockerfile("/repo/MyService/Dockerfile");
        assert_eq!(artifact.inferred_name().as_deref(), Some("myservice"));
        assert_eq!(artifact.effective_image().as_deref(), Some("myservice"));
    }

    #[test]
    fn test_declared_image_wins_over_inferred() {
        let mut artifact = dockerfile("/repo/web/Dockerfile");
        artifact.image = Some("gcr.io/p/frontend".to_string());
        assert_eq!(
            artifact.effective_image().as_deref(),
            Some("gcr.io/p/frontend")
        );
    }

    #[test]
    fn test_builder_names() {
        assert_eq!(
            BuilderKind::JibGradle { project: None }.name(),
            "Jib Gradle Plugin"
        );
        assert_eq!(
            BuilderKind::Buildpacks {
                builder: "heroku/buildpacks".to_string()
            }
            .name(),
            "Buildpacks"
        );
    }

    #[test]
    fn test_resolution_lookup() {
        let mut set = ResolutionSet::default();
        set.pairings.push(Pairing {
            artifact: dockerfile("/repo/a/Dockerfile"),
            image: "a".to_string(),
        });

        assert!(set.is_paired(Path::new("/repo/a/Dockerfile")));
        assert!(!set.is_paired(Path::new("/repo/b/Dockerfile")));
        assert!(set.image_is_paired("a"));
    }
}
