use crate::config::ConfigError;
use std::path::PathBuf;
use thiserror::Error;

/// Outcomes of an init run the caller must be able to tell apart.
#[derive(Debug, Error)]
pub enum InitError {
    #[error("No builders or Kubernetes manifests detected under {}", .0.display())]
    NothingDetected(PathBuf),

    #[error("{} already exists; use --force to overwrite it", .0.display())]
    WouldOverwrite(PathBuf),

    #[error("Unable to choose a builder for image {image}: several candidates match and no interactive prompt is available")]
    AmbiguityUnresolved { image: String },

    #[error("Image {image} is declared by more than one builder: {}", format_paths(.paths))]
    ConflictingBuilders { image: String, paths: Vec<PathBuf> },

    #[error("Conflicting flags: {0}")]
    ConflictingFlags(String),

    #[error("Invalid artifact override: {0}")]
    InvalidArtifact(String),

    #[error("Initialization cancelled")]
    Cancelled,

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization failed: {0}")]
    Serialization(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

fn format_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl InitError {
    /// Process exit code reported by the CLI for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            InitError::ConflictingFlags(_)
            | InitError::InvalidArtifact(_)
            | InitError::Config(_) => 2,
            InitError::NothingDetected(_) => 3,
            InitError::WouldOverwrite(_) => 4,
            InitError::AmbiguityUnresolved { .. } => 5,
            InitError::ConflictingBuilders { .. } => 6,
            InitError::Cancelled => 130,
            InitError::Io { .. } | InitError::Serialization(_) | InitError::Internal(_) => 1,
        }
    }

    /// Actionable hint printed under the error message, when there is one.
    pub fn help_message(&self) -> Option<String> {
        match self {
            InitError::NothingDetected(_) => Some(
                "Add a Dockerfile or Kubernetes manifest, pass --artifact/--kubernetes-manifest explicitly, or enable more builders with --XXenableJibInit / --XXenableBuildpacksInit"
                    .to_string(),
            ),
            InitError::WouldOverwrite(path) => Some(format!(
                "Pass --force to replace {} or choose another target with --filename",
                path.display()
            )),
            InitError::AmbiguityUnresolved { image } => Some(format!(
                "Run interactively, pass --force for a deterministic choice, or declare the builder with --artifact <path>={}",
                image
            )),
            InitError::ConflictingBuilders { image, paths } => {
                let first = paths
                    .first()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default();
                Some(format!(
                    "Supply an explicit artifact such as --artifact {}={} or pass --force to keep the first builder",
                    first, image
                ))
            }
            _ => None,
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        InitError::Io {
            path: path.into(),
            source,
        }
    }
}
