use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const API_VERSION: &str = "pipegen/v1";
pub const KIND: &str = "Config";

/// The generated pipeline file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineConfig {
    pub api_version: String,
    pub kind: String,
    pub metadata: ConfigMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<BuildConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deploy: Option<DeployConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigMetadata {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BuildConfig {
    pub artifacts: Vec<ArtifactConfig>,
}

/// One build stanza; exactly one of the builder sections is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactConfig {
    pub image: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docker: Option<DockerArtifact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jib: Option<JibArtifact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buildpacks: Option<BuildpacksArtifact>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DockerArtifact {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dockerfile: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JibArtifact {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildpacksArtifact {
    pub builder: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DeployConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubectl: Option<KubectlDeploy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compose: Option<ComposeDeploy>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct KubectlDeploy {
    pub manifests: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComposeDeploy {
    pub file: String,
}

impl PipelineConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ConfigMetadata { name: name.into() },
            build: None,
            deploy: None,
        }
    }

    pub fn artifacts(&self) -> &[ArtifactConfig] {
        self.build
            .as_ref()
            .map(|b| b.artifacts.as_slice())
            .unwrap_or(&[])
    }

    pub fn manifests(&self) -> &[String] {
        self.deploy
            .as_ref()
            .and_then(|d| d.kubectl.as_ref())
            .map(|k| k.manifests.as_slice())
            .unwrap_or(&[])
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize PipelineConfig to YAML")
    }
}

impl fmt::Display for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_yaml() {
            Ok(yaml) => write!(f, "{}", yaml),
            Err(e) => write!(f, "Error formatting PipelineConfig: {}", e),
        }
    }
}

/// Analyze mode output: raw detections, no resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AnalysisReport {
    pub builders: Vec<BuilderEntry>,
    pub images: Vec<ImageEntry>,
    pub manifests: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conflicts: Vec<ConflictEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub findings: Vec<FindingEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuilderEntry {
    pub path: String,
    pub builder: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub context: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageEntry {
    pub name: String,
    /// A builder declares or infers this image
    pub found_match: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictEntry {
    pub image: String,
    pub paths: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindingEntry {
    pub path: String,
    pub message: String,
}

impl AnalysisReport {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize analysis to JSON")
    }
}

/// What a generating run decided, alongside the config itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct InitReport {
    pub pairings: Vec<PairingEntry>,
    pub unresolved: Vec<String>,
    pub unpaired: Vec<String>,
    pub conflicts: Vec<ConflictEntry>,
    pub findings: Vec<FindingEntry>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairingEntry {
    pub path: String,
    pub image: String,
}

impl InitReport {
    pub fn is_clean(&self) -> bool {
        self.unresolved.is_empty()
            && self.unpaired.is_empty()
            && self.conflicts.is_empty()
            && self.findings.is_empty()
            && self.warnings.is_empty()
    }
}
