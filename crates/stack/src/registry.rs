use crate::builder::{BuilderDetector, Probe};
use crate::manifest::{self, ManifestProbe};
use pipegen_core::{BuilderArtifact, Finding, InitConfig, ManifestResource};
use std::path::Path;
use tracing::warn;

/// What one file turned out to be.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    pub builder: Option<BuilderArtifact>,
    pub resources: Vec<ManifestResource>,
    pub findings: Vec<Finding>,
}

impl Classification {
    pub fn is_empty(&self) -> bool {
        self.builder.is_none() && self.resources.is_empty() && self.findings.is_empty()
    }
}

enum Claim {
    Builder(&'static str, Probe),
    Manifest(ManifestProbe),
}

impl Claim {
    fn family(&self) -> &'static str {
        match self {
            Claim::Builder(family, _) => *family,
            Claim::Manifest(_) => manifest::FAMILY,
        }
    }
}

/// The detectors enabled for one run, in priority order.
#[derive(Debug, Clone)]
pub struct DetectorSet {
    builders: Vec<BuilderDetector>,
    manifests: bool,
}

impl DetectorSet {
    pub fn new(builders: Vec<BuilderDetector>, manifests: bool) -> Self {
        Self {
            builders,
            manifests,
        }
    }

    /// Docker always; Jib and Buildpacks behind their gates. Manifest
    /// detection is off when deploy is skipped or explicit manifests are
    /// given. With a compose file the builders come from compose, so only
    /// native manifests are looked for.
    pub fn from_config(config: &InitConfig) -> Self {
        if config.compose_file.is_some() {
            return Self::new(Vec::new(), true);
        }

        let mut builders = vec![BuilderDetector::Docker];
        if config.enable_jib_init {
            builders.push(BuilderDetector::Jib);
        }
        if config.enable_buildpacks_init {
            builders.push(BuilderDetector::Buildpacks {
                default_builder: config.buildpacks_builder.clone(),
            });
        }

        let manifests = !config.skip_deploy && config.cli_kubernetes_manifests.is_empty();

        Self::new(builders, manifests)
    }

    pub fn detects_manifests(&self) -> bool {
        self.manifests
    }

    pub fn builders(&self) -> &[BuilderDetector] {
        &self.builders
    }

    pub fn is_candidate(&self, file_name: &str) -> bool {
        self.builders.iter().any(|b| b.claims(file_name))
            || (self.manifests && manifest::claims(file_name))
    }

    /// Offer a file to every detector. Builders outrank manifests; when
    /// more than one family matches, the first wins and the disagreement is
    /// recorded.
    pub fn classify(&self, path: &Path, content: &str) -> Classification {
        let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();

        let mut claims: Vec<Claim> = self
            .builders
            .iter()
            .filter(|b| b.claims(file_name))
            .map(|b| Claim::Builder(b.family(), b.probe(path, content)))
            .filter(|c| !matches!(c, Claim::Builder(_, Probe::NoMatch)))
            .collect();

        if self.manifests && manifest::claims(file_name) {
            match manifest::probe(path, content) {
                ManifestProbe::NotManifest => {}
                probe => claims.push(Claim::Manifest(probe)),
            }
        }

        let mut result = Classification::default();
        if claims.len() > 1 {
            let kinds: Vec<String> = claims.iter().map(|c| c.family().to_string()).collect();
            warn!(path = %path.display(), kinds = ?kinds, "Detectors disagree about file kind");
            result.findings.push(Finding::KindDisagreement {
                path: path.to_path_buf(),
                kinds,
            });
        }

        let Some(winner) = claims.into_iter().next() else {
            return result;
        };
        let family = winner.family();
        match winner {
            Claim::Builder(_, Probe::Artifact(artifact)) => result.builder = Some(artifact),
            Claim::Manifest(ManifestProbe::Resources(resources)) => result.resources = resources,
            Claim::Builder(_, Probe::Unusable(reason))
            | Claim::Manifest(ManifestProbe::Unusable(reason)) => {
                warn!(path = %path.display(), kind = family, reason = %reason, "Found but unusable");
                result.findings.push(Finding::Unusable {
                    path: path.to_path_buf(),
                    kind: family.to_string(),
                    reason,
                });
            }
            Claim::Builder(_, Probe::NoMatch) | Claim::Manifest(ManifestProbe::NotManifest) => {}
        }
        result
    }
}
