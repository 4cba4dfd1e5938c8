//! Buildpacks project detection

use super::Probe;
use pipegen_core::{BuilderArtifact, BuilderKind};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Descriptor that may pin a builder under `[io.buildpacks]`
pub const PROJECT_DESCRIPTOR: &str = "project.toml";

const DESCRIPTORS: &[&str] = &[
    "go.mod",
    "package.json",
    "Pipfile",
    PROJECT_DESCRIPTOR,
    "pyproject.toml",
    "requirements.txt",
];

pub fn claims(file_name: &str) -> bool {
    DESCRIPTORS.contains(&file_name)
}

pub fn probe(path: &Path, content: &str, default_builder: &str) -> Probe {
    let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();

    let builder = match file_name {
        "package.json" => match serde_json::from_str::<serde_json::Value>(content) {
            Ok(value) if value.is_object() => None,
            Ok(_) => return Probe::Unusable("package.json is not a JSON object".to_string()),
            Err(e) => return Probe::Unusable(format!("invalid package.json: {}", e)),
        },
        "go.mod" => {
            if !content
                .lines()
                .any(|l| l.trim_start().starts_with("module "))
            {
                return Probe::Unusable("go.mod has no module directive".to_string());
            }
            None
        }
        "pyproject.toml" | PROJECT_DESCRIPTOR => match content.parse::<toml::Table>() {
            Ok(table) => project_builder(&table),
            Err(e) => return Probe::Unusable(format!("invalid {}: {}", file_name, e)),
        },
        "requirements.txt" | "Pipfile" => None,
        _ => return Probe::NoMatch,
    };

    let builder = builder.unwrap_or_else(|| default_builder.to_string());
    Probe::Artifact(BuilderArtifact::detected(
        path.to_path_buf(),
        BuilderKind::Buildpacks { builder },
        None,
    ))
}

fn project_builder(table: &toml::Table) -> Option<String> {
    table
        .get("io")?
        .get("buildpacks")?
        .get("builder")?
        .as_str()
        .map(str::to_string)
}

/// Keep one buildpacks artifact per directory.
///
/// The lexicographically first descriptor wins; a builder pinned by a sibling
/// `project.toml` is carried over to it. Other builder kinds pass through.
pub fn one_per_directory(artifacts: Vec<BuilderArtifact>) -> Vec<BuilderArtifact> {
    let mut by_dir: BTreeMap<PathBuf, Vec<BuilderArtifact>> = BTreeMap::new();
    let mut result = Vec::new();

    for artifact in artifacts {
        match artifact.kind {
            BuilderKind::Buildpacks { .. } if !artifact.is_explicit() => by_dir
                .entry(artifact.context.clone())
                .or_default()
                .push(artifact),
            _ => result.push(artifact),
        }
    }

    for (_, mut group) in by_dir {
        group.sort_by(|a, b| a.path.cmp(&b.path));
        let pinned = group
            .iter()
            .find(|a| a.path.file_name().and_then(|n| n.to_str()) == Some(PROJECT_DESCRIPTOR))
            .map(|a| a.kind.clone());

        let mut keep = group.swap_remove(0);
        if let Some(kind) = pinned {
            keep.kind = kind;
        }
        result.push(keep);
    }

    result.sort_by(|a, b| a.path.cmp(&b.path));
    result
}
