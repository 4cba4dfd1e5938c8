//! Kubernetes manifest detection

use pipegen_core::ManifestResource;
use serde::Deserialize;
use serde_yaml::Value;
use std::path::Path;
use tracing::debug;

pub const FAMILY: &str = "Kubernetes manifest";

const WORKLOAD_KINDS: &[&str] = &[
    "CronJob",
    "DaemonSet",
    "Deployment",
    "Job",
    "Pod",
    "ReplicaSet",
    "ReplicationController",
    "StatefulSet",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestProbe {
    NotManifest,
    Resources(Vec<ManifestResource>),
    Unusable(String),
}

pub fn claims(file_name: &str) -> bool {
    let lower = file_name.to_lowercase();
    lower.ends_with(".yaml") || lower.ends_with(".yml")
}

fn looks_like_kubernetes(content: &str) -> bool {
    content.contains("apiVersion") && content.contains("kind")
}

pub fn probe(path: &Path, content: &str) -> ManifestProbe {
    let mut resources = Vec::new();

    for (idx, document) in serde_yaml::Deserializer::from_str(content).enumerate() {
        let value = match Value::deserialize(document) {
            Ok(value) => value,
            Err(e) if looks_like_kubernetes(content) => {
                return ManifestProbe::Unusable(format!("invalid YAML: {}", e));
            }
            Err(_) => return ManifestProbe::NotManifest,
        };
        collect(path, &value, &idx.to_string(), &mut resources);
    }

    if resources.is_empty() {
        ManifestProbe::NotManifest
    } else {
        debug!(path = %path.display(), resources = resources.len(), "Kubernetes manifest detected");
        ManifestProbe::Resources(resources)
    }
}

fn collect(path: &Path, doc: &Value, index: &str, out: &mut Vec<ManifestResource>) {
    let (Some(_), Some(kind)) = (
        doc.get("apiVersion").and_then(Value::as_str),
        doc.get("kind").and_then(Value::as_str),
    ) else {
        return;
    };

    if kind == "List" || kind.ends_with("List") {
        if let Some(items) = doc.get("items").and_then(Value::as_sequence) {
            for (item_idx, item) in items.iter().enumerate() {
                collect(path, item, &format!("{}-{}", index, item_idx), out);
            }
        }
        return;
    }

    let name = doc
        .get("metadata")
        .and_then(|m| m.get("name"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("{}-{}", kind.to_lowercase(), index));

    let workload = WORKLOAD_KINDS.contains(&kind);
    let images = if workload {
        pod_spec(doc, kind).map(container_images).unwrap_or_default()
    } else {
        Vec::new()
    };

    out.push(ManifestResource {
        path: path.to_path_buf(),
        name,
        kind: kind.to_string(),
        images,
        workload,
        ports: Vec::new(),
    });
}

/// Where the pod spec lives for each workload kind.
fn pod_spec<'a>(doc: &'a Value, kind: &str) -> Option<&'a Value> {
    let spec = doc.get("spec")?;
    match kind {
        "Pod" => Some(spec),
        "CronJob" => spec.get("jobTemplate")?.get("spec")?.get("template")?.get("spec"),
        _ => spec.get("template")?.get("spec"),
    }
}

fn container_images(pod_spec: &Value) -> Vec<String> {
    ["initContainers", "containers"]
        .iter()
        .filter_map(|slot| pod_spec.get(*slot).and_then(Value::as_sequence))
        .flatten()
        .filter_map(|c| c.get("image").and_then(Value::as_str))
        .filter(|image| !image.trim().is_empty())
        .map(|image| image.trim().to_string())
        .collect()
}
