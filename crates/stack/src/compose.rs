//! Docker Compose import

use anyhow::{anyhow, Context, Result};
use pipegen_core::{BuilderArtifact, BuilderKind, ManifestResource};
use serde_yaml::Value;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Builders and deploy units derived from one compose file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComposeImport {
    pub artifacts: Vec<BuilderArtifact>,
    /// One per service with an image; only used when no native manifests exist
    pub resources: Vec<ManifestResource>,
}

pub fn import(path: &Path, content: &str) -> Result<ComposeImport> {
    let doc: Value = serde_yaml::from_str(content)
        .with_context(|| format!("Failed to parse compose file {:?}", path))?;
    let services = doc
        .get("services")
        .and_then(Value::as_mapping)
        .ok_or_else(|| anyhow!("Compose file {:?} has no services section", path))?;

    let base = path.parent().unwrap_or(Path::new("/"));

    let mut names: Vec<(&str, &Value)> = services
        .iter()
        .filter_map(|(name, service)| name.as_str().map(|n| (n, service)))
        .collect();
    names.sort_by(|a, b| a.0.cmp(b.0));

    let mut import = ComposeImport::default();
    for (name, service) in names {
        let declared = service
            .get("image")
            .and_then(Value::as_str)
            .map(str::to_string);

        let build = service.get("build").and_then(|b| build_context(base, b));
        let image = match (&declared, &build) {
            (Some(image), _) => Some(image.clone()),
            (None, Some(_)) => Some(name.to_string()),
            (None, None) => None,
        };

        if let Some((context, dockerfile)) = build {
            let descriptor = context.join(dockerfile.as_deref().unwrap_or("Dockerfile"));
            import.artifacts.push(
                BuilderArtifact::detected(
                    descriptor,
                    BuilderKind::ComposeService {
                        service: name.to_string(),
                        dockerfile,
                    },
                    image.clone(),
                )
                .with_context(context),
            );
        }

        match image {
            Some(image) => import.resources.push(ManifestResource {
                path: path.to_path_buf(),
                name: name.to_string(),
                kind: "ComposeService".to_string(),
                images: vec![image],
                workload: true,
                ports: ports(service),
            }),
            None => debug!(service = name, "Compose service has neither build nor image"),
        }
    }

    Ok(import)
}

/// `build: ./dir` or `build: { context: ./dir, dockerfile: Dockerfile.dev }`
fn build_context(base: &Path, build: &Value) -> Option<(PathBuf, Option<String>)> {
    match build {
        Value::String(context) => Some((normalize(&base.join(context)), None)),
        Value::Mapping(_) => {
            let context = build.get("context").and_then(Value::as_str).unwrap_or(".");
            let dockerfile = build
                .get("dockerfile")
                .and_then(Value::as_str)
                .map(str::to_string);
            Some((normalize(&base.join(context)), dockerfile))
        }
        _ => None,
    }
}

fn ports(service: &Value) -> Vec<String> {
    service
        .get("ports")
        .and_then(Value::as_sequence)
        .map(|seq| {
            seq.iter()
                .filter_map(|port| match port {
                    Value::String(s) => Some(s.clone()),
                    Value::Number(n) => Some(n.to_string()),
                    Value::Mapping(_) => {
                        let target = port.get("target").map(scalar)?;
                        match port.get("published").map(scalar) {
                            Some(published) => Some(format!("{}:{}", published, target)),
                            None => Some(target),
                        }
                    }
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default()
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim().to_string())
            .unwrap_or_default(),
    }
}

/// Lexically remove `.` and resolve `..` components.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const COMPOSE: &str = r#"
services:
  web:
    build: ./web
    ports:
      - "8080:80"
  api:
    build:
      context: ./services/api
      dockerfile: Dockerfile.prod
    image: gcr.io/proj/api
    ports:
      - target: 9000
        published: 9000
  redis:
    image: redis:7
  sidecar:
    environment:
      - A=1
"#;

    #[test]
    fn test_import_services() {
        let import = import(Path::new("/repo/docker-compose.yml"), COMPOSE).unwrap();

        assert_eq!(import.artifacts.len(), 2);
        let api = &import.artifacts[0];
        assert_eq!(api.path, PathBuf::from("/repo/services/api/Dockerfile.prod"));
        assert_eq!(api.context, PathBuf::from("/repo/services/api"));
        assert_eq!(api.image.as_deref(), Some("gcr.io/proj/api"));

        let web = &import.artifacts[1];
        assert_eq!(web.path, PathBuf::from("/repo/web/Dockerfile"));
        assert_eq!(web.image.as_deref(), Some("web"));
        assert_eq!(
            web.kind,
            BuilderKind::ComposeService {
                service: "web".to_string(),
                dockerfile: None
            }
        );
    }

    #[test]
    fn test_synthesized_resources() {
        let import = import(Path::new("/repo/docker-compose.yml"), COMPOSE).unwrap();
        let names: Vec<&str> = import.resources.iter().map(|r| r.name.as_str()).collect();

        assert_eq!(names, vec!["api", "redis", "web"]);
        assert_eq!(import.resources[0].ports, vec!["9000:9000"]);
        assert_eq!(import.resources[1].images, vec!["redis:7"]);
        assert_eq!(import.resources[2].ports, vec!["8080:80"]);
    }

    #[test]
    fn test_invalid_compose() {
        assert!(import(Path::new("/repo/c.yml"), "services: [").is_err());
        assert!(import(Path::new("/repo/c.yml"), "version: '3'\n").is_err());
    }

    #[test]
    fn test_normalize() {
        assert_eq!(
            normalize(Path::new("/repo/./a/../b")),
            PathBuf::from("/repo/b")
        );
    }
}
