use super::relative_to;
use crate::pipeline::context::{InitContext, ScanResult};
use crate::pipeline::phase_trait::WorkflowPhase;
use crate::pipeline::walker::{ExclusionRules, Walk};
use anyhow::anyhow;
use async_trait::async_trait;
use glob::Pattern;
use pipegen_core::{ConfigError, FileSystem, Finding, InitError, ProgressEvent};
use pipegen_stack::manifest::{self, ManifestProbe};
use pipegen_stack::{Classification, DetectorSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// `--kubernetes-manifest` patterns, matched against root-relative paths.
#[derive(Debug, Clone, Default)]
pub struct ManifestPatterns(Vec<Pattern>);

impl ManifestPatterns {
    pub fn new(raw: &[String]) -> Result<Self, InitError> {
        raw.iter()
            .map(|p| {
                Pattern::new(p).map_err(|e| {
                    ConfigError::ValidationFailed(format!(
                        "Invalid manifest pattern '{}': {}",
                        p, e
                    ))
                    .into()
                })
            })
            .collect::<Result<Vec<_>, InitError>>()
            .map(Self)
    }

    pub fn matches(&self, root: &Path, path: &Path) -> bool {
        let rel = relative_to(root, path);
        self.0
            .iter()
            .any(|p| p.matches(&rel) || p.matches_path(path))
    }
}

/// Everything a detection task needs, shared read-only across tasks.
struct Inspector {
    fs: Arc<dyn FileSystem>,
    detectors: DetectorSet,
    manifests: ManifestPatterns,
    root: PathBuf,
    max_file_size: u64,
}

impl Inspector {
    fn inspect(&self, path: &Path) -> Classification {
        match self.fs.metadata(path) {
            Ok(meta) if meta.len() > self.max_file_size => {
                warn!(path = %path.display(), size = meta.len(), "File exceeds size limit, skipping");
                return Classification {
                    findings: vec![Finding::TooLarge {
                        path: path.to_path_buf(),
                        size: meta.len(),
                    }],
                    ..Default::default()
                };
            }
            Ok(_) => {}
            Err(e) => return unreadable(path, e),
        }

        let content = match self.fs.read_to_string(path) {
            Ok(content) => content,
            Err(e) => return unreadable(path, e),
        };

        let mut result = self.detectors.classify(path, &content);
        if self.manifests.matches(&self.root, path) {
            match manifest::probe(path, &content) {
                ManifestProbe::Resources(resources) => result.resources.extend(resources),
                ManifestProbe::Unusable(reason) => result.findings.push(Finding::Unusable {
                    path: path.to_path_buf(),
                    kind: manifest::FAMILY.to_string(),
                    reason,
                }),
                ManifestProbe::NotManifest => {
                    debug!(path = %path.display(), "Explicit manifest has no Kubernetes documents")
                }
            }
        }
        result
    }
}

fn unreadable(path: &Path, error: anyhow::Error) -> Classification {
    warn!(path = %path.display(), error = %error, "Failed to read file");
    Classification {
        findings: vec![Finding::Unreadable {
            path: path.to_path_buf(),
            reason: error.to_string(),
        }],
        ..Default::default()
    }
}

pub struct ScanPhase;

#[async_trait]
impl WorkflowPhase for ScanPhase {
    fn name(&self) -> &'static str {
        "ScanPhase"
    }

    async fn execute(&self, context: &mut InitContext) -> Result<(), InitError> {
        let start = Instant::now();
        context.check_cancelled()?;

        let config = &context.config;
        let manifests = if config.skip_deploy {
            ManifestPatterns::default()
        } else {
            ManifestPatterns::new(&config.cli_kubernetes_manifests)?
        };
        let inspector = Arc::new(Inspector {
            fs: context.fs.clone(),
            detectors: DetectorSet::from_config(config),
            manifests,
            root: config.root.clone(),
            max_file_size: config.settings.max_file_size_bytes,
        });
        let rules = ExclusionRules::from_config(config)?;
        let max_depth = config.settings.max_depth;
        let concurrency = config.settings.scan_concurrency;

        info!(
            root = %config.root.display(),
            max_depth,
            concurrency,
            "Starting filesystem scan"
        );

        let walker = inspector.clone();
        let cancel = context.cancel.clone();
        let (candidates, mut findings, files_scanned) = tokio::task::spawn_blocking(move || -> Result<_, InitError> {
            let mut candidates = Vec::new();
            let mut findings = Vec::new();
            let mut files = 0usize;

            for item in Walk::new(walker.fs.as_ref(), &walker.root, rules, max_depth)? {
                if cancel.is_cancelled() {
                    return Err(InitError::Cancelled);
                }
                match item {
                    Ok(path) => {
                        files += 1;
                        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
                        if walker.detectors.is_candidate(name)
                            || walker.manifests.matches(&walker.root, &path)
                        {
                            candidates.push(path);
                        }
                    }
                    Err(finding) => findings.push(finding),
                }
            }
            Ok((candidates, findings, files))
        })
        .await
        .map_err(|e| anyhow!("Filesystem walk panicked: {}", e))??;

        debug!(
            files_scanned,
            candidates = candidates.len(),
            "Walk finished, running detectors"
        );

        let semaphore = Arc::new(Semaphore::new(concurrency));
        let mut join_set = JoinSet::new();
        for path in candidates {
            let inspector = inspector.clone();
            let semaphore = semaphore.clone();
            let cancel = context.cancel.clone();

            join_set.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| anyhow!("Scan semaphore closed: {}", e))?;
                if cancel.is_cancelled() {
                    return Err(InitError::Cancelled);
                }
                tokio::task::spawn_blocking(move || inspector.inspect(&path))
                    .await
                    .map_err(|e| InitError::from(anyhow!("Detection task panicked: {}", e)))
            });
        }

        let mut result = ScanResult {
            files_scanned,
            ..Default::default()
        };
        loop {
            let joined = tokio::select! {
                biased;
                _ = context.cancel.cancelled() => {
                    join_set.abort_all();
                    return Err(InitError::Cancelled);
                }
                joined = join_set.join_next() => joined,
            };
            let Some(joined) = joined else { break };

            let classification = match joined {
                Ok(Ok(classification)) => classification,
                Ok(Err(e)) => {
                    join_set.abort_all();
                    return Err(e);
                }
                Err(e) => {
                    join_set.abort_all();
                    return Err(anyhow!("Detection task failed: {}", e).into());
                }
            };
            result.builders.extend(classification.builder);
            result.resources.extend(classification.resources);
            findings.extend(classification.findings);
        }
        context.check_cancelled()?;

        result.builders.sort_by(|a, b| a.path.cmp(&b.path));
        result
            .resources
            .sort_by(|a, b| (&a.path, &a.name).cmp(&(&b.path, &b.name)));
        findings.sort_by(|a, b| a.path().cmp(b.path()));
        result.findings = findings;
        result.scan_time = start.elapsed();

        info!(
            files_scanned = result.files_scanned,
            builders = result.builders.len(),
            resources = result.resources.len(),
            findings = result.findings.len(),
            scan_time_ms = result.scan_time.as_millis(),
            "Scan complete"
        );
        context.progress.on_progress(&ProgressEvent::ScanComplete {
            files_scanned: result.files_scanned,
            builders: result.builders.len(),
            resources: result.resources.len(),
            findings: result.findings.len(),
            scan_time: result.scan_time,
        });

        context.scan = Some(result);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interaction::NoInteraction;
    use pipegen_core::{cancel_pair, CancelSignal, InitConfig, MockFileSystem, NoOpHandler};

    fn context(fs: MockFileSystem, config: InitConfig, cancel: CancelSignal) -> InitContext {
        InitContext::new(
            config,
            Arc::new(fs),
            cancel,
            Arc::new(NoOpHandler),
            Box::new(NoInteraction),
        )
    }

    fn repo() -> MockFileSystem {
        let fs = MockFileSystem::with_root(PathBuf::from("/repo"));
        fs.add_file("web/Dockerfile", "FROM nginx\nCOPY . /usr/share/nginx/html\n");
        fs.add_file("api/Dockerfile", "FROM golang:1.22\nRUN go build\n");
        fs.add_file(
            "k8s/web.yaml",
            "apiVersion: v1\nkind: Pod\nmetadata:\n  name: web\nspec:\n  containers:\n  - image: web\n",
        );
        fs.add_file("broken/Dockerfile", "this is not a dockerfile\n");
        fs.add_file("docs/index.md", "# docs");
        fs
    }

    #[tokio::test]
    async fn test_scan_collects_sorted_results() {
        let mut ctx = context(repo(), InitConfig::new("/repo"), CancelSignal::never());
        ScanPhase.execute(&mut ctx).await.unwrap();

        let scan = ctx.scan.unwrap();
        assert_eq!(scan.files_scanned, 5);
        let paths: Vec<_> = scan.builders.iter().map(|b| b.path.clone()).collect();
        assert_eq!(
            paths,
            vec![
                PathBuf::from("/repo/api/Dockerfile"),
                PathBuf::from("/repo/web/Dockerfile")
            ]
        );
        assert_eq!(scan.resources.len(), 1);
        assert!(matches!(
            scan.findings.as_slice(),
            [Finding::Unusable { path, .. }] if path == Path::new("/repo/broken/Dockerfile")
        ));
    }

    #[tokio::test]
    async fn test_scan_is_identical_with_one_worker() {
        let mut wide = InitConfig::new("/repo");
        wide.settings.scan_concurrency = 16;
        let mut narrow = InitConfig::new("/repo");
        narrow.settings.scan_concurrency = 1;

        let mut a = context(repo(), wide, CancelSignal::never());
        let mut b = context(repo(), narrow, CancelSignal::never());
        ScanPhase.execute(&mut a).await.unwrap();
        ScanPhase.execute(&mut b).await.unwrap();

        let (a, b) = (a.scan.unwrap(), b.scan.unwrap());
        assert_eq!(a.builders, b.builders);
        assert_eq!(a.resources, b.resources);
        assert_eq!(a.findings, b.findings);
    }

    #[tokio::test]
    async fn test_oversized_file_is_reported() {
        let fs = MockFileSystem::with_root(PathBuf::from("/repo"));
        fs.add_file("Dockerfile", &format!("FROM alpine\n# {}\n", "x".repeat(4096)));
        let mut config = InitConfig::new("/repo");
        config.settings.max_file_size_bytes = 1024;

        let mut ctx = context(fs, config, CancelSignal::never());
        ScanPhase.execute(&mut ctx).await.unwrap();

        let scan = ctx.scan.unwrap();
        assert!(scan.builders.is_empty());
        assert!(matches!(scan.findings.as_slice(), [Finding::TooLarge { .. }]));
    }

    #[tokio::test]
    async fn test_explicit_manifest_patterns() {
        let fs = repo();
        fs.add_file(
            "deploy/app.json.yaml.tpl",
            "apiVersion: v1\nkind: Pod\nspec:\n  containers:\n  - image: api\n",
        );
        let mut config = InitConfig::new("/repo");
        config.cli_kubernetes_manifests = vec!["deploy/*".to_string()];

        let mut ctx = context(fs, config, CancelSignal::never());
        ScanPhase.execute(&mut ctx).await.unwrap();

        let scan = ctx.scan.unwrap();
        assert_eq!(scan.resources.len(), 1);
        assert_eq!(scan.resources[0].images, vec!["api"]);
    }

    #[tokio::test]
    async fn test_skip_deploy_ignores_manifest_patterns() {
        let mut config = InitConfig::new("/repo");
        config.skip_deploy = true;
        config.cli_kubernetes_manifests = vec!["k8s/*.yaml".to_string()];

        let mut ctx = context(repo(), config, CancelSignal::never());
        ScanPhase.execute(&mut ctx).await.unwrap();

        let scan = ctx.scan.unwrap();
        assert!(scan.resources.is_empty());
        assert_eq!(scan.builders.len(), 2);
    }

    #[tokio::test]
    async fn test_compose_mode_only_looks_for_manifests() {
        let fs = repo();
        fs.add_file("docker-compose.yml", "services:\n  web:\n    build: ./web\n");
        let mut config = InitConfig::new("/repo");
        config.compose_file = Some(PathBuf::from("docker-compose.yml"));

        let mut ctx = context(fs, config, CancelSignal::never());
        ScanPhase.execute(&mut ctx).await.unwrap();

        let scan = ctx.scan.unwrap();
        assert!(scan.builders.is_empty());
        assert_eq!(scan.resources.len(), 1);
        assert_eq!(scan.resources[0].path, Path::new("/repo/k8s/web.yaml"));
    }

    #[tokio::test]
    async fn test_cancelled_scan() {
        let (handle, signal) = cancel_pair();
        handle.cancel();
        let mut ctx = context(repo(), InitConfig::new("/repo"), signal);

        assert!(matches!(
            ScanPhase.execute(&mut ctx).await,
            Err(InitError::Cancelled)
        ));
        assert!(ctx.scan.is_none());
    }

    #[test]
    fn test_manifest_patterns() {
        let patterns = ManifestPatterns::new(&["k8s/*.yaml".to_string()]).unwrap();
        let root = Path::new("/repo");
        assert!(patterns.matches(root, Path::new("/repo/k8s/web.yaml")));
        assert!(!patterns.matches(root, Path::new("/repo/other/web.yaml")));
        assert!(ManifestPatterns::new(&["[".to_string()]).is_err());
    }
}
