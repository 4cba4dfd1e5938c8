//! Depth-first project walk through the [`FileSystem`] trait.

use ignore::overrides::{Override, OverrideBuilder};
use pipegen_core::fs::{DirEntry, FileType};
use pipegen_core::{ConfigError, FileSystem, Finding, InitConfig, InitError};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, trace, warn};

const SKIPPED_DIRS: &[&str] = &[".git", ".hg", ".svn", "node_modules", "vendor"];

/// Which paths the walk never yields or enters.
pub struct ExclusionRules {
    overrides: Override,
    skipped_files: Vec<PathBuf>,
}

impl ExclusionRules {
    pub fn from_config(config: &InitConfig) -> Result<Self, InitError> {
        let mut builder = OverrideBuilder::new(&config.root);
        for glob in &config.skip_globs {
            builder.add(&format!("!{}", glob)).map_err(|e| {
                ConfigError::ValidationFailed(format!("Invalid skip pattern '{}': {}", glob, e))
            })?;
        }
        let overrides = builder
            .build()
            .map_err(|e| ConfigError::ValidationFailed(format!("Invalid skip patterns: {}", e)))?;

        let mut skipped_files = Vec::new();
        if !config.writes_to_stdout() {
            skipped_files.push(config.target_path());
        }
        skipped_files.extend(config.compose_path());

        Ok(Self {
            overrides,
            skipped_files,
        })
    }

    fn skips_dir(&self, entry: &DirEntry) -> bool {
        let name = entry.file_name();
        SKIPPED_DIRS.contains(&name)
            || name.starts_with('.')
            || self.overrides.matched(entry.path(), true).is_ignore()
    }

    fn skips_file(&self, entry: &DirEntry) -> bool {
        self.skipped_files.iter().any(|p| p == entry.path())
            || self.overrides.matched(entry.path(), false).is_ignore()
    }
}

struct Frame {
    entries: std::vec::IntoIter<DirEntry>,
    depth: usize,
}

/// Lazy iterator over every file the scan should look at, in name order.
///
/// Unreadable directories come back as [`Finding::Unreadable`] and the walk
/// carries on.
pub struct Walk<'a> {
    fs: &'a dyn FileSystem,
    rules: ExclusionRules,
    max_depth: usize,
    stack: Vec<Frame>,
    visited: HashSet<PathBuf>,
}

impl<'a> Walk<'a> {
    pub fn new(
        fs: &'a dyn FileSystem,
        root: &Path,
        rules: ExclusionRules,
        max_depth: usize,
    ) -> Result<Self, InitError> {
        let entries = fs
            .read_dir(root)
            .map_err(|e| e.context(format!("Failed to read project root {}", root.display())))?;

        let mut visited = HashSet::new();
        visited.insert(fs.canonicalize(root).unwrap_or_else(|_| root.to_path_buf()));

        Ok(Self {
            fs,
            rules,
            max_depth,
            stack: vec![Frame {
                entries: entries.into_iter(),
                depth: 1,
            }],
            visited,
        })
    }

    /// Push the directory's entries, or explain why not.
    fn enter(&mut self, entry: &DirEntry, depth: usize) -> Option<Finding> {
        let path = entry.path();
        if depth >= self.max_depth {
            trace!(path = %path.display(), "Max depth reached");
            return None;
        }

        let canonical = match self.fs.canonicalize(path) {
            Ok(canonical) => canonical,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to resolve directory");
                return Some(Finding::Unreadable {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                });
            }
        };
        if !self.visited.insert(canonical) {
            debug!(path = %path.display(), "Directory already visited, not descending");
            return None;
        }

        match self.fs.read_dir(path) {
            Ok(entries) => {
                self.stack.push(Frame {
                    entries: entries.into_iter(),
                    depth: depth + 1,
                });
                None
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read directory");
                Some(Finding::Unreadable {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                })
            }
        }
    }
}

impl Iterator for Walk<'_> {
    type Item = Result<PathBuf, Finding>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let frame = self.stack.last_mut()?;
            let depth = frame.depth;
            let Some(entry) = frame.entries.next() else {
                self.stack.pop();
                continue;
            };

            match entry.file_type() {
                FileType::Directory => {
                    if self.rules.skips_dir(&entry) {
                        trace!(path = %entry.path().display(), "Skipping directory");
                        continue;
                    }
                    if let Some(finding) = self.enter(&entry, depth) {
                        return Some(Err(finding));
                    }
                }
                FileType::File => {
                    if self.rules.skips_file(&entry) {
                        trace!(path = %entry.path().display(), "Skipping file");
                        continue;
                    }
                    return Some(Ok(entry.path));
                }
                FileType::Other => {
                    trace!(path = %entry.path().display(), "Skipping special file");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipegen_core::MockFileSystem;

    fn config(root: &str) -> InitConfig {
        InitConfig::new(root)
    }

    fn walk(fs: &MockFileSystem, config: &InitConfig) -> (Vec<String>, Vec<Finding>) {
        let rules = ExclusionRules::from_config(config).unwrap();
        let mut files = Vec::new();
        let mut findings = Vec::new();
        for item in Walk::new(fs, &config.root, rules, config.settings.max_depth).unwrap() {
            match item {
                Ok(path) => files.push(
                    path.strip_prefix(&config.root)
                        .unwrap()
                        .display()
                        .to_string(),
                ),
                Err(finding) => findings.push(finding),
            }
        }
        (files, findings)
    }

    #[test]
    fn test_walk_is_name_ordered_and_skips_vcs() {
        let fs = MockFileSystem::with_root(PathBuf::from("/repo"));
        fs.add_file("web/Dockerfile", "FROM alpine");
        fs.add_file("api/Dockerfile", "FROM alpine");
        fs.add_file(".git/config", "[core]");
        fs.add_file(".github/workflows/ci.yml", "on: push");
        fs.add_file("node_modules/x/Dockerfile", "FROM node");
        fs.add_file("README.md", "# hi");

        let (files, findings) = walk(&fs, &config("/repo"));
        assert_eq!(files, vec!["README.md", "api/Dockerfile", "web/Dockerfile"]);
        assert!(findings.is_empty());
    }

    #[test]
    fn test_walk_skips_target_and_globs() {
        let fs = MockFileSystem::with_root(PathBuf::from("/repo"));
        fs.add_file("pipegen.yaml", "apiVersion: pipegen/v1");
        fs.add_file("k8s/app.yaml", "kind: Pod");
        fs.add_file("generated/app.yaml", "kind: Pod");
        fs.add_file("notes.tmp", "");

        let mut cfg = config("/repo");
        cfg.skip_globs = vec!["generated/".to_string(), "*.tmp".to_string()];

        let (files, _) = walk(&fs, &cfg);
        assert_eq!(files, vec!["k8s/app.yaml"]);
    }

    #[test]
    fn test_walk_respects_max_depth() {
        let fs = MockFileSystem::with_root(PathBuf::from("/repo"));
        fs.add_file("Dockerfile", "FROM alpine");
        fs.add_file("a/Dockerfile", "FROM alpine");
        fs.add_file("a/b/Dockerfile", "FROM alpine");

        let mut cfg = config("/repo");
        cfg.settings.max_depth = 2;

        let (files, _) = walk(&fs, &cfg);
        assert_eq!(files, vec!["Dockerfile", "a/Dockerfile"]);
    }

    #[test]
    fn test_walk_survives_symlink_cycle() {
        let fs = MockFileSystem::with_root(PathBuf::from("/repo"));
        fs.add_file("app/Dockerfile", "FROM alpine");
        fs.add_symlink("app/loop", "/repo/app");
        fs.add_symlink("mirror", "/repo/app");

        let (files, findings) = walk(&fs, &config("/repo"));
        assert_eq!(files, vec!["app/Dockerfile"]);
        assert!(findings.is_empty());
    }

    #[test]
    fn test_invalid_skip_glob_is_config_error() {
        let mut cfg = config("/repo");
        cfg.skip_globs = vec!["a/[".to_string()];
        assert!(matches!(
            ExclusionRules::from_config(&cfg),
            Err(InitError::Config(_))
        ));
    }
}
