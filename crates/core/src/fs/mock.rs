use super::{DirEntry, FileMetadata, FileSystem, FileType};
use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

const MAX_LINK_HOPS: usize = 40;

#[derive(Debug, Clone)]
pub struct MockEntry {
    pub content: Option<String>,
    pub file_type: FileType,
    /// Set for symbolic links; holds the absolute target
    pub link: Option<PathBuf>,
}

/// In-memory project tree for tests.
///
/// Relative paths are anchored at the mock root (`/mock` unless built with
/// [`MockFileSystem::with_root`]). Symbolic links are followed on every lookup,
/// so a link pointing at one of its own ancestors reproduces a real cycle.
pub struct MockFileSystem {
    files: RwLock<HashMap<PathBuf, MockEntry>>,
    root: PathBuf,
}

impl MockFileSystem {
    pub fn new() -> Self {
        Self::with_root(PathBuf::from("/mock"))
    }

    pub fn with_root(root: PathBuf) -> Self {
        let fs = Self {
            files: RwLock::new(HashMap::new()),
            root,
        };
        let root = fs.root.clone();
        fs.add_dir(root);
        fs
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn add_file(&self, path: impl AsRef<Path>, content: &str) {
        let path = self.normalize_path(path.as_ref());
        let mut files = self.files.write().unwrap_or_else(PoisonError::into_inner);

        if let Some(parent) = path.parent() {
            Self::ensure_parents(&mut files, parent);
        }

        files.insert(
            path,
            MockEntry {
                content: Some(content.to_string()),
                file_type: FileType::File,
                link: None,
            },
        );
    }

    pub fn add_dir(&self, path: impl AsRef<Path>) {
        let path = self.normalize_path(path.as_ref());
        let mut files = self.files.write().unwrap_or_else(PoisonError::into_inner);

        Self::ensure_parents(&mut files, &path);
    }

    /// Create a symbolic link at `link` pointing to `target`.
    ///
    /// The target does not need to exist; a dangling link reads as
    /// [`FileType::Other`].
    pub fn add_symlink(&self, link: impl AsRef<Path>, target: impl AsRef<Path>) {
        let link = self.normalize_path(link.as_ref());
        let target = self.normalize_path(target.as_ref());
        let mut files = self.files.write().unwrap_or_else(PoisonError::into_inner);

        if let Some(parent) = link.parent() {
            Self::ensure_parents(&mut files, parent);
        }

        files.insert(
            link,
            MockEntry {
                content: None,
                file_type: FileType::Other,
                link: Some(target),
            },
        );
    }

    fn normalize_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    fn ensure_parents(files: &mut HashMap<PathBuf, MockEntry>, path: &Path) {
        let mut current = PathBuf::new();
        for component in path.components() {
            current.push(component);
            files.entry(current.clone()).or_insert(MockEntry {
                content: None,
                file_type: FileType::Directory,
                link: None,
            });
        }
    }

    /// Follow links component by component; `None` when the hop limit trips.
    fn resolve(files: &HashMap<PathBuf, MockEntry>, path: &Path) -> Option<PathBuf> {
        let mut current = PathBuf::new();
        let mut hops = 0;

        for component in path.components() {
            current.push(component);
            while let Some(target) = files.get(&current).and_then(|e| e.link.clone()) {
                hops += 1;
                if hops > MAX_LINK_HOPS {
                    return None;
                }
                current = target;
            }
        }

        Some(current)
    }

    fn lookup(&self, path: &Path) -> Option<(PathBuf, MockEntry)> {
        let path = self.normalize_path(path);
        let files = self.files.read().unwrap_or_else(PoisonError::into_inner);
        let resolved = Self::resolve(&files, &path)?;
        files.get(&resolved).cloned().map(|entry| (resolved, entry))
    }
}

impl Default for MockFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl FileSystem for MockFileSystem {
    fn exists(&self, path: &Path) -> bool {
        self.lookup(path).is_some()
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.lookup(path)
            .map(|(_, e)| e.file_type == FileType::Directory)
            .unwrap_or(false)
    }

    fn is_file(&self, path: &Path) -> bool {
        self.lookup(path)
            .map(|(_, e)| e.file_type == FileType::File)
            .unwrap_or(false)
    }

    fn metadata(&self, path: &Path) -> Result<FileMetadata> {
        let (_, entry) = self
            .lookup(path)
            .ok_or_else(|| anyhow!("Path not found: {:?}", path))?;

        Ok(FileMetadata {
            size: entry.content.as_ref().map(|c| c.len() as u64).unwrap_or(0),
            file_type: entry.file_type,
        })
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        let (_, entry) = self
            .lookup(path)
            .ok_or_else(|| anyhow!("File not found: {:?}", path))?;

        entry
            .content
            .ok_or_else(|| anyhow!("Not a file: {:?}", path))
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<DirEntry>> {
        let requested = self.normalize_path(path);
        let files = self.files.read().unwrap_or_else(PoisonError::into_inner);

        let dir = Self::resolve(&files, &requested)
            .filter(|p| {
                files
                    .get(p)
                    .is_some_and(|e| e.file_type == FileType::Directory)
            })
            .ok_or_else(|| anyhow!("Directory not found: {:?}", requested))?;

        let mut entries = Vec::new();
        for (file_path, entry) in files.iter() {
            if file_path.parent() != Some(dir.as_path()) || file_path == &dir {
                continue;
            }
            let name = file_path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("")
                .to_string();

            let (file_type, is_symlink) = match entry.link {
                Some(_) => {
                    let target_type = Self::resolve(&files, file_path)
                        .and_then(|t| files.get(&t).map(|e| e.file_type))
                        .unwrap_or(FileType::Other);
                    (target_type, true)
                }
                None => (entry.file_type, false),
            };

            entries.push(DirEntry {
                path: requested.join(&name),
                name,
                file_type,
                is_symlink,
            });
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn canonicalize(&self, path: &Path) -> Result<PathBuf> {
        self.lookup(path)
            .map(|(resolved, _)| resolved)
            .ok_or_else(|| anyhow!("Path not found: {:?}", path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_file() {
        let fs = MockFileSystem::new();
        fs.add_file("Dockerfile", "FROM alpine");

        assert!(fs.exists(Path::new("/mock/Dockerfile")));
        assert!(fs.is_file(Path::new("/mock/Dockerfile")));
    }

    #[test]
    fn test_add_dir() {
        let fs = MockFileSystem::new();
        fs.add_dir("k8s");

        assert!(fs.exists(Path::new("/mock/k8s")));
        assert!(fs.is_dir(Path::new("/mock/k8s")));
    }

    #[test]
    fn test_read_to_string() {
        let fs = MockFileSystem::new();
        fs.add_file("k8s/pod.yaml", "kind: Pod");

        let content = fs.read_to_string(Path::new("/mock/k8s/pod.yaml")).unwrap();
        assert_eq!(content, "kind: Pod");
        assert!(fs.read_to_string(Path::new("/mock/k8s")).is_err());
    }

    #[test]
    fn test_metadata() {
        let fs = MockFileSystem::new();
        fs.add_file("go.mod", "hello");

        let meta = fs.metadata(Path::new("/mock/go.mod")).unwrap();
        assert!(meta.is_file());
        assert_eq!(meta.len(), 5);
    }

    #[test]
    fn test_read_dir_sorted() {
        let fs = MockFileSystem::new();
        fs.add_file("zeta/Dockerfile", "FROM a");
        fs.add_file("alpha.yaml", "kind: Pod");
        fs.add_file("zeta/nested/x.txt", "x");

        let entries = fs.read_dir(Path::new("/mock")).unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.file_name()).collect();

        assert_eq!(names, vec!["alpha.yaml", "zeta"]);
    }

    #[test]
    fn test_with_root() {
        let fs = MockFileSystem::with_root(PathBuf::from("/repo"));
        fs.add_file("web/package.json", "{}");

        assert!(fs.is_dir(Path::new("/repo")));
        let content = fs
            .read_to_string(Path::new("/repo/web/package.json"))
            .unwrap();
        assert_eq!(content, "{}");
    }

    #[test]
    fn test_parent_directories_created() {
        let fs = MockFileSystem::new();
        fs.add_file("a/b/c/file.txt", "content");

        assert!(fs.is_dir(Path::new("/mock/a")));
        assert!(fs.is_dir(Path::new("/mock/a/b")));
        assert!(fs.is_dir(Path::new("/mock/a/b/c")));
        assert!(fs.is_file(Path::new("/mock/a/b/c/file.txt")));
    }

    #[test]
    fn test_symlink_to_dir_is_followed() {
        let fs = MockFileSystem::new();
        fs.add_file("real/Dockerfile", "FROM alpine");
        fs.add_symlink("alias", "real");

        assert!(fs.is_dir(Path::new("/mock/alias")));
        assert_eq!(
            fs.read_to_string(Path::new("/mock/alias/Dockerfile")).unwrap(),
            "FROM alpine"
        );
        assert_eq!(
            fs.canonicalize(Path::new("/mock/alias")).unwrap(),
            PathBuf::from("/mock/real")
        );

        let entries = fs.read_dir(Path::new("/mock/alias")).unwrap();
        assert_eq!(entries[0].path(), Path::new("/mock/alias/Dockerfile"));
    }

    #[test]
    fn test_symlink_cycle_resolves_to_ancestor() {
        let fs = MockFileSystem::new();
        fs.add_dir("a/b");
        fs.add_symlink("a/b/loop", "a");

        let entries = fs.read_dir(Path::new("/mock/a/b")).unwrap();
        assert!(entries[0].is_symlink);
        assert_eq!(entries[0].file_type(), FileType::Directory);
        assert_eq!(
            fs.canonicalize(Path::new("/mock/a/b/loop/b/loop")).unwrap(),
            PathBuf::from("/mock/a")
        );
    }

    #[test]
    fn test_dangling_symlink() {
        let fs = MockFileSystem::new();
        fs.add_symlink("gone", "nowhere");

        let entries = fs.read_dir(Path::new("/mock")).unwrap();
        assert_eq!(entries[0].file_type(), FileType::Other);
        assert!(!fs.exists(Path::new("/mock/gone")));
    }
}
