use crate::error::InitError;
use serde::Deserialize;
use std::collections::HashSet;
use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = "pipegen.yaml";
pub const DEFAULT_BUILDPACKS_BUILDER: &str = "heroku/buildpacks";

const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_MAX_DEPTH: usize = 20;
const DEFAULT_MAX_FILE_SIZE_BYTES: u64 = 1_048_576; // 1MB
const MAX_SCAN_CONCURRENCY: usize = 256;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),

    #[error("Failed to parse {field}: {error}")]
    ParseError { field: String, error: String },
}

/// Tunables read from `PIPEGEN_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub scan_concurrency: usize,
    pub max_depth: usize,
    pub max_file_size_bytes: u64,
    pub log_level: String,
}

fn default_scan_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get() * 2)
        .unwrap_or(8)
        .min(MAX_SCAN_CONCURRENCY)
}

impl Default for Settings {
    fn default() -> Self {
        let scan_concurrency = env::var("PIPEGEN_SCAN_CONCURRENCY")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or_else(default_scan_concurrency);

        let max_depth = env::var("PIPEGEN_MAX_DEPTH")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(DEFAULT_MAX_DEPTH);

        let max_file_size_bytes = env::var("PIPEGEN_MAX_FILE_SIZE")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_MAX_FILE_SIZE_BYTES);

        let log_level = env::var("PIPEGEN_LOG_LEVEL")
            .unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string())
            .to_lowercase();

        Self {
            scan_concurrency,
            max_depth,
            max_file_size_bytes,
            log_level,
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scan_concurrency == 0 {
            return Err(ConfigError::ValidationFailed(
                "Scan concurrency must be at least 1".to_string(),
            ));
        }
        if self.scan_concurrency > MAX_SCAN_CONCURRENCY {
            return Err(ConfigError::ValidationFailed(format!(
                "Scan concurrency cannot exceed {}",
                MAX_SCAN_CONCURRENCY
            )));
        }

        if self.max_depth == 0 {
            return Err(ConfigError::ValidationFailed(
                "Max depth must be at least 1".to_string(),
            ));
        }
        if self.max_depth > 100 {
            return Err(ConfigError::ValidationFailed(
                "Max depth cannot exceed 100".to_string(),
            ));
        }

        if self.max_file_size_bytes < 1024 {
            return Err(ConfigError::ValidationFailed(
                "Max file size must be at least 1KB".to_string(),
            ));
        }
        if self.max_file_size_bytes > 104_857_600 {
            return Err(ConfigError::ValidationFailed(
                "Max file size cannot exceed 100MB".to_string(),
            ));
        }

        match self.log_level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(ConfigError::ValidationFailed(format!(
                    "Invalid log level: {}. Valid options: trace, debug, info, warn, error",
                    self.log_level
                )))
            }
        }

        Ok(())
    }
}

/// Builder family named by an explicit artifact override.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverrideKind {
    Docker,
    JibMaven,
    JibGradle,
    Buildpacks,
}

impl OverrideKind {
    fn from_builder_name(name: &str) -> Option<Self> {
        match name {
            "Docker" => Some(OverrideKind::Docker),
            "Jib Maven Plugin" => Some(OverrideKind::JibMaven),
            "Jib Gradle Plugin" => Some(OverrideKind::JibGradle),
            "Buildpacks" => Some(OverrideKind::Buildpacks),
            _ => None,
        }
    }
}

/// A user-declared builder/image pair that bypasses detection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactOverride {
    pub kind: OverrideKind,
    /// Descriptor path as given, relative to the project root unless absolute
    pub path: PathBuf,
    pub project: Option<String>,
    pub image: String,
}

#[derive(Deserialize)]
struct JsonOverride {
    builder: String,
    payload: JsonPayload,
    image: String,
}

#[derive(Deserialize)]
struct JsonPayload {
    path: String,
    #[serde(default)]
    project: Option<String>,
}

impl ArtifactOverride {
    /// Parse `path=image` (a Dockerfile) or the structured JSON form
    /// `{"builder":"Docker","payload":{"path":"web/Dockerfile"},"image":"web"}`.
    pub fn parse(raw: &str) -> Result<Self, InitError> {
        let trimmed = raw.trim();

        if trimmed.starts_with('{') {
            let parsed: JsonOverride = serde_json::from_str(trimmed)
                .map_err(|e| InitError::InvalidArtifact(format!("{}: {}", raw, e)))?;
            let kind = OverrideKind::from_builder_name(&parsed.builder).ok_or_else(|| {
                InitError::InvalidArtifact(format!("unknown builder '{}'", parsed.builder))
            })?;
            if parsed.payload.path.is_empty() || parsed.image.is_empty() {
                return Err(InitError::InvalidArtifact(format!(
                    "{}: path and image must not be empty",
                    raw
                )));
            }
            return Ok(Self {
                kind,
                path: PathBuf::from(parsed.payload.path),
                project: parsed.payload.project,
                image: parsed.image,
            });
        }

        match trimmed.split_once('=') {
            Some((path, image)) if !path.is_empty() && !image.is_empty() => Ok(Self {
                kind: OverrideKind::Docker,
                path: PathBuf::from(path),
                project: None,
                image: image.to_string(),
            }),
            _ => Err(InitError::InvalidArtifact(format!(
                "'{}' is neither <path>=<image> nor a JSON artifact",
                raw
            ))),
        }
    }
}

/// Everything one init run needs, built once by the front end.
#[derive(Debug, Clone)]
pub struct InitConfig {
    pub root: PathBuf,
    pub config_file: PathBuf,
    pub force: bool,
    pub analyze: bool,
    pub skip_build: bool,
    pub skip_deploy: bool,
    pub compose_file: Option<PathBuf>,
    pub cli_artifacts: Vec<String>,
    pub cli_kubernetes_manifests: Vec<String>,
    pub enable_jib_init: bool,
    pub enable_buildpacks_init: bool,
    pub buildpacks_builder: String,
    pub skip_globs: Vec<String>,
    pub settings: Settings,
}

impl InitConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            config_file: PathBuf::from(DEFAULT_CONFIG_FILE),
            force: false,
            analyze: false,
            skip_build: false,
            skip_deploy: false,
            compose_file: None,
            cli_artifacts: Vec::new(),
            cli_kubernetes_manifests: Vec::new(),
            enable_jib_init: false,
            enable_buildpacks_init: false,
            buildpacks_builder: DEFAULT_BUILDPACKS_BUILDER.to_string(),
            skip_globs: Vec::new(),
            settings: Settings::default(),
        }
    }

    /// Where the generated file goes; `-` means standard output.
    pub fn target_path(&self) -> PathBuf {
        self.resolve(&self.config_file)
    }

    pub fn writes_to_stdout(&self) -> bool {
        self.config_file.as_os_str() == "-"
    }

    pub fn compose_path(&self) -> Option<PathBuf> {
        self.compose_file.as_ref().map(|p| self.resolve(p))
    }

    /// Anchor a user supplied path at the project root.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    /// Parsed `--artifact` values. An image may be claimed by one override only.
    pub fn artifact_overrides(&self) -> Result<Vec<ArtifactOverride>, InitError> {
        let overrides = self
            .cli_artifacts
            .iter()
            .map(|raw| ArtifactOverride::parse(raw))
            .collect::<Result<Vec<_>, InitError>>()?;

        let mut seen = HashSet::new();
        for declared in &overrides {
            if !seen.insert(declared.image.as_str()) {
                return Err(InitError::InvalidArtifact(format!(
                    "image '{}' is given by more than one --artifact",
                    declared.image
                )));
            }
        }
        Ok(overrides)
    }

    /// Precondition checks that must fail before any scanning starts.
    pub fn validate(&self) -> Result<(), InitError> {
        self.settings.validate()?;

        if self.compose_file.is_some() && !self.cli_kubernetes_manifests.is_empty() {
            return Err(InitError::ConflictingFlags(
                "--compose-file cannot be combined with --kubernetes-manifest".to_string(),
            ));
        }
        if self.compose_file.is_some() && self.skip_deploy {
            return Err(InitError::ConflictingFlags(
                "--compose-file cannot be combined with --skip-deploy".to_string(),
            ));
        }
        if self.analyze && !self.cli_artifacts.is_empty() {
            return Err(InitError::ConflictingFlags(
                "--analyze cannot be combined with --artifact".to_string(),
            ));
        }
        if self.skip_build && self.skip_deploy {
            return Err(InitError::ConflictingFlags(
                "--skip-build and --skip-deploy together leave nothing to generate".to_string(),
            ));
        }
        if self.config_file.as_os_str().is_empty() {
            return Err(InitError::ConflictingFlags(
                "--filename must not be empty".to_string(),
            ));
        }

        self.artifact_overrides()?;
        Ok(())
    }
}

impl fmt::Display for InitConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Init Configuration:")?;
        writeln!(f, "  Root: {}", self.root.display())?;
        writeln!(f, "  Config File: {}", self.config_file.display())?;
        writeln!(f, "  Force: {}", self.force)?;
        writeln!(f, "  Analyze: {}", self.analyze)?;
        writeln!(f, "  Skip Build: {}", self.skip_build)?;
        writeln!(f, "  Skip Deploy: {}", self.skip_deploy)?;
        if let Some(ref compose) = self.compose_file {
            writeln!(f, "  Compose File: {}", compose.display())?;
        }
        writeln!(f, "  Artifacts: {}", self.cli_artifacts.len())?;
        writeln!(f, "  Manifests: {}", self.cli_kubernetes_manifests.len())?;
        writeln!(f, "  Jib: {}", self.enable_jib_init)?;
        writeln!(
            f,
            "  Buildpacks: {} ({})",
            self.enable_buildpacks_init, self.buildpacks_builder
        )?;
        writeln!(f, "  Scan Concurrency: {}", self.settings.scan_concurrency)?;
        writeln!(f, "  Max Depth: {}", self.settings.max_depth)?;
        writeln!(f, "  Max File Size: {} bytes", self.settings.max_file_size_bytes)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    struct EnvGuard {
        key: String,
        old_value: Option<String>,
    }

    impl EnvGuard {
        fn set(key: &str, value: &str) -> Self {
            let old_value = env::var(key).ok();
            env::set_var(key, value);
            Self {
                key: key.to_string(),
                old_value,
            }
        }

        fn unset(key: &str) -> Self {
            let old_value = env::var(key).ok();
            env::remove_var(key);
            Self {
                key: key.to_string(),
                old_value,
            }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            match &self.old_value {
                Some(v) => env::set_var(&self.key, v),
                None => env::remove_var(&self.key),
            }
        }
    }

    fn settings() -> Settings {
        Settings {
            scan_concurrency: 4,
            max_depth: 20,
            max_file_size_bytes: DEFAULT_MAX_FILE_SIZE_BYTES,
            log_level: "info".to_string(),
        }
    }

    #[test]
    #[serial]
    fn test_default_settings() {
        let _guards = [
            EnvGuard::unset("PIPEGEN_SCAN_CONCURRENCY"),
            EnvGuard::unset("PIPEGEN_MAX_DEPTH"),
            EnvGuard::unset("PIPEGEN_MAX_FILE_SIZE"),
            EnvGuard::unset("PIPEGEN_LOG_LEVEL"),
        ];

        let settings = Settings::default();

        assert!(settings.scan_concurrency >= 1);
        assert_eq!(settings.max_depth, DEFAULT_MAX_DEPTH);
        assert_eq!(settings.max_file_size_bytes, DEFAULT_MAX_FILE_SIZE_BYTES);
        assert_eq!(settings.log_level, DEFAULT_LOG_LEVEL);
        assert!(settings.validate().is_ok());
    }

    #[test]
    #[serial]
    fn test_environment_variable_parsing() {
        let _guards = [
            EnvGuard::set("PIPEGEN_SCAN_CONCURRENCY", "3"),
            EnvGuard::set("PIPEGEN_MAX_DEPTH", "7"),
            EnvGuard::set("PIPEGEN_MAX_FILE_SIZE", "4096"),
            EnvGuard::set("PIPEGEN_LOG_LEVEL", "DEBUG"),
        ];

        let settings = Settings::default();

        assert_eq!(settings.scan_concurrency, 3);
        assert_eq!(settings.max_depth, 7);
        assert_eq!(settings.max_file_size_bytes, 4096);
        assert_eq!(settings.log_level, "debug");
    }

    #[test]
    #[serial]
    fn test_unparseable_values_fall_back() {
        let _guards = [
            EnvGuard::set("PIPEGEN_MAX_DEPTH", "deep"),
            EnvGuard::unset("PIPEGEN_LOG_LEVEL"),
        ];

        assert_eq!(Settings::default().max_depth, DEFAULT_MAX_DEPTH);
    }

    #[test]
    fn test_settings_validation_ranges() {
        let mut s = settings();
        s.scan_concurrency = 0;
        assert!(s.validate().is_err());

        let mut s = settings();
        s.scan_concurrency = 257;
        assert!(s.validate().is_err());

        let mut s = settings();
        s.max_depth = 101;
        assert!(s.validate().is_err());

        let mut s = settings();
        s.max_file_size_bytes = 10;
        assert!(s.validate().is_err());

        let mut s = settings();
        s.log_level = "loud".to_string();
        let err = s.validate().unwrap_err();
        assert!(err.to_string().contains("Invalid log level"));
    }

    fn config() -> InitConfig {
        let mut config = InitConfig::new("/repo");
        config.settings = settings();
        config
    }

    #[test]
    fn test_target_path() {
        let mut config = config();
        assert_eq!(config.target_path(), PathBuf::from("/repo/pipegen.yaml"));

        config.config_file = PathBuf::from("/etc/out.yaml");
        assert_eq!(config.target_path(), PathBuf::from("/etc/out.yaml"));

        config.config_file = PathBuf::from("-");
        assert!(config.writes_to_stdout());
    }

    #[test]
    fn test_compose_with_manifests_conflicts() {
        let mut config = config();
        config.compose_file = Some(PathBuf::from("docker-compose.yml"));
        config.cli_kubernetes_manifests = vec!["k8s/*.yaml".to_string()];

        let err = config.validate().unwrap_err();
        assert!(matches!(err, InitError::ConflictingFlags(_)));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_compose_with_skip_deploy_conflicts() {
        let mut config = config();
        config.compose_file = Some(PathBuf::from("docker-compose.yml"));
        config.skip_deploy = true;

        assert!(matches!(
            config.validate(),
            Err(InitError::ConflictingFlags(_))
        ));
    }

    #[test]
    fn test_analyze_with_artifacts_conflicts() {
        let mut config = config();
        config.analyze = true;
        config.cli_artifacts = vec!["Dockerfile=web".to_string()];

        assert!(matches!(
            config.validate(),
            Err(InitError::ConflictingFlags(_))
        ));
    }

    #[test]
    fn test_invalid_artifact_rejected_before_scan() {
        let mut config = config();
        config.cli_artifacts = vec!["Dockerfile".to_string()];

        assert!(matches!(
            config.validate(),
            Err(InitError::InvalidArtifact(_))
        ));
    }

    #[test]
    fn test_duplicate_explicit_image_rejected() {
        let mut config = config();
        config.cli_artifacts = vec![
            "a/Dockerfile=gcr.io/p/web".to_string(),
            r#"{"builder":"Docker","payload":{"path":"b/Dockerfile"},"image":"gcr.io/p/web"}"#
                .to_string(),
        ];

        let err = config.validate().unwrap_err();
        assert!(matches!(err, InitError::InvalidArtifact(ref m) if m.contains("gcr.io/p/web")));
        assert_eq!(err.exit_code(), 2);

        config.cli_artifacts[1] = "b/Dockerfile=gcr.io/p/api".to_string();
        assert_eq!(config.artifact_overrides().unwrap().len(), 2);
    }

    #[test]
    fn test_parse_path_image_pair() {
        let parsed = ArtifactOverride::parse("web/Dockerfile=gcr.io/p/web:1").unwrap();
        assert_eq!(parsed.kind, OverrideKind::Docker);
        assert_eq!(parsed.path, PathBuf::from("web/Dockerfile"));
        assert_eq!(parsed.image, "gcr.io/p/web:1");
    }

    #[test]
    fn test_parse_json_override() {
        let raw = r#"{"builder":"Jib Maven Plugin","payload":{"path":"api/pom.xml","project":"api"},"image":"gcr.io/p/api"}"#;
        let parsed = ArtifactOverride::parse(raw).unwrap();
        assert_eq!(parsed.kind, OverrideKind::JibMaven);
        assert_eq!(parsed.path, PathBuf::from("api/pom.xml"));
        assert_eq!(parsed.project.as_deref(), Some("api"));
        assert_eq!(parsed.image, "gcr.io/p/api");
    }

    #[test]
    fn test_parse_json_override_errors() {
        assert!(ArtifactOverride::parse(r#"{"builder":"Bazel","payload":{"path":"x"},"image":"y"}"#).is_err());
        assert!(ArtifactOverride::parse(r#"{"builder":"Docker""#).is_err());
        assert!(ArtifactOverride::parse("=image").is_err());
        assert!(ArtifactOverride::parse("path=").is_err());
    }
}
