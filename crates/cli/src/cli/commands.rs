use clap::{Parser, Subcommand, ValueEnum};
use pipegen_core::config::{DEFAULT_BUILDPACKS_BUILDER, DEFAULT_CONFIG_FILE};
use pipegen_core::InitConfig;
use std::path::PathBuf;

/// Bootstrap a build-and-deploy pipeline config from an existing project
#[derive(Parser, Debug)]
#[command(
    name = "pipegen",
    about = "Bootstrap a build-and-deploy pipeline config from an existing project",
    version,
    long_about = "pipegen scans a project for container builders (Dockerfiles, Jib projects, \
                  buildpack manifests) and Kubernetes manifests, pairs every deployed image \
                  with the builder that produces it, and writes a pipeline config."
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, global = true, value_name = "LEVEL", help = "Set logging level")]
    pub log_level: Option<String>,

    #[arg(short = 'v', long, global = true, help = "Enable debug logging")]
    pub verbose: bool,

    #[arg(
        short = 'q',
        long,
        global = true,
        conflicts_with = "verbose",
        help = "Quiet mode - suppress non-error output"
    )]
    pub quiet: bool,

    #[arg(
        long,
        global = true,
        value_enum,
        default_value = "text",
        help = "Log and summary format on stderr"
    )]
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(
        about = "Generate a pipeline config for a project",
        long_about = "Detects builders and Kubernetes manifests under PATH, resolves which \
                      builder produces each deployed image and writes the result.\n\n\
                      Examples:\n  \
                      pipegen init\n  \
                      pipegen init /path/to/project --force\n  \
                      pipegen init --analyze\n  \
                      pipegen init -a web/Dockerfile=gcr.io/proj/web -f -"
    )]
    Init(InitArgs),
}

#[derive(Parser, Debug, Clone)]
pub struct InitArgs {
    #[arg(
        value_name = "PATH",
        help = "Project root (defaults to current directory)"
    )]
    pub path: Option<PathBuf>,

    #[arg(
        short = 'f',
        long,
        value_name = "FILE",
        default_value = DEFAULT_CONFIG_FILE,
        help = "Target file, relative to the project root; '-' writes to stdout"
    )]
    pub filename: PathBuf,

    #[arg(long, help = "Only generate the deploy section")]
    pub skip_build: bool,

    #[arg(long, hide = true)]
    pub skip_deploy: bool,

    #[arg(
        long,
        help = "Overwrite an existing target and settle ambiguities without prompting"
    )]
    pub force: bool,

    #[arg(
        long,
        value_name = "FILE",
        help = "Use a compose file as the only source of builders and deployment"
    )]
    pub compose_file: Option<PathBuf>,

    #[arg(
        short = 'a',
        long = "artifact",
        value_name = "ARTIFACT",
        help = "Explicit builder-to-image pairing: <path>=<image> or a JSON object"
    )]
    pub artifacts: Vec<String>,

    #[arg(
        short = 'k',
        long = "kubernetes-manifest",
        value_name = "GLOB",
        help = "Kubernetes manifest glob, replaces manifest detection"
    )]
    pub kubernetes_manifests: Vec<String>,

    #[arg(
        long,
        help = "Print detected builders and images as JSON without writing anything"
    )]
    pub analyze: bool,

    #[arg(
        long = "skip",
        value_name = "GLOB",
        help = "Exclude paths matching GLOB from the scan"
    )]
    pub skip: Vec<String>,

    #[arg(long = "XXenableJibInit", hide = true)]
    pub enable_jib_init: bool,

    #[arg(long = "XXenableBuildpacksInit", hide = true)]
    pub enable_buildpacks_init: bool,

    #[arg(
        long = "XXdefaultBuildpacksBuilder",
        value_name = "IMAGE",
        default_value = DEFAULT_BUILDPACKS_BUILDER,
        hide = true
    )]
    pub default_buildpacks_builder: String,
}

impl InitArgs {
    pub fn into_config(self) -> InitConfig {
        let mut config = InitConfig::new(self.path.unwrap_or_else(|| PathBuf::from(".")));
        config.config_file = self.filename;
        config.force = self.force;
        config.analyze = self.analyze;
        config.skip_build = self.skip_build;
        config.skip_deploy = self.skip_deploy;
        config.compose_file = self.compose_file;
        config.cli_artifacts = self.artifacts;
        config.cli_kubernetes_manifests = self.kubernetes_manifests;
        config.skip_globs = self.skip;
        config.enable_jib_init = self.enable_jib_init;
        config.enable_buildpacks_init = self.enable_buildpacks_init;
        config.buildpacks_builder = self.default_buildpacks_builder;
        config
    }
}
