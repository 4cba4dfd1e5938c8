pub mod cancel;
pub mod config;
pub mod error;
pub mod fs;
pub mod model;
pub mod output;
pub mod progress;

pub use cancel::{cancel_pair, CancelHandle, CancelSignal};
pub use config::{ArtifactOverride, ConfigError, InitConfig, OverrideKind, Settings};
pub use error::InitError;
pub use fs::{FileSystem, MockFileSystem, RealFileSystem};
pub use model::{
    BuilderArtifact, BuilderKind, Conflict, DeploySource, Finding, ManifestResource, Origin,
    Pairing, ResolutionSet,
};
pub use output::schema::{AnalysisReport, InitReport, PipelineConfig};
pub use progress::{LoggingHandler, NoOpHandler, ProgressEvent, ProgressHandler};
