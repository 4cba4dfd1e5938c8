//! Scan a project, pair its builders with the images its manifests deploy,
//! and produce a pipeline config.

pub mod interaction;
pub mod pipeline;

pub use interaction::{Choice, Interaction, NoInteraction, ScriptedInteraction};
pub use pipeline::context::{Detection, InitContext, InitOutcome};
pub use pipeline::orchestrator::PipelineOrchestrator;

use pipegen_core::{InitConfig, InitError};

/// Run with the real filesystem, no prompt and no cancellation.
pub async fn init(config: InitConfig) -> Result<InitOutcome, InitError> {
    PipelineOrchestrator::new(config).execute().await
}
