pub mod context;
pub mod orchestrator;
pub mod phase_trait;
pub mod phases;
pub mod walker;

pub use context::{Detection, InitContext, InitOutcome, ScanResult};
pub use orchestrator::PipelineOrchestrator;
pub use phase_trait::WorkflowPhase;
