use super::context::InitContext;
use async_trait::async_trait;
use pipegen_core::InitError;

/// One step of an init run. Phases read what earlier phases left in the
/// context and store their own result there.
#[async_trait]
pub trait WorkflowPhase: Send + Sync {
    fn name(&self) -> &'static str;

    async fn execute(&self, context: &mut InitContext) -> Result<(), InitError>;
}
