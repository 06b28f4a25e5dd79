//! ExitLoop Tool
//!
//! Called by the refinement writer once the evaluator has approved the
//! proposal. Declares `escalate`, which ends the writer's turn and the
//! enclosing refinement loop.

use async_trait::async_trait;
use serde_json::Value;

use proposal_forge_core::{
    CoreResult, EventActions, ExecutionContext, ToolContext, ToolDefinitionTrait, ToolExecutable,
    ToolOutput,
};

pub const EXIT_LOOP_TOOL_NAME: &str = "exit_proposal_loop";

/// Signals that the proposal is approved.
#[derive(Debug, Default)]
pub struct ExitLoopTool;

impl ExitLoopTool {
    pub fn new() -> Self {
        Self
    }
}

impl ToolDefinitionTrait for ExitLoopTool {
    fn name(&self) -> &str {
        EXIT_LOOP_TOOL_NAME
    }

    fn description(&self) -> &str {
        "Call this function when the proposal evaluation indicates approval. \
         This exits the iterative refinement loop."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({ "type": "object", "properties": {} })
    }
}

#[async_trait]
impl ToolExecutable for ExitLoopTool {
    async fn execute(&self, ctx: &ToolContext, _args: Value) -> CoreResult<ToolOutput> {
        tracing::info!(
            agent = ctx.agent_name(),
            "proposal approved, exiting refinement loop"
        );
        Ok(ToolOutput::value(serde_json::json!({
            "status": "approved",
            "message": "Proposal approved. Exiting refinement loop.",
        }))
        .with_actions(EventActions::none().with_escalate()))
    }
}
