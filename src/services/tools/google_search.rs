//! GoogleSearch Tool
//!
//! Stands for the provider's hosted web search. Attaching it to an agent sets
//! `native_search` on the request; the provider runs the queries and grounds
//! its answer in the results. It is never executed locally.

use async_trait::async_trait;
use serde_json::Value;

use proposal_forge_core::{
    CoreError, CoreResult, NativeCapability, ToolContext, ToolDefinitionTrait, ToolExecutable,
    ToolOutput,
};

pub const GOOGLE_SEARCH_TOOL_NAME: &str = "google_search";

/// Hosted web search.
#[derive(Debug, Default)]
pub struct GoogleSearchTool;

impl GoogleSearchTool {
    pub fn new() -> Self {
        Self
    }
}

impl ToolDefinitionTrait for GoogleSearchTool {
    fn name(&self) -> &str {
        GOOGLE_SEARCH_TOOL_NAME
    }

    fn description(&self) -> &str {
        "Search the web with Google. Results are used by the model to ground its answer."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({ "type": "object", "properties": {} })
    }

    fn native_capability(&self) -> Option<NativeCapability> {
        Some(NativeCapability::WebSearch)
    }
}

#[async_trait]
impl ToolExecutable for GoogleSearchTool {
    async fn execute(&self, _ctx: &ToolContext, _args: Value) -> CoreResult<ToolOutput> {
        Err(CoreError::tool(
            "google_search is executed by the model provider",
        ))
    }
}
