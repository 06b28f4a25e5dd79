//! FunctionTool
//!
//! Wraps an async closure as a tool so ad-hoc functions can be offered to an
//! agent without a dedicated type.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use proposal_forge_core::{
    CoreResult, EventActions, ToolContext, ToolDefinitionTrait, ToolExecutable, ToolOutput,
};

type BoxedHandler = Arc<
    dyn Fn(ToolContext, Value) -> Pin<Box<dyn Future<Output = CoreResult<Value>> + Send>>
        + Send
        + Sync,
>;

/// A tool backed by a closure.
pub struct FunctionTool {
    name: String,
    description: String,
    schema: Value,
    escalate: bool,
    handler: BoxedHandler,
}

impl FunctionTool {
    /// Create a tool from an async handler. The schema defaults to an object
    /// with no properties.
    pub fn new<F, Fut>(name: impl Into<String>, description: impl Into<String>, handler: F) -> Self
    where
        F: Fn(ToolContext, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CoreResult<Value>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            schema: serde_json::json!({ "type": "object", "properties": {} }),
            escalate: false,
            handler: Arc::new(move |ctx, args| Box::pin(handler(ctx, args))),
        }
    }

    /// Set the JSON schema of the arguments.
    pub fn with_schema(mut self, schema: Value) -> Self {
        self.schema = schema;
        self
    }

    /// Declare `escalate` after every successful call.
    pub fn escalating(mut self) -> Self {
        self.escalate = true;
        self
    }
}

impl ToolDefinitionTrait for FunctionTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> Value {
        self.schema.clone()
    }
}

#[async_trait]
impl ToolExecutable for FunctionTool {
    async fn execute(&self, ctx: &ToolContext, args: Value) -> CoreResult<ToolOutput> {
        let value = (self.handler)(ctx.clone(), args).await?;
        let mut actions = EventActions::none();
        if self.escalate {
            actions = actions.with_escalate();
        }
        Ok(ToolOutput::value(value).with_actions(actions))
    }
}
