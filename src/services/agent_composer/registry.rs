//! ComposerRegistry: tool catalog and pipeline construction
//!
//! The registry holds the tools pipeline steps may reference by name.
//! `build_from_pipeline` recursively constructs agent compositions from
//! serializable `AgentPipeline` definitions.

use std::sync::Arc;

use proposal_forge_core::{UnifiedTool, UnifiedToolRegistry};

use super::llm_agent::LlmAgent;
use super::loop_agent::{condition_for, LoopAgent};
use super::parallel::ParallelAgent;
use super::sequential::SequentialAgent;
use super::types::{Agent, AgentPipeline, AgentStep, LlmStepConfig};
use crate::utils::error::{AppError, AppResult};

/// Tool catalog that turns pipeline definitions into agents.
pub struct ComposerRegistry {
    tools: UnifiedToolRegistry,
}

impl ComposerRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            tools: UnifiedToolRegistry::new(),
        }
    }

    /// Add a tool to the catalog. Replaces any tool with the same name.
    pub fn register_tool(&mut self, tool: Arc<dyn UnifiedTool>) {
        self.tools.register(tool);
    }

    /// Builder form of `register_tool`.
    pub fn with_tool(mut self, tool: Arc<dyn UnifiedTool>) -> Self {
        self.register_tool(tool);
        self
    }

    /// The tool catalog.
    pub fn tools(&self) -> &UnifiedToolRegistry {
        &self.tools
    }

    /// Build an agent composition from a pipeline definition.
    ///
    /// A single top-level step is built directly; several steps become a
    /// `SequentialAgent` named after the pipeline.
    pub fn build_from_pipeline(&self, pipeline: &AgentPipeline) -> AppResult<Arc<dyn Agent>> {
        if pipeline.steps.is_empty() {
            return Err(AppError::validation(format!(
                "Pipeline '{}' has no steps",
                pipeline.name
            )));
        }

        if pipeline.steps.len() == 1 {
            return self.build_step(&pipeline.steps[0]);
        }

        let agents = self.build_steps(&pipeline.steps)?;
        let mut root = SequentialAgent::new(pipeline.name.clone(), agents);
        if let Some(ref description) = pipeline.description {
            root = root.with_description(description.clone());
        }
        Ok(Arc::new(root))
    }

    /// Build a single agent step recursively.
    pub fn build_step(&self, step: &AgentStep) -> AppResult<Arc<dyn Agent>> {
        match step {
            AgentStep::LlmStep(config) => Ok(Arc::new(self.build_llm_agent(config)?)),
            AgentStep::SequentialStep { name, steps } => Ok(Arc::new(SequentialAgent::new(
                name.clone(),
                self.build_steps(steps)?,
            ))),
            AgentStep::ParallelStep { name, steps } => Ok(Arc::new(ParallelAgent::new(
                name.clone(),
                self.build_steps(steps)?,
            ))),
            AgentStep::LoopStep {
                name,
                steps,
                max_iterations,
                exit,
            } => {
                let mut agent = LoopAgent::new(name.clone(), self.build_steps(steps)?)
                    .with_max_iterations(*max_iterations);
                if let Some(exit) = exit {
                    agent = agent.with_condition(condition_for(exit));
                }
                Ok(Arc::new(agent))
            }
        }
    }

    fn build_steps(&self, steps: &[AgentStep]) -> AppResult<Vec<Arc<dyn Agent>>> {
        steps.iter().map(|s| self.build_step(s)).collect()
    }

    /// Build an LlmAgent from a step configuration, resolving tool names
    /// against the catalog.
    fn build_llm_agent(&self, config: &LlmStepConfig) -> AppResult<LlmAgent> {
        let mut agent = LlmAgent::new(config.name.clone());

        if let Some(ref agent_config) = config.config {
            agent = agent.with_config(agent_config.clone());
        }

        if let Some(ref description) = config.description {
            agent = agent.with_description(description.clone());
        }
        if let Some(ref instruction) = config.instruction {
            agent = agent.with_instruction(instruction.clone());
        }
        if let Some(ref model) = config.model {
            agent = agent.with_model(model.clone());
        }
        if let Some(ref output_key) = config.output_key {
            agent = agent.with_output_key(output_key.clone());
        }
        for tool_name in config.tools.iter().flatten() {
            let tool = self.tools.get(tool_name).ok_or_else(|| {
                AppError::validation(format!(
                    "Agent '{}' references unknown tool '{}'",
                    config.name, tool_name
                ))
            })?;
            tracing::trace!(agent = %config.name, tool = %tool_name, "attaching tool");
            agent = agent.with_tool(tool);
        }

        Ok(agent)
    }
}

impl Default for ComposerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
