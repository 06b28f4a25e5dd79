//! Research proposal pipeline
//!
//! Five phases under one root sequence:
//!
//! 1. `ParallelResearchPhase` finds winning projects and judging criteria
//! 2. `AnalysisPhase` turns them into practical criteria
//! 3. `TopicIntersectionPhase` keeps winning topics with active research
//! 4. `TopicProposalPhase` selects one topic with a rubric
//! 5. `ProposalDevelopmentPhase` writes, evaluates and refines the proposal
//!
//! The pipeline is plain data (`AgentPipeline`) so it can be printed, edited
//! and loaded back; `build_root_agent` materialises it.

use std::path::Path;
use std::sync::Arc;

use proposal_forge_llm::DEFAULT_MODEL;

use super::prompts;
use crate::services::agent_composer::{
    Agent, AgentPipeline, AgentStep, ComposerRegistry, LlmStepConfig, LoopExit,
};
use crate::services::tools::{
    ExitLoopTool, GoogleSearchTool, EXIT_LOOP_TOOL_NAME, GOOGLE_SEARCH_TOOL_NAME,
};
use crate::utils::error::{AppError, AppResult};

/// Name of the root agent and of the app its sessions belong to.
pub const ROOT_AGENT_NAME: &str = "ResearchProposalSystem";

/// Name of the refinement loop step.
pub const REFINEMENT_LOOP_NAME: &str = "ProposalRefinementLoop";

/// Knobs of the default pipeline.
///
/// Tool rounds and temperature are not part of the pipeline; agents take
/// them from the runner's `AgentConfig`.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOptions {
    /// Model used by every agent.
    pub model: String,
    /// Cap on writer/evaluator rounds in the refinement loop.
    pub max_refinements: u32,
    /// Feedback that ends the refinement loop.
    pub approval_sentinel: String,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_refinements: 3,
            approval_sentinel: "APPROVED".to_string(),
        }
    }
}

/// Command-line overrides applied to a pipeline loaded from a file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineOverrides {
    /// Model forced on every LLM step.
    pub model: Option<String>,
    /// Iteration cap forced on every loop step.
    pub max_refinements: Option<u32>,
}

impl PipelineOverrides {
    pub fn is_empty(&self) -> bool {
        self.model.is_none() && self.max_refinements.is_none()
    }
}

/// Apply `overrides` to every step of `pipeline`, depth first.
pub fn apply_overrides(pipeline: &mut AgentPipeline, overrides: &PipelineOverrides) {
    fn walk(step: &mut AgentStep, overrides: &PipelineOverrides) {
        match step {
            AgentStep::LlmStep(config) => {
                if let Some(ref model) = overrides.model {
                    config.model = Some(model.clone());
                }
            }
            AgentStep::SequentialStep { steps, .. } | AgentStep::ParallelStep { steps, .. } => {
                steps.iter_mut().for_each(|s| walk(s, overrides));
            }
            AgentStep::LoopStep {
                steps,
                max_iterations,
                ..
            } => {
                if let Some(max) = overrides.max_refinements {
                    *max_iterations = max;
                }
                steps.iter_mut().for_each(|s| walk(s, overrides));
            }
        }
    }

    if overrides.is_empty() {
        return;
    }
    for step in &mut pipeline.steps {
        walk(step, overrides);
    }
    tracing::debug!(pipeline = %pipeline.name, ?overrides, "applied pipeline overrides");
}

fn agent(
    options: &PipelineOptions,
    name: &str,
    description: &str,
    instruction: &str,
    tools: &[&str],
    output_key: &str,
) -> AgentStep {
    AgentStep::LlmStep(LlmStepConfig {
        name: name.to_string(),
        description: Some(description.to_string()),
        instruction: Some(instruction.to_string()),
        model: Some(options.model.clone()),
        tools: if tools.is_empty() {
            None
        } else {
            Some(tools.iter().map(|t| t.to_string()).collect())
        },
        output_key: Some(output_key.to_string()),
        config: None,
    })
}

fn sequence(name: &str, steps: Vec<AgentStep>) -> AgentStep {
    AgentStep::SequentialStep {
        name: name.to_string(),
        steps,
    }
}

/// The default research proposal pipeline.
pub fn default_pipeline(options: &PipelineOptions) -> AgentPipeline {
    let search = [GOOGLE_SEARCH_TOOL_NAME];

    let evaluator = |name: &str| {
        agent(
            options,
            name,
            "Evaluates the proposal against the topic's rubric",
            prompts::PROPOSAL_EVALUATOR,
            &[],
            "evaluation_feedback",
        )
    };

    let research = AgentStep::ParallelStep {
        name: "ParallelResearchPhase".to_string(),
        steps: vec![
            agent(
                options,
                "WinningProjectsResearcher",
                "Researches recent winning competition projects",
                prompts::WINNING_PROJECTS_RESEARCHER,
                &search,
                "winning_projects",
            ),
            agent(
                options,
                "CriteriaResearcher",
                "Researches competition evaluation criteria",
                prompts::CRITERIA_RESEARCHER,
                &search,
                "evaluation_criteria",
            ),
        ],
    };

    let analysis = sequence(
        "AnalysisPhase",
        vec![agent(
            options,
            "CriteriaAnalyzer",
            "Correlates winning projects with evaluation criteria",
            prompts::CRITERIA_ANALYZER,
            &[],
            "practical_criteria",
        )],
    );

    let intersection = sequence(
        "TopicIntersectionPhase",
        vec![agent(
            options,
            "TopicIntersector",
            "Finds winning topics that are active research areas",
            prompts::TOPIC_INTERSECTOR,
            &search,
            "intersected_topics",
        )],
    );

    let topic = sequence(
        "TopicProposalPhase",
        vec![agent(
            options,
            "TopicProposer",
            "Selects the best topic and its rubric",
            prompts::TOPIC_PROPOSER,
            &[],
            "topic_proposal",
        )],
    );

    let refinement = AgentStep::LoopStep {
        name: REFINEMENT_LOOP_NAME.to_string(),
        steps: vec![
            agent(
                options,
                "RefinedProposalWriter",
                "Revises the proposal or exits once approved",
                prompts::REFINED_PROPOSAL_WRITER,
                &[EXIT_LOOP_TOOL_NAME],
                "research_proposal",
            ),
            evaluator("RefinementProposalEvaluator"),
        ],
        max_iterations: options.max_refinements,
        exit: Some(LoopExit::UntilEquals {
            key: "evaluation_feedback".to_string(),
            value: options.approval_sentinel.clone(),
        }),
    };

    let development = sequence(
        "ProposalDevelopmentPhase",
        vec![
            sequence(
                "InitialProposalPhase",
                vec![agent(
                    options,
                    "InitialProposalWriter",
                    "Writes the first research proposal",
                    prompts::INITIAL_PROPOSAL_WRITER,
                    &[],
                    "research_proposal",
                )],
            ),
            sequence(
                "InitialEvaluationPhase",
                vec![evaluator("InitialProposalEvaluator")],
            ),
            refinement,
        ],
    );

    AgentPipeline {
        pipeline_id: "research-proposal".to_string(),
        name: ROOT_AGENT_NAME.to_string(),
        description: Some(
            "Researches a winning topic and writes a one-semester competition proposal"
                .to_string(),
        ),
        steps: vec![research, analysis, intersection, topic, development],
        created_at: chrono::Utc::now().to_rfc3339(),
        updated_at: None,
    }
}

/// Registry holding the tools the pipeline refers to.
pub fn proposal_registry() -> ComposerRegistry {
    ComposerRegistry::new()
        .with_tool(Arc::new(GoogleSearchTool::new()))
        .with_tool(Arc::new(ExitLoopTool::new()))
}

/// Build the root agent of a pipeline definition.
pub fn build_root_agent(pipeline: &AgentPipeline) -> AppResult<Arc<dyn Agent>> {
    let root = proposal_registry().build_from_pipeline(pipeline)?;
    tracing::info!(
        root = root.name(),
        phases = pipeline.steps.len(),
        agents = pipeline.llm_step_names().len(),
        "pipeline built"
    );
    Ok(root)
}

/// Serialization format of a pipeline file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineFormat {
    Json,
    Toml,
}

impl PipelineFormat {
    /// Format implied by a file extension.
    pub fn from_path(path: &Path) -> AppResult<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Ok(PipelineFormat::Json),
            Some(ext) if ext.eq_ignore_ascii_case("toml") => Ok(PipelineFormat::Toml),
            _ => Err(AppError::validation(format!(
                "Pipeline file must end in .json or .toml: {}",
                path.display()
            ))),
        }
    }
}

/// Render a pipeline definition.
pub fn render_pipeline(pipeline: &AgentPipeline, format: PipelineFormat) -> AppResult<String> {
    match format {
        PipelineFormat::Json => Ok(serde_json::to_string_pretty(pipeline)?),
        PipelineFormat::Toml => Ok(toml::to_string_pretty(pipeline)?),
    }
}

/// Parse a pipeline definition.
pub fn parse_pipeline(text: &str, format: PipelineFormat) -> AppResult<AgentPipeline> {
    let pipeline: AgentPipeline = match format {
        PipelineFormat::Json => serde_json::from_str(text)?,
        PipelineFormat::Toml => toml::from_str(text)?,
    };
    if pipeline.steps.is_empty() {
        return Err(AppError::validation(format!(
            "Pipeline '{}' has no steps",
            pipeline.name
        )));
    }
    Ok(pipeline)
}

/// Load a pipeline definition from a `.json` or `.toml` file.
pub fn load_pipeline_file(path: &Path) -> AppResult<AgentPipeline> {
    let format = PipelineFormat::from_path(path)?;
    let text = std::fs::read_to_string(path)?;
    let pipeline = parse_pipeline(&text, format)?;
    tracing::debug!(path = %path.display(), name = %pipeline.name, "loaded pipeline file");
    Ok(pipeline)
}
