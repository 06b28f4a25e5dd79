//! Research Proposal System
//!
//! The concrete multi-agent pipeline that researches science competitions,
//! selects a topic and writes a proposal, plus the report printed after a run.

pub mod pipeline;
pub mod prompts;
pub mod report;

pub use pipeline::{
    apply_overrides, build_root_agent, default_pipeline, load_pipeline_file, parse_pipeline,
    proposal_registry, render_pipeline, PipelineFormat, PipelineOptions, PipelineOverrides,
    REFINEMENT_LOOP_NAME, ROOT_AGENT_NAME,
};
pub use report::{render_banner, render_report, truncate_preview, DEFAULT_QUERY};
