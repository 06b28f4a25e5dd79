//! Proposal Forge
//!
//! A multi-agent pipeline that researches high school science competitions,
//! picks a promising topic and writes an iteratively refined research
//! proposal. It includes:
//! - Composable agents (LLM, sequential, parallel, loop) over shared state
//! - In-memory sessions and a runner that records every event
//! - The research proposal pipeline and its console report
//! - Layered settings and file logging

pub mod config;
pub mod logging;
pub mod services;
pub mod utils;

pub use config::Settings;
pub use services::agent_composer::{Agent, AgentEvent, AgentPipeline};
pub use services::{InMemorySessionService, RunSummary, Runner};
pub use utils::error::{AppError, AppResult};
