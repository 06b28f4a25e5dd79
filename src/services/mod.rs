//! Services
//!
//! Agent composition, sessions, tools and the research proposal pipeline.

pub mod agent_composer;
pub mod proposal;
pub mod runner;
pub mod session;
pub mod tools;

pub use runner::{RunSummary, Runner};
pub use session::{InMemorySessionService, RecordedEvent, Session, SessionSnapshot};
