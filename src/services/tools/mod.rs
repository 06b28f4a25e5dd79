//! Tools
//!
//! Tools the proposal agents may call. `google_search` is executed by the
//! model provider; the others run locally through `UnifiedToolRegistry`.

pub mod exit_loop;
pub mod function_tool;
pub mod google_search;

pub use exit_loop::{ExitLoopTool, EXIT_LOOP_TOOL_NAME};
pub use function_tool::FunctionTool;
pub use google_search::{GoogleSearchTool, GOOGLE_SEARCH_TOOL_NAME};
