//! Integration Tests Module
//!
//! End-to-end runs of the research proposal pipeline against a scripted
//! model provider that answers by agent role.

// Prompt-routed mock provider
mod support;

// Full pipeline runs through the runner
mod pipeline_test;

// Sessions across runs
mod session_test;
