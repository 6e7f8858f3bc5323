//! Tools module - capability providers for the reasoning loops
//!
//! Contains the research and expert toolsets and the tool registry.

pub mod expert;
pub mod registry;
pub mod research;

pub use registry::{Tool, ToolRegistry};
