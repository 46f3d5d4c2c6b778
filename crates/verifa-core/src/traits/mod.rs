//! Core traits for verifa collaborators.

mod llm;
mod registry;

pub use llm::*;
pub use registry::*;
