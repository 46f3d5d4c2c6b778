//! verifa - Document verification pipeline.
//!
//! Ties the extraction orchestrator, field extractor, cross-document
//! validator and verdict aggregator into one request-scoped pipeline.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use verifa::{create_pipeline, Registries};
//! use verifa_core::{DispatchQueue, TracingObserver, VerifaConfig};
//!
//! let config = VerifaConfig::from_env();
//! // One queue per process; each request gets its own pipeline on top of it.
//! let queue = DispatchQueue::from_config(&config.dispatch);
//! let registries = Registries::from_path("registry.json")?;
//! let pipeline = create_pipeline(&config, registries, Arc::new(TracingObserver), &queue)?;
//! let outcomes = pipeline.verify_bundle(documents).await?;
//! ```

pub mod factory;
pub mod pipeline;

pub use factory::{create_pipeline, Registries};
pub use pipeline::{VerificationOutcome, VerificationPipeline};
