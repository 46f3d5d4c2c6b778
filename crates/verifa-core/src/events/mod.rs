//! Event system for pipeline diagnostics
//!
//! This module provides:
//! - Event types for extraction tiers, field extraction, checks and verdicts
//! - The `Observer` sink injected into every pipeline stage
//! - A broadcast bus for watching a run from outside the pipeline

mod bus;
mod event;
mod observer;

pub use bus::{EventBus, EventSubscriber};
pub use event::PipelineEvent;
pub use observer::{NoopObserver, Observer, SharedObserver, TracingObserver};
