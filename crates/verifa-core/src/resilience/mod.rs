//! Resilient call layer.
//!
//! - [`retry`]: exponential backoff with jitter and fallback targets
//! - [`DispatchQueue`]: global concurrency limit and dispatch spacing
//! - [`ResilientCaller`]: both combined; every external call uses it

mod caller;
mod queue;
pub mod retry;

pub use caller::ResilientCaller;
pub use queue::DispatchQueue;
