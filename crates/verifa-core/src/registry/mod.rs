//! Registry collaborator implementations.
//!
//! Both implementations are read-only and serve exact-key lookups plus a
//! bounded, prefix-keyed candidate set for client-side fuzzy search.

mod memory;
mod sqlite;

pub use memory::{InMemoryRegistry, RegistryFixture};
pub use sqlite::{SqliteRegistry, REGISTRY_SCHEMA};
