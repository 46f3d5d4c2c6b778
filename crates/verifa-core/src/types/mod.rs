//! Core types for verifa.

mod check;
mod document;
mod field;
mod message;
mod record;
mod verdict;

pub use check::*;
pub use document::*;
pub use field::*;
pub use message::*;
pub use record::*;
pub use verdict::*;
