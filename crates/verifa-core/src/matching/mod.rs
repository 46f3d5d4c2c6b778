//! Fuzzy matching for noisy identifiers and academic majors.

pub mod fuzzy;
pub mod taxonomy;

pub use fuzzy::{best_match, normalize, similarity};
pub use taxonomy::{
    group_match, major_compatibility, CompatibilityTier, MajorCompatibility, TaxonomyGroup,
    GROUP_MATCH_SCORE, MAJOR_GROUPS,
};
