//! Read-only registry collaborator traits.

use async_trait::async_trait;

use crate::error::VerifyResult;
use crate::types::{AcademicRecord, IdentityRecord};

/// Identity registry keyed by identity number.
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait]
pub trait IdentityRegistry: Send + Sync {
    /// Exact-key lookup.
    async fn find_identity(&self, identity_number: &str) -> VerifyResult<Option<IdentityRecord>>;

    /// Bounded candidate set for client-side fuzzy search.
    ///
    /// Returns at most `limit` records whose key starts with `prefix`
    /// (an empty prefix means "any").
    async fn identity_candidates(
        &self,
        prefix: &str,
        limit: usize,
    ) -> VerifyResult<Vec<IdentityRecord>>;
}

/// Academic registry keyed by diploma number.
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait]
pub trait AcademicRegistry: Send + Sync {
    /// Exact-key lookup.
    async fn find_academic(&self, diploma_number: &str) -> VerifyResult<Option<AcademicRecord>>;

    /// Bounded candidate set for client-side fuzzy search.
    async fn academic_candidates(
        &self,
        prefix: &str,
        limit: usize,
    ) -> VerifyResult<Vec<AcademicRecord>>;
}
