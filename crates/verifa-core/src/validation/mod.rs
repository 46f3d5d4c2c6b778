//! Cross-document validation.
//!
//! Every document gets its own [`CheckLedger`]; sibling documents are only
//! read, never mutated.

mod academic;
mod identity;
mod judge;
mod ledger;
mod letters;
mod siblings;
mod validator;

pub use judge::{MajorJudge, MajorJudgment};
pub use ledger::CheckLedger;
pub use siblings::{SiblingDocuments, ValidatedDocument};
pub use validator::CrossDocumentValidator;
