//! In-memory registry, loadable from a JSON fixture.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{VerifyError, VerifyResult};
use crate::traits::{AcademicRegistry, IdentityRegistry};
use crate::types::{AcademicRecord, IdentityRecord};

/// On-disk fixture layout.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryFixture {
    #[serde(default)]
    pub identities: Vec<IdentityRecord>,
    #[serde(default)]
    pub academics: Vec<AcademicRecord>,
}

/// Registry backed by ordered maps.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRegistry {
    identities: BTreeMap<String, IdentityRecord>,
    academics: BTreeMap<String, AcademicRecord>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a parsed fixture. Later duplicates replace earlier ones.
    pub fn from_fixture(fixture: RegistryFixture) -> Self {
        let mut registry = Self::new();
        for record in fixture.identities {
            registry.add_identity(record);
        }
        for record in fixture.academics {
            registry.add_academic(record);
        }
        registry
    }

    /// Load a JSON fixture file.
    pub fn from_file(path: impl AsRef<Path>) -> VerifyResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let fixture: RegistryFixture = serde_json::from_str(&content).map_err(|e| {
            VerifyError::Configuration(format!(
                "invalid registry fixture {}: {}",
                path.display(),
                e
            ))
        })?;
        Ok(Self::from_fixture(fixture))
    }

    /// Builder: add an identity record.
    pub fn with_identity(mut self, record: IdentityRecord) -> Self {
        self.add_identity(record);
        self
    }

    /// Builder: add an academic record.
    pub fn with_academic(mut self, record: AcademicRecord) -> Self {
        self.add_academic(record);
        self
    }

    pub fn add_identity(&mut self, record: IdentityRecord) {
        self.identities
            .insert(record.identity_number.clone(), record);
    }

    pub fn add_academic(&mut self, record: AcademicRecord) {
        self.academics.insert(record.diploma_number.clone(), record);
    }

    pub fn identity_count(&self) -> usize {
        self.identities.len()
    }

    pub fn academic_count(&self) -> usize {
        self.academics.len()
    }
}

fn with_prefix<T: Clone>(map: &BTreeMap<String, T>, prefix: &str, limit: usize) -> Vec<T> {
    map.range(prefix.to_string()..)
        .take_while(|(key, _)| key.starts_with(prefix))
        .take(limit)
        .map(|(_, record)| record.clone())
        .collect()
}

#[async_trait]
impl IdentityRegistry for InMemoryRegistry {
    async fn find_identity(&self, identity_number: &str) -> VerifyResult<Option<IdentityRecord>> {
        Ok(self.identities.get(identity_number).cloned())
    }

    async fn identity_candidates(
        &self,
        prefix: &str,
        limit: usize,
    ) -> VerifyResult<Vec<IdentityRecord>> {
        Ok(with_prefix(&self.identities, prefix, limit))
    }
}

#[async_trait]
impl AcademicRegistry for InMemoryRegistry {
    async fn find_academic(&self, diploma_number: &str) -> VerifyResult<Option<AcademicRecord>> {
        Ok(self.academics.get(diploma_number).cloned())
    }

    async fn academic_candidates(
        &self,
        prefix: &str,
        limit: usize,
    ) -> VerifyResult<Vec<AcademicRecord>> {
        Ok(with_prefix(&self.academics, prefix, limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::io::Write;

    #[tokio::test]
    async fn test_exact_and_prefix_lookup() {
        let registry = InMemoryRegistry::new()
            .with_identity(IdentityRecord::new("3201234567890123", "BUDI SANTOSO"))
            .with_identity(IdentityRecord::new("3201239999990001", "SITI AMINAH"))
            .with_identity(IdentityRecord::new("3301010101950002", "ANDI WIJAYA"));

        let found = registry.find_identity("3201234567890123").await.unwrap();
        assert_eq!(found.unwrap().full_name, "BUDI SANTOSO");
        assert!(registry.find_identity("0000").await.unwrap().is_none());

        let candidates = registry.identity_candidates("320123", 50).await.unwrap();
        assert_eq!(candidates.len(), 2);
        let bounded = registry.identity_candidates("", 1).await.unwrap();
        assert_eq!(bounded.len(), 1);
    }

    #[tokio::test]
    async fn test_load_fixture_file() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(
            file,
            r#"{{
  "identities": [
    {{"identity_number": "3201234567890123", "full_name": "BUDI SANTOSO", "birth_date": "1995-05-15"}}
  ],
  "academics": [
    {{"diploma_number": "ABC/2018/00123", "full_name": "BUDI SANTOSO", "major": "Akuntansi", "education_level": "S1", "gpa": 3.45}}
  ]
}}"#
        )
        .unwrap();

        let registry = InMemoryRegistry::from_file(file.path()).unwrap();
        assert_eq!(registry.identity_count(), 1);
        assert_eq!(registry.academic_count(), 1);

        let person = registry.find_identity("3201234567890123").await.unwrap().unwrap();
        assert_eq!(person.birth_date, NaiveDate::from_ymd_opt(1995, 5, 15));
        let degree = registry.find_academic("ABC/2018/00123").await.unwrap().unwrap();
        assert_eq!(degree.gpa, Some(3.45));
    }

    #[test]
    fn test_invalid_fixture_is_configuration_error() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, "{{\"identities\": 3}}").unwrap();
        let err = InMemoryRegistry::from_file(file.path()).unwrap_err();
        assert!(err.is_configuration());
    }
}
