//! End-to-end verification with scripted OCR engines and in-memory registries.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;

use verifa::{Registries, VerificationPipeline};
use verifa_core::config::{FieldConfig, MatchingConfig, Requirements, RetryConfig};
use verifa_core::events::{EventBus, PipelineEvent, SharedObserver};
use verifa_core::registry::InMemoryRegistry;
use verifa_core::resilience::{DispatchQueue, ResilientCaller};
use verifa_core::types::{
    AcademicRecord, CheckCategory, CheckStatus, DocumentType, EducationLevel, EngineKind,
    FieldName, FieldSource, IdentityRecord, RawDocument, VerdictStatus,
};
use verifa_core::validation::{CrossDocumentValidator, SiblingDocuments};
use verifa_core::{ExtractionConfig, FieldExtractor, VerifyError};
use verifa_extractors::{
    EngineSet, ExtractError, ExtractResult, ExtractionOrchestrator, OcrEngine, Recognition,
};

/// Local OCR engine that reads the page bytes as a key into canned texts.
struct CannedOcr {
    pages: HashMap<Vec<u8>, &'static str>,
}

#[async_trait]
impl OcrEngine for CannedOcr {
    async fn recognize(&self, content: &[u8], _mime_type: &str) -> ExtractResult<Recognition> {
        match self.pages.get(content) {
            Some(text) => Ok(Recognition::new(*text, Some(0.9))),
            None => Err(ExtractError::Ocr {
                engine: "canned",
                message: "blank page".to_string(),
            }),
        }
    }

    fn kind(&self) -> EngineKind {
        EngineKind::LocalOcr
    }

    fn name(&self) -> &str {
        "canned"
    }
}

const KTP: &str = "PROVINSI JAWA BARAT
KABUPATEN BANDUNG
NIK : 3201234567890123
Nama : BUDI SANTOSO
Tempat/Tgl Lahir : BANDUNG, 01-01-1985
Jenis Kelamin : LAKI-LAKI
~~ #@! berlaku hingga SEUMUR HIDUP";

const IJAZAH: &str = "UNIVERSITAS PADJADJARAN
IJAZAH
Nomor Ijazah : UNPAD/2019/00123
diberikan kepada
BUDI SANTOSO
Program Studi : Akuntansi Syariah
Jenjang : S1
Tahun Lulus 2019";

fn png_key(tag: &str) -> Vec<u8> {
    let mut bytes = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    bytes.extend_from_slice(tag.as_bytes());
    bytes
}

fn document(doc_type: DocumentType, tag: &str) -> RawDocument {
    RawDocument::new(doc_type, png_key(tag), "image/png")
}

fn registry() -> InMemoryRegistry {
    InMemoryRegistry::new()
        .with_identity(
            IdentityRecord::new("3201234567890123", "BUDI SANTOSO")
                .with_birth_date(NaiveDate::from_ymd_opt(1995, 5, 15).unwrap())
                .with_province("JAWA BARAT"),
        )
        .with_academic(AcademicRecord {
            diploma_number: "UNPAD/2019/00123".to_string(),
            full_name: "BUDI SANTOSO".to_string(),
            identity_number: Some("3201234567890123".to_string()),
            institution: Some("Universitas Padjadjaran".to_string()),
            major: Some("Akuntansi Syariah".to_string()),
            education_level: Some(EducationLevel::S1),
            gpa: None,
            graduation_year: Some(2019),
        })
}

fn requirements() -> Requirements {
    Requirements {
        required_majors: vec!["Akuntansi".to_string()],
        reference_date: NaiveDate::from_ymd_opt(2026, 6, 1),
        ..Default::default()
    }
}

fn caller() -> ResilientCaller {
    ResilientCaller::new(
        DispatchQueue::new(2, Duration::ZERO),
        RetryConfig {
            max_retries: 1,
            base_delay_ms: 1,
            max_delay_ms: 2,
            ..Default::default()
        },
    )
}

fn pipeline(observer: SharedObserver) -> VerificationPipeline {
    let ocr = CannedOcr {
        pages: HashMap::from([(png_key("ktp"), KTP), (png_key("ijazah"), IJAZAH)]),
    };
    let caller = caller();
    let requirements = requirements();
    let registries = {
        let registry = Arc::new(registry());
        Registries::new(registry.clone(), registry)
    };

    let orchestrator =
        ExtractionOrchestrator::new(ExtractionConfig::default(), EngineSet::new().with_local(Arc::new(ocr)))
            .with_caller(caller.clone())
            .with_observer(observer.clone());
    let extractor = FieldExtractor::new(FieldConfig::default(), requirements.today())
        .with_caller(caller)
        .with_observer(observer.clone());
    let validator = CrossDocumentValidator::new(
        requirements,
        MatchingConfig::default(),
        registries.identities,
        registries.academics,
    )
    .with_observer(observer.clone());

    VerificationPipeline::new(orchestrator, extractor, validator).with_observer(observer)
}

#[tokio::test]
async fn test_identity_age_comes_from_registry() {
    let bus = Arc::new(EventBus::new());
    let mut events = bus.subscribe();
    let pipeline = pipeline(bus.clone());

    let outcome = pipeline
        .verify(&document(DocumentType::Identity, "ktp"), &SiblingDocuments::new())
        .await
        .unwrap();

    let nik = outcome
        .validation
        .extracted_data
        .get(FieldName::IdentityNumber)
        .unwrap();
    assert_eq!(nik.source, FieldSource::Pattern);
    assert_eq!(
        outcome.validation.extracted_data.text(FieldName::IdentityNumber).as_deref(),
        Some("3201234567890123")
    );

    let registry = outcome.validation.check(CheckCategory::Registry).unwrap();
    assert_eq!(registry.status, CheckStatus::Passed);

    let age = outcome.validation.check(CheckCategory::Age).unwrap();
    assert_eq!(age.status, CheckStatus::Passed);
    assert_eq!(age.extracted_value.as_deref(), Some("31"));
    assert_eq!(
        outcome.validation.extracted_data.date(FieldName::BirthDate),
        NaiveDate::from_ymd_opt(1995, 5, 15)
    );

    assert_ne!(outcome.verdict.status(), VerdictStatus::Rejected);
    assert_eq!(outcome.ocr.engine, EngineKind::LocalOcr);
    assert_eq!(outcome.fingerprint.len(), 64);

    let verdicts = events
        .drain()
        .into_iter()
        .filter(|e| matches!(e, PipelineEvent::VerdictReached { .. }))
        .count();
    assert_eq!(verdicts, 1);
}

#[tokio::test]
async fn test_related_major_passes() {
    let pipeline = pipeline(Arc::new(verifa_core::NoopObserver));

    let outcome = pipeline
        .verify(&document(DocumentType::Diploma, "ijazah"), &SiblingDocuments::new())
        .await
        .unwrap();

    let major = outcome.validation.check(CheckCategory::Major).unwrap();
    assert_eq!(major.status, CheckStatus::Passed);
    assert!(major.similarity.unwrap() >= 90);
    assert_eq!(major.extracted_value.as_deref(), Some("Akuntansi Syariah"));
}

#[tokio::test]
async fn test_blank_scan_degrades_to_warnings() {
    let pipeline = pipeline(Arc::new(verifa_core::NoopObserver));

    let outcome = pipeline
        .verify(&document(DocumentType::StatementLetter, "blank"), &SiblingDocuments::new())
        .await
        .unwrap();

    assert!(outcome.ocr.is_empty());
    assert!(outcome.ocr.confidence <= 0.1);
    assert!(outcome.validation.extracted_data.is_empty());
    assert_eq!(
        outcome.validation.check(CheckCategory::Extraction).unwrap().status,
        CheckStatus::Warning
    );
    assert!(outcome.validation.errors.is_empty());
    assert_eq!(outcome.verdict.status(), VerdictStatus::NeedReview);
}

#[tokio::test]
async fn test_bundle_runs_in_dependency_order() {
    let pipeline = pipeline(Arc::new(verifa_core::NoopObserver));

    // Submitted out of order on purpose.
    let outcomes = pipeline
        .verify_bundle(vec![
            document(DocumentType::Diploma, "ijazah"),
            document(DocumentType::Identity, "ktp"),
        ])
        .await
        .unwrap();

    assert_eq!(outcomes.len(), 2);
    assert_eq!(outcomes[0].document_type, DocumentType::Identity);
    assert_eq!(outcomes[1].document_type, DocumentType::Diploma);

    // The diploma saw the identity card and found the same holder.
    let consistency = outcomes[1]
        .validation
        .check(CheckCategory::Consistency)
        .unwrap();
    assert_eq!(consistency.status, CheckStatus::Passed);
    assert_ne!(outcomes[0].request_id, outcomes[1].request_id);
}

#[tokio::test]
async fn test_input_gate_rejects_before_extraction() {
    let pipeline = pipeline(Arc::new(verifa_core::NoopObserver));

    let zip = RawDocument::new(DocumentType::Identity, b"PK\x03\x04".to_vec(), "application/zip");
    let err = pipeline.verify(&zip, &SiblingDocuments::new()).await.unwrap_err();
    assert!(matches!(err, VerifyError::Validation { .. }));

    let empty = RawDocument::new(DocumentType::Identity, Vec::new(), "image/png");
    assert!(pipeline.verify(&empty, &SiblingDocuments::new()).await.is_err());
}

#[tokio::test]
async fn test_bundle_rejects_duplicate_types() {
    let pipeline = pipeline(Arc::new(verifa_core::NoopObserver));

    let result = pipeline
        .verify_bundle(vec![
            document(DocumentType::Identity, "ktp"),
            document(DocumentType::Identity, "ktp"),
        ])
        .await;
    assert!(result.is_err());
}

#[test]
fn test_outcome_serializes_contract_keys() {
    let outcome = tokio_test::block_on(async {
        pipeline(Arc::new(verifa_core::NoopObserver))
            .verify(&document(DocumentType::Identity, "ktp"), &SiblingDocuments::new())
            .await
            .unwrap()
    });

    let json = serde_json::to_value(&outcome).unwrap();
    for key in ["ocr", "validation", "verdict"] {
        assert!(json.get(key).is_some(), "missing {}", key);
    }
}

#[tokio::test]
async fn test_registry_outage_is_absorbed_as_warning() {
    use verifa_core::traits::{MockAcademicRegistry, MockIdentityRegistry};

    let mut identities = MockIdentityRegistry::new();
    identities
        .expect_find_identity()
        .times(1)
        .returning(|_| Err(VerifyError::registry("connection refused")));
    identities.expect_identity_candidates().never();

    let ocr = CannedOcr {
        pages: HashMap::from([(png_key("ktp"), KTP)]),
    };
    let requirements = requirements();
    let orchestrator =
        ExtractionOrchestrator::new(ExtractionConfig::default(), EngineSet::new().with_local(Arc::new(ocr)))
            .with_caller(caller());
    let extractor = FieldExtractor::new(FieldConfig::default(), requirements.today());
    let validator = CrossDocumentValidator::new(
        requirements,
        MatchingConfig::default(),
        Arc::new(identities),
        Arc::new(MockAcademicRegistry::new()),
    );
    let pipeline = VerificationPipeline::new(orchestrator, extractor, validator);

    let outcome = pipeline
        .verify(&document(DocumentType::Identity, "ktp"), &SiblingDocuments::new())
        .await
        .unwrap();

    assert_eq!(
        outcome.validation.check(CheckCategory::Registry).unwrap().status,
        CheckStatus::Warning
    );
    // Without the registry the printed birth date is all there is.
    let age = outcome.validation.check(CheckCategory::Age).unwrap();
    assert_eq!(age.status, CheckStatus::Failed);
    assert_eq!(age.extracted_value.as_deref(), Some("41"));
    assert_eq!(outcome.validation.errors.len(), 1);
}

#[tokio::test]
async fn test_cancelled_pipeline_abandons_verification() {
    let bus = Arc::new(EventBus::new());
    let mut events = bus.subscribe();
    let token = tokio_util::sync::CancellationToken::new();
    let pipeline = pipeline(bus.clone()).with_cancellation(token.clone());
    assert!(!pipeline.cancellation_token().is_cancelled());

    token.cancel();
    assert!(pipeline.cancellation_token().is_cancelled());

    let err = pipeline
        .verify(&document(DocumentType::Identity, "ktp"), &SiblingDocuments::new())
        .await
        .unwrap_err();
    assert!(err.is_cancelled());
    assert!(events.drain().is_empty());

    let bundle = pipeline
        .verify_bundle(vec![document(DocumentType::Identity, "ktp")])
        .await;
    assert!(matches!(bundle, Err(VerifyError::Cancelled)));
}
