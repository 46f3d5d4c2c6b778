//! Tier selection, fallback and merge behavior of the extraction orchestrator.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use verifa_core::config::{ExtractionConfig, RetryConfig};
use verifa_core::events::{EventBus, PipelineEvent, SharedObserver};
use verifa_core::resilience::{DispatchQueue, ResilientCaller};
use verifa_core::types::{DocumentType, EngineKind, RawDocument};
use verifa_extractors::{
    DocumentReader, EngineSet, ExtractError, ExtractResult, ExtractionOrchestrator, OcrEngine,
    PageImage, Recognition,
};

const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

enum Reply {
    Text(&'static str, Option<f32>),
    RateLimited,
    Fail,
}

/// Engine that answers from a script and counts its calls.
struct ScriptedEngine {
    kind: EngineKind,
    name: &'static str,
    replies: Mutex<VecDeque<Reply>>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl ScriptedEngine {
    fn new(kind: EngineKind, name: &'static str, replies: Vec<Reply>) -> Arc<Self> {
        Arc::new(Self {
            kind,
            name,
            replies: Mutex::new(replies.into()),
            delay: None,
            calls: AtomicUsize::new(0),
        })
    }

    fn slow(kind: EngineKind, name: &'static str, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            kind,
            name,
            replies: Mutex::new(VecDeque::new()),
            delay: Some(delay),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OcrEngine for ScriptedEngine {
    async fn recognize(&self, _content: &[u8], _mime_type: &str) -> ExtractResult<Recognition> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let reply = self.replies.lock().unwrap().pop_front();
        match reply {
            Some(Reply::Text(text, confidence)) => Ok(Recognition::new(text, confidence)),
            Some(Reply::RateLimited) => Err(ExtractError::RateLimited("slow down".to_string())),
            Some(Reply::Fail) | None => Err(ExtractError::Ocr {
                engine: "scripted",
                message: "unreadable".to_string(),
            }),
        }
    }

    fn kind(&self) -> EngineKind {
        self.kind
    }

    fn name(&self) -> &str {
        self.name
    }
}

/// PDF reader with a canned text layer and page images.
struct FakeReader {
    text: Vec<String>,
    pages: usize,
}

#[async_trait]
impl DocumentReader for FakeReader {
    async fn text_layer(&self, _content: &[u8]) -> ExtractResult<Vec<String>> {
        Ok(self.text.clone())
    }

    async fn page_images(&self, _content: &[u8]) -> ExtractResult<Vec<PageImage>> {
        Ok((1..=self.pages)
            .map(|page| PageImage::new(page, PNG.to_vec(), "image/png"))
            .collect())
    }
}

const KTP_TEXT: &str = "PROVINSI JAWA BARAT\nNIK : 3201234567890001\nNama : BUDI SANTOSO";
const LETTER_TEXT: &str = "Saya yang bertanda tangan di bawah ini menyatakan dengan sebenarnya";

fn fast_caller() -> ResilientCaller {
    ResilientCaller::new(
        DispatchQueue::new(2, Duration::ZERO),
        RetryConfig {
            max_retries: 2,
            base_delay_ms: 1,
            max_delay_ms: 5,
            ..Default::default()
        },
    )
}

fn image(doc_type: DocumentType) -> RawDocument {
    RawDocument::new(doc_type, PNG.to_vec(), "image/png")
}

fn pdf(doc_type: DocumentType) -> RawDocument {
    RawDocument::new(doc_type, b"%PDF-1.5 fake".to_vec(), "application/pdf")
}

#[tokio::test]
async fn test_local_success_skips_cloud() {
    let local = ScriptedEngine::new(EngineKind::LocalOcr, "local", vec![Reply::Text(KTP_TEXT, Some(0.92))]);
    let cloud = ScriptedEngine::new(EngineKind::CloudOcr, "cloud", vec![Reply::Text(KTP_TEXT, Some(0.99))]);
    let engines = EngineSet::new()
        .with_local(local.clone())
        .with_cloud(cloud.clone());

    let orchestrator = ExtractionOrchestrator::new(ExtractionConfig::default(), engines)
        .with_caller(fast_caller());
    let result = orchestrator.extract(&image(DocumentType::Identity)).await;

    assert_eq!(result.engine, EngineKind::LocalOcr);
    assert_eq!(result.text, KTP_TEXT);
    assert!((result.confidence - 0.92).abs() < 1e-6);
    assert_eq!(result.page_count, 1);
    assert_eq!(local.calls(), 1);
    assert_eq!(cloud.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_local_timeout_falls_through_to_cloud() {
    let local = ScriptedEngine::slow(EngineKind::LocalOcr, "local", Duration::from_secs(60));
    let cloud = ScriptedEngine::new(EngineKind::CloudOcr, "cloud", vec![Reply::Text(KTP_TEXT, Some(0.8))]);
    let engines = EngineSet::new()
        .with_local(local.clone())
        .with_cloud(cloud.clone());

    let bus = Arc::new(EventBus::new());
    let mut events = bus.subscribe();
    let orchestrator = ExtractionOrchestrator::new(ExtractionConfig::default(), engines)
        .with_caller(fast_caller())
        .with_observer(bus.clone() as SharedObserver);
    let result = orchestrator.extract(&image(DocumentType::Identity)).await;

    assert_eq!(result.engine, EngineKind::CloudOcr);
    assert_eq!(local.calls(), 1);
    assert_eq!(cloud.calls(), 1);

    let failed: Vec<String> = events
        .drain()
        .into_iter()
        .filter_map(|e| match e {
            PipelineEvent::ExtractionTierFailed { engine, reason, .. } => {
                assert_eq!(engine, EngineKind::LocalOcr);
                Some(reason)
            }
            _ => None,
        })
        .collect();
    assert_eq!(failed.len(), 1);
    assert!(failed[0].contains("timed out"));
}

#[tokio::test]
async fn test_handwritten_type_tries_cloud_first() {
    let local = ScriptedEngine::new(EngineKind::LocalOcr, "local", vec![Reply::Text(LETTER_TEXT, Some(0.6))]);
    let cloud = ScriptedEngine::new(EngineKind::CloudOcr, "cloud", vec![Reply::Text(LETTER_TEXT, Some(0.88))]);
    let engines = EngineSet::new()
        .with_local(local.clone())
        .with_cloud(cloud.clone());

    let orchestrator = ExtractionOrchestrator::new(ExtractionConfig::default(), engines)
        .with_caller(fast_caller());
    let result = orchestrator.extract(&image(DocumentType::StatementLetter)).await;

    assert_eq!(result.engine, EngineKind::CloudOcr);
    assert_eq!(cloud.calls(), 1);
    assert_eq!(local.calls(), 0);
}

#[tokio::test]
async fn test_pdf_text_layer_is_accepted() {
    let local = ScriptedEngine::new(EngineKind::LocalOcr, "local", vec![]);
    let reader = FakeReader {
        text: vec!["IJAZAH\nUniversitas Padjadjaran\nProgram Studi Akuntansi Syariah\nIPK 3,45".to_string()],
        pages: 1,
    };

    let orchestrator =
        ExtractionOrchestrator::new(ExtractionConfig::default(), EngineSet::new().with_local(local.clone()))
            .with_reader(Arc::new(reader))
            .with_caller(fast_caller());
    let result = orchestrator.extract(&pdf(DocumentType::Diploma)).await;

    assert_eq!(result.engine, EngineKind::PdfText);
    assert_eq!(result.confidence, 1.0);
    assert!(result.text.contains("Akuntansi Syariah"));
    assert!(!result.text.contains("--- Page"));
    assert_eq!(local.calls(), 0);
}

#[tokio::test]
async fn test_sentinel_forces_page_ocr_and_merge() {
    let local = ScriptedEngine::new(
        EngineKind::LocalOcr,
        "local",
        vec![
            Reply::Text("TRANSKRIP NILAI semester satu lengkap", Some(0.9)),
            Reply::Text("IPK kumulatif 3,45 dari 4,00 skala", Some(0.7)),
        ],
    );
    let reader = FakeReader {
        text: vec![format!("{} [extraction failed]", "x".repeat(100))],
        pages: 2,
    };

    let orchestrator =
        ExtractionOrchestrator::new(ExtractionConfig::default(), EngineSet::new().with_local(local.clone()))
            .with_reader(Arc::new(reader))
            .with_caller(fast_caller());
    let result = orchestrator.extract(&pdf(DocumentType::Transcript)).await;

    assert_eq!(result.engine, EngineKind::LocalOcr);
    assert_eq!(result.page_count, 2);
    assert!((result.confidence - 0.8).abs() < 1e-6);

    let first = result.text.find("--- Page 1 ---").unwrap();
    let second = result.text.find("--- Page 2 ---").unwrap();
    assert!(first < second);
    assert_eq!(local.calls(), 2);
}

#[tokio::test]
async fn test_all_tiers_failing_degrades_to_empty_result() {
    let local = ScriptedEngine::new(EngineKind::LocalOcr, "local", vec![Reply::Fail]);
    let cloud = ScriptedEngine::new(EngineKind::CloudOcr, "cloud", vec![Reply::Fail]);
    let generative = ScriptedEngine::new(EngineKind::Generative, "vision", vec![Reply::Fail]);
    let engines = EngineSet::new()
        .with_local(local)
        .with_cloud(cloud)
        .with_generative(generative);

    let bus = Arc::new(EventBus::new());
    let mut events = bus.subscribe();
    let orchestrator = ExtractionOrchestrator::new(ExtractionConfig::default(), engines)
        .with_caller(fast_caller())
        .with_observer(bus.clone() as SharedObserver);
    let result = orchestrator.extract(&image(DocumentType::Identity)).await;

    assert!(result.is_empty());
    assert!(result.confidence <= 0.1);
    assert_eq!(result.engine, EngineKind::None);

    let failures = events
        .drain()
        .into_iter()
        .filter(|e| matches!(e, PipelineEvent::ExtractionTierFailed { .. }))
        .count();
    assert_eq!(failures, 3);
}

#[tokio::test]
async fn test_short_text_kept_as_last_resort() {
    let local = ScriptedEngine::new(EngineKind::LocalOcr, "local", vec![Reply::Text("NIK 3201", Some(0.4))]);
    let cloud = ScriptedEngine::new(EngineKind::CloudOcr, "cloud", vec![Reply::Fail]);
    let engines = EngineSet::new().with_local(local).with_cloud(cloud);

    let orchestrator = ExtractionOrchestrator::new(ExtractionConfig::default(), engines)
        .with_caller(fast_caller());
    let result = orchestrator.extract(&image(DocumentType::Identity)).await;

    assert_eq!(result.text, "NIK 3201");
    assert_eq!(result.engine, EngineKind::LocalOcr);
}

#[tokio::test]
async fn test_rate_limited_cloud_is_retried() {
    let cloud = ScriptedEngine::new(
        EngineKind::CloudOcr,
        "cloud",
        vec![Reply::RateLimited, Reply::Text(KTP_TEXT, Some(0.95))],
    );

    let orchestrator =
        ExtractionOrchestrator::new(ExtractionConfig::default(), EngineSet::new().with_cloud(cloud.clone()))
            .with_caller(fast_caller());
    let result = orchestrator.extract(&image(DocumentType::Identity)).await;

    assert_eq!(result.engine, EngineKind::CloudOcr);
    assert_eq!(cloud.calls(), 2);
}

#[tokio::test]
async fn test_unsupported_mime_fails_without_calling_engines() {
    let local = ScriptedEngine::new(EngineKind::LocalOcr, "local", vec![Reply::Text(KTP_TEXT, None)]);
    let orchestrator =
        ExtractionOrchestrator::new(ExtractionConfig::default(), EngineSet::new().with_local(local.clone()));

    let doc = RawDocument::new(DocumentType::Identity, b"PK\x03\x04".to_vec(), "application/zip");
    let result = orchestrator.extract(&doc).await;

    assert!(result.is_empty());
    assert_eq!(local.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_deadline_expiry_returns_failed_result() {
    let cloud = ScriptedEngine::slow(EngineKind::CloudOcr, "cloud", Duration::from_secs(600));
    let config = ExtractionConfig {
        deadline_secs: 5,
        ..Default::default()
    };

    let orchestrator = ExtractionOrchestrator::new(config, EngineSet::new().with_cloud(cloud.clone()))
        .with_caller(fast_caller());
    let result = orchestrator.extract(&image(DocumentType::Identity)).await;

    assert!(result.is_empty());
    assert_eq!(result.confidence, 0.0);
    assert_eq!(cloud.calls(), 1);
}

#[tokio::test]
async fn test_cancelled_request_calls_no_engine() {
    let local = ScriptedEngine::new(EngineKind::LocalOcr, "local", vec![Reply::Text(KTP_TEXT, Some(0.9))]);
    let cloud = ScriptedEngine::new(EngineKind::CloudOcr, "cloud", vec![Reply::Text(KTP_TEXT, Some(0.9))]);
    let engines = EngineSet::new()
        .with_local(local.clone())
        .with_cloud(cloud.clone());

    let token = tokio_util::sync::CancellationToken::new();
    let orchestrator = ExtractionOrchestrator::new(ExtractionConfig::default(), engines)
        .with_caller(fast_caller())
        .with_cancellation(token.clone());
    token.cancel();

    let result = orchestrator.extract(&image(DocumentType::Identity)).await;

    assert!(result.is_empty());
    assert_eq!(local.calls(), 0);
    assert_eq!(cloud.calls(), 0);
}

#[tokio::test]
async fn test_unreadable_pages_lower_document_confidence() {
    let local = ScriptedEngine::new(
        EngineKind::LocalOcr,
        "local",
        vec![
            Reply::Text("TRANSKRIP NILAI semester satu lengkap", Some(0.9)),
            Reply::Fail,
            Reply::Fail,
        ],
    );
    let reader = FakeReader {
        text: Vec::new(),
        pages: 3,
    };

    let orchestrator =
        ExtractionOrchestrator::new(ExtractionConfig::default(), EngineSet::new().with_local(local.clone()))
            .with_reader(Arc::new(reader))
            .with_caller(fast_caller());
    let result = orchestrator.extract(&pdf(DocumentType::Transcript)).await;

    assert_eq!(result.page_count, 3);
    assert!((result.confidence - 0.3).abs() < 1e-6);
    for page in 1..=3 {
        assert!(result.text.contains(&format!("--- Page {} ---", page)));
    }
    assert_eq!(local.calls(), 3);
}
