//! Factory for creating verification pipelines from configuration.

use std::path::Path;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use verifa_core::config::VerifaConfig;
use verifa_core::error::{VerifyError, VerifyResult};
use verifa_core::events::SharedObserver;
use verifa_core::registry::{InMemoryRegistry, SqliteRegistry};
use verifa_core::resilience::{DispatchQueue, ResilientCaller};
use verifa_core::traits::{AcademicRegistry, IdentityRegistry, Llm};
use verifa_core::validation::{CrossDocumentValidator, MajorJudge};
use verifa_core::FieldExtractor;
use verifa_extractors::{EngineFactory, ExtractionOrchestrator};
use verifa_llm::LlmFactory;

use crate::pipeline::VerificationPipeline;

/// The two read-only registry collaborators.
#[derive(Clone)]
pub struct Registries {
    pub identities: Arc<dyn IdentityRegistry>,
    pub academics: Arc<dyn AcademicRegistry>,
}

impl Registries {
    pub fn new(identities: Arc<dyn IdentityRegistry>, academics: Arc<dyn AcademicRegistry>) -> Self {
        Self {
            identities,
            academics,
        }
    }

    /// Registries with no records; every lookup misses.
    pub fn empty() -> Self {
        let registry = Arc::new(InMemoryRegistry::new());
        Self::new(registry.clone(), registry)
    }

    /// Open a JSON fixture (`.json`) or a SQLite database (anything else).
    pub fn from_path(path: impl AsRef<Path>) -> VerifyResult<Self> {
        let path = path.as_ref();
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        if is_json {
            let registry = Arc::new(InMemoryRegistry::from_file(path)?);
            tracing::info!(
                path = %path.display(),
                identities = registry.identity_count(),
                academics = registry.academic_count(),
                "loaded registry fixture"
            );
            Ok(Self::new(registry.clone(), registry))
        } else {
            let registry = Arc::new(SqliteRegistry::open(path)?);
            tracing::info!(path = %path.display(), "opened registry database");
            Ok(Self::new(registry.clone(), registry))
        }
    }
}

/// Create a request-scoped pipeline from configuration.
///
/// `queue` is the process-wide dispatch queue: every pipeline built from
/// the same queue shares its concurrency cap and dispatch spacing, while
/// getting its own cancellation token. Missing credentials for an enabled
/// collaborator fail here, before any document is processed.
pub fn create_pipeline(
    config: &VerifaConfig,
    registries: Registries,
    observer: SharedObserver,
    queue: &DispatchQueue,
) -> VerifyResult<VerificationPipeline> {
    let cancel = CancellationToken::new();
    let caller = ResilientCaller::new(queue.with_cancellation(cancel.clone()), config.retry.clone());

    let engines = EngineFactory::from_config(&config.ocr, &config.llm)?;
    if engines.is_empty() {
        return Err(VerifyError::Configuration(
            "No OCR engine is enabled; enable local, cloud or generative OCR".to_string(),
        ));
    }
    let orchestrator = ExtractionOrchestrator::new(config.extraction.clone(), engines)
        .with_caller(caller.clone())
        .with_observer(observer.clone());

    let llm = create_llm(config)?;

    let mut extractor = FieldExtractor::new(config.fields.clone(), config.requirements.today())
        .with_caller(caller.clone())
        .with_observer(observer.clone());
    let mut judge = MajorJudge::new(config.matching.clone())
        .with_caller(caller.clone())
        .with_min_response_length(config.fields.min_ai_response_length);
    if let Some(llm) = llm {
        extractor = extractor.with_llm(llm.clone(), config.llm.config.clone());
        judge = judge.with_llm(llm, config.llm.config.clone());
    }

    let validator = CrossDocumentValidator::new(
        config.requirements.clone(),
        config.matching.clone(),
        registries.identities,
        registries.academics,
    )
    .with_judge(judge)
    .with_observer(observer.clone());

    Ok(
        VerificationPipeline::new(orchestrator, extractor, validator)
            .with_input(config.input.clone())
            .with_observer(observer)
            .with_cancellation(cancel),
    )
}

fn create_llm(config: &VerifaConfig) -> VerifyResult<Option<Arc<dyn Llm>>> {
    if !config.fields.ai_enabled {
        tracing::debug!("generative extraction disabled");
        return Ok(None);
    }
    let llm = LlmFactory::from_config(&config.llm)?;
    tracing::debug!(model = llm.model_name(), "generative backend ready");
    Ok(Some(llm))
}

#[cfg(test)]
mod tests {
    use super::*;
    use verifa_core::config::OcrConfig;
    use std::time::Duration;
    use verifa_core::events::NoopObserver;

    fn queue() -> DispatchQueue {
        DispatchQueue::new(1, Duration::ZERO)
    }

    fn offline_config() -> VerifaConfig {
        let mut config = VerifaConfig::default();
        config.fields.ai_enabled = false;
        config.ocr = OcrConfig {
            enable_local: true,
            enable_cloud: false,
            enable_generative: false,
            ..Default::default()
        };
        config
    }

    #[test]
    fn test_pipeline_without_ai_needs_no_credentials() {
        let pipeline = create_pipeline(
            &offline_config(),
            Registries::empty(),
            Arc::new(NoopObserver),
            &queue(),
        );
        assert!(pipeline.is_ok());
    }

    #[test]
    fn test_cloud_ocr_without_key_is_fatal() {
        let mut config = offline_config();
        config.ocr.enable_cloud = true;
        config.ocr.cloud_api_key = None;

        let err = create_pipeline(&config, Registries::empty(), Arc::new(NoopObserver), &queue())
            .err()
            .unwrap();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_no_engines_is_fatal() {
        let mut config = offline_config();
        config.ocr.enable_local = false;

        let err = create_pipeline(&config, Registries::empty(), Arc::new(NoopObserver), &queue())
            .err()
            .unwrap();
        assert!(err.is_configuration());
    }

    #[tokio::test]
    async fn test_pipelines_share_the_dispatch_limit() {
        let shared = queue();
        let observer: SharedObserver = Arc::new(NoopObserver);
        let first = create_pipeline(&offline_config(), Registries::empty(), observer.clone(), &shared)
            .unwrap();
        let second = create_pipeline(&offline_config(), Registries::empty(), observer, &shared)
            .unwrap();

        let (release, hold) = tokio::sync::oneshot::channel::<()>();
        let busy = first.dispatch_queue().clone();
        let running = tokio::spawn(async move {
            busy.dispatch(async move {
                let _ = hold.await;
                Ok::<_, VerifyError>(())
            })
            .await
        });
        while second.dispatch_queue().in_flight() == 0 {
            tokio::task::yield_now().await;
        }

        // The only slot is held by the first request.
        let blocked = tokio::time::timeout(
            Duration::from_millis(50),
            second
                .dispatch_queue()
                .dispatch(async { Ok::<_, VerifyError>(()) }),
        )
        .await;
        assert!(blocked.is_err());

        // Cancellation stays per request.
        second.cancellation_token().cancel();
        assert!(!first.cancellation_token().is_cancelled());

        release.send(()).unwrap();
        assert!(running.await.unwrap().is_ok());
        assert_eq!(shared.in_flight(), 0);
    }

    #[test]
    fn test_registry_fixture_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.json");
        std::fs::write(
            &path,
            r#"{"identities": [{"identity_number": "3201234567890123", "full_name": "BUDI SANTOSO"}]}"#,
        )
        .unwrap();

        assert!(Registries::from_path(&path).is_ok());
        assert!(Registries::from_path(dir.path().join("missing.json")).is_err());
    }
}
