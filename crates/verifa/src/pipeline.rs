//! End-to-end verification of single documents and document bundles.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use verifa_core::config::InputConfig;
use verifa_core::error::{VerifyError, VerifyResult};
use verifa_core::events::{NoopObserver, PipelineEvent, SharedObserver};
use verifa_core::resilience::DispatchQueue;
use verifa_core::types::{
    DocumentType, DocumentValidationResult, ExtractionResult, RawDocument, Verdict,
};
use verifa_core::validation::{CrossDocumentValidator, SiblingDocuments, ValidatedDocument};
use verifa_core::{aggregate, FieldExtractor};
use verifa_extractors::ExtractionOrchestrator;

/// Result handed to the consumer for one document.
#[derive(Debug, Clone, Serialize)]
pub struct VerificationOutcome {
    pub request_id: Uuid,
    pub document_type: DocumentType,
    /// SHA-256 of the submitted bytes.
    pub fingerprint: String,
    pub ocr: ExtractionResult,
    pub validation: DocumentValidationResult,
    pub verdict: Verdict,
}

/// Extraction, field extraction, validation and verdict for one request.
///
/// Built once per request; the stages share a cancellation token through
/// their resilient callers.
pub struct VerificationPipeline {
    input: InputConfig,
    orchestrator: ExtractionOrchestrator,
    extractor: FieldExtractor,
    validator: CrossDocumentValidator,
    observer: SharedObserver,
    cancel: CancellationToken,
}

impl VerificationPipeline {
    pub fn new(
        orchestrator: ExtractionOrchestrator,
        extractor: FieldExtractor,
        validator: CrossDocumentValidator,
    ) -> Self {
        Self {
            input: InputConfig::default(),
            orchestrator,
            extractor,
            validator,
            observer: Arc::new(NoopObserver),
            cancel: CancellationToken::new(),
        }
        .with_cancellation(CancellationToken::new())
    }

    pub fn with_input(mut self, input: InputConfig) -> Self {
        self.input = input;
        self
    }

    pub fn with_observer(mut self, observer: SharedObserver) -> Self {
        self.observer = observer;
        self
    }

    /// Token the stages' dispatch queues listen on. Cancelling it drops
    /// queued calls, abandons running ones and fails the verification in
    /// progress with [`VerifyError::Cancelled`].
    pub fn with_cancellation(self, token: CancellationToken) -> Self {
        Self {
            orchestrator: self.orchestrator.with_cancellation(token.clone()),
            extractor: self.extractor.with_cancellation(token.clone()),
            validator: self.validator.with_cancellation(token.clone()),
            cancel: token,
            ..self
        }
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Request-scoped handle on the dispatch queue the stages call through.
    pub fn dispatch_queue(&self) -> &DispatchQueue {
        self.orchestrator.caller().queue()
    }

    /// Verify one document against already-validated siblings.
    ///
    /// Fails only when the document is rejected at the input gate or the
    /// request is cancelled; every other failure is absorbed into the
    /// outcome.
    pub async fn verify(
        &self,
        doc: &RawDocument,
        siblings: &SiblingDocuments,
    ) -> VerifyResult<VerificationOutcome> {
        self.input.check(doc)?;

        let request_id = Uuid::new_v4();
        let fingerprint = doc.fingerprint();
        let span = tracing::info_span!(
            "verify",
            %request_id,
            document = %doc.doc_type,
            fingerprint = %fingerprint,
        );

        let work = async move {
            tracing::debug!(bytes = doc.len(), mime = %doc.mime_type, "document accepted");

            let ocr = self.orchestrator.extract(doc).await;
            let extraction = self.extractor.extract(doc.doc_type, &ocr).await;
            tracing::debug!(
                fields = extraction.fields.len(),
                gaps = extraction.gaps.len(),
                "fields extracted"
            );

            let validation = self
                .validator
                .validate(doc.doc_type, &ocr, extraction, siblings)
                .await;
            let verdict = aggregate(&validation);

            self.observer.on_event(&PipelineEvent::verdict_reached(
                doc.doc_type,
                verdict.status(),
                verdict.score(),
            ));
            tracing::info!(
                status = %verdict.status(),
                score = verdict.score(),
                errors = validation.errors.len(),
                warnings = validation.warnings.len(),
                "verdict reached"
            );

            Ok(VerificationOutcome {
                request_id,
                document_type: doc.doc_type,
                fingerprint,
                ocr,
                validation,
                verdict,
            })
        }
        .instrument(span);

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                tracing::warn!(%request_id, "verification cancelled");
                Err(VerifyError::Cancelled)
            }
            outcome = work => outcome,
        }
    }

    /// Verify a submission in dependency order (identity, diploma,
    /// transcript, application letter, statement letter) so each document
    /// sees the ones before it. Outcomes come back in that order.
    ///
    /// Every document passes the input gate before any work starts, and a
    /// bundle may hold at most one document per type.
    pub async fn verify_bundle(
        &self,
        mut documents: Vec<RawDocument>,
    ) -> VerifyResult<Vec<VerificationOutcome>> {
        let mut seen = HashSet::new();
        for doc in &documents {
            if !seen.insert(doc.doc_type) {
                return Err(VerifyError::validation(format!(
                    "bundle contains more than one {}",
                    doc.doc_type.label()
                )));
            }
            self.input.check(doc)?;
        }
        documents.sort_by_key(|doc| doc.doc_type);

        let mut siblings = SiblingDocuments::new();
        let mut outcomes = Vec::with_capacity(documents.len());
        for doc in &documents {
            if self.cancel.is_cancelled() {
                return Err(VerifyError::Cancelled);
            }
            let outcome = self.verify(doc, &siblings).await?;
            siblings.insert(ValidatedDocument::new(
                outcome.document_type,
                outcome.ocr.text.clone(),
                outcome.validation.extracted_data.clone(),
            ));
            outcomes.push(outcome);
        }

        tracing::info!(documents = outcomes.len(), "bundle verified");
        Ok(outcomes)
    }
}
