//! Extraction orchestrator: picks and chains text-recovery tiers per
//! document and never fails outright.
//!
//! 1. PDFs try their native text layer first, gated on length and failure
//!    sentinels.
//! 2. Otherwise each page image runs through the engine chain (local OCR,
//!    cloud OCR, generative OCR; cloud before local for handwritten types)
//!    until one produces enough text.
//! 3. Pages are recognized concurrently, bounded by the dispatch queue's
//!    concurrency, and merged in page order with delimiters.
//!
//! Every exhausted path degrades to [`ExtractionResult::failed`].

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;

use verifa_core::config::ExtractionConfig;
use verifa_core::error::{VerifyError, VerifyResult};
use verifa_core::events::{NoopObserver, PipelineEvent, SharedObserver};
use verifa_core::resilience::ResilientCaller;
use verifa_core::types::{DocumentType, EngineKind, ExtractionResult, RawDocument};

use crate::error::ExtractError;
use crate::factory::EngineSet;
use crate::image::is_image_mime;
use crate::types::{PageImage, Recognition};
use crate::{DocumentReader, OcrEngine};

/// Confidence assumed for a page whose engine reports none.
pub const DEFAULT_CONFIDENCE: f32 = 0.5;

/// Confidence of a native PDF text layer.
const TEXT_LAYER_CONFIDENCE: f32 = 1.0;

/// Text accepted for one page.
#[derive(Debug, Clone)]
struct PageOutcome {
    page: usize,
    engine: EngineKind,
    recognition: Recognition,
}

/// Runs the extraction tiers for one document at a time.
pub struct ExtractionOrchestrator {
    config: ExtractionConfig,
    engines: EngineSet,
    reader: Option<Arc<dyn DocumentReader>>,
    caller: ResilientCaller,
    observer: SharedObserver,
}

impl ExtractionOrchestrator {
    /// Create an orchestrator over `engines`, reading PDFs with the default
    /// reader when the `pdf` feature is enabled.
    pub fn new(config: ExtractionConfig, engines: EngineSet) -> Self {
        Self {
            config,
            engines,
            reader: default_reader(),
            caller: ResilientCaller::default(),
            observer: Arc::new(NoopObserver),
        }
    }

    pub fn with_reader(mut self, reader: Arc<dyn DocumentReader>) -> Self {
        self.reader = Some(reader);
        self
    }

    pub fn with_caller(mut self, caller: ResilientCaller) -> Self {
        self.caller = caller;
        self
    }

    /// Bind remote and local OCR to a request's cancellation token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.caller = self.caller.with_cancellation(token);
        self
    }

    pub fn with_observer(mut self, observer: SharedObserver) -> Self {
        self.observer = observer;
        self
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    pub fn caller(&self) -> &ResilientCaller {
        &self.caller
    }

    /// Recover the text of `doc` under the overall extraction deadline.
    pub async fn extract(&self, doc: &RawDocument) -> ExtractionResult {
        let deadline = self.config.deadline();
        match tokio::time::timeout(deadline, self.run(doc)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    document = %doc.doc_type,
                    secs = deadline.as_secs(),
                    "extraction deadline expired"
                );
                self.tier_failed(doc.doc_type, EngineKind::None, 0, "extraction deadline expired");
                ExtractionResult::failed(0)
            }
        }
    }

    async fn run(&self, doc: &RawDocument) -> ExtractionResult {
        let doc_type = doc.doc_type;

        let pages = if doc.is_pdf() {
            if let Some(result) = self.try_text_layer(doc).await {
                return result;
            }
            match self.page_images(doc).await {
                Some(pages) => pages,
                None => return ExtractionResult::failed(0),
            }
        } else if is_image_mime(&doc.mime_type) {
            vec![PageImage::new(1, doc.bytes.clone(), doc.mime_type.clone())]
        } else {
            let reason = ExtractError::UnsupportedType(doc.mime_type.clone()).to_string();
            tracing::warn!(document = %doc_type, %reason, "document not dispatched");
            self.tier_failed(doc_type, EngineKind::None, 0, reason);
            return ExtractionResult::failed(0);
        };

        let page_count = pages.len();
        let chain = self.engines.chain(self.config.is_handwritten(doc_type));
        if chain.is_empty() {
            tracing::warn!(document = %doc_type, "no OCR engine configured");
            self.tier_failed(doc_type, EngineKind::None, 0, "no OCR engine configured");
            return ExtractionResult::failed(page_count);
        }

        let workers = self.caller.max_concurrency().max(1);
        let outcomes: Vec<Option<PageOutcome>> = stream::iter(pages.iter())
            .map(|page| self.recognize_page(doc_type, page, &chain))
            .buffered(workers)
            .collect()
            .await;

        let numbered = pages.iter().map(|p| p.page).zip(outcomes).collect();
        self.merge(doc_type, numbered)
    }

    /// Text-layer tier. `None` means the gate rejected it.
    async fn try_text_layer(&self, doc: &RawDocument) -> Option<ExtractionResult> {
        let reader = self.reader.as_ref()?;
        let pages = match reader.text_layer(&doc.bytes).await {
            Ok(pages) => pages,
            Err(e) => {
                tracing::debug!(document = %doc.doc_type, error = %e, "no usable text layer");
                self.tier_failed(doc.doc_type, EngineKind::PdfText, 0, e.to_string());
                return None;
            }
        };

        let joined = pages.join("\n");
        if let Some(reason) = self.text_layer_rejection(&joined) {
            tracing::debug!(document = %doc.doc_type, %reason, "text layer rejected");
            self.tier_failed(doc.doc_type, EngineKind::PdfText, 0, reason);
            return None;
        }

        let page_texts: Vec<(usize, String)> = pages
            .into_iter()
            .enumerate()
            .map(|(i, text)| (i + 1, text))
            .collect();
        let page_count = page_texts.len();
        self.observer.on_event(&PipelineEvent::tier_selected(
            doc.doc_type,
            EngineKind::PdfText,
            0,
            TEXT_LAYER_CONFIDENCE,
        ));
        Some(ExtractionResult::new(
            self.join_pages(&page_texts, page_count),
            TEXT_LAYER_CONFIDENCE,
            EngineKind::PdfText,
            page_count,
        ))
    }

    /// Why a text layer fails the gate, if it does.
    fn text_layer_rejection(&self, text: &str) -> Option<String> {
        let lowered = text.to_lowercase();
        if let Some(sentinel) = self
            .config
            .failure_sentinels
            .iter()
            .find(|s| !s.is_empty() && lowered.contains(&s.to_lowercase()))
        {
            return Some(format!("text layer contains failure marker {:?}", sentinel));
        }
        let length = text.chars().filter(|c| !c.is_whitespace()).count();
        if length <= self.config.pdf_min_text_length {
            return Some(format!(
                "text layer too short ({} chars, need more than {})",
                length, self.config.pdf_min_text_length
            ));
        }
        None
    }

    async fn page_images(&self, doc: &RawDocument) -> Option<Vec<PageImage>> {
        let Some(reader) = self.reader.as_ref() else {
            tracing::warn!(document = %doc.doc_type, "PDF support not available");
            self.tier_failed(doc.doc_type, EngineKind::None, 0, "PDF support not available");
            return None;
        };
        match reader.page_images(&doc.bytes).await {
            Ok(pages) if !pages.is_empty() => Some(pages),
            Ok(_) => {
                self.tier_failed(doc.doc_type, EngineKind::None, 0, "PDF has no page images");
                None
            }
            Err(e) => {
                tracing::warn!(document = %doc.doc_type, error = %e, "page rasterization failed");
                self.tier_failed(doc.doc_type, EngineKind::None, 0, e.to_string());
                None
            }
        }
    }

    /// Walk the engine chain for one page. Text below the threshold moves on
    /// to the next tier but is kept as a last resort.
    async fn recognize_page(
        &self,
        doc_type: DocumentType,
        page: &PageImage,
        chain: &[Arc<dyn OcrEngine>],
    ) -> Option<PageOutcome> {
        let mut best: Option<PageOutcome> = None;

        for engine in chain {
            let kind = engine.kind();
            match self.run_engine(engine.as_ref(), page).await {
                Ok(recognition) if recognition.meaningful_len() >= self.config.min_ocr_text_length => {
                    return Some(self.select(doc_type, page.page, kind, recognition));
                }
                Ok(recognition) => {
                    let reason = format!(
                        "text below threshold ({} chars, need {})",
                        recognition.meaningful_len(),
                        self.config.min_ocr_text_length
                    );
                    tracing::debug!(document = %doc_type, page = page.page, engine = engine.name(), %reason);
                    self.tier_failed(doc_type, kind, page.page, reason);
                    let longer = best
                        .as_ref()
                        .map_or(true, |b| recognition.meaningful_len() > b.recognition.meaningful_len());
                    if !recognition.is_empty() && longer {
                        best = Some(PageOutcome {
                            page: page.page,
                            engine: kind,
                            recognition,
                        });
                    }
                }
                Err(e) if e.is_cancelled() => {
                    tracing::debug!(document = %doc_type, page = page.page, "page abandoned after cancellation");
                    return None;
                }
                Err(e) => {
                    tracing::warn!(
                        document = %doc_type,
                        page = page.page,
                        engine = engine.name(),
                        error = %e,
                        "OCR tier failed"
                    );
                    self.tier_failed(doc_type, kind, page.page, e.to_string());
                }
            }
        }

        best.map(|b| self.select(doc_type, b.page, b.engine, b.recognition))
    }

    /// Run one engine. Local OCR gets a hard timeout and runs outside the
    /// dispatch queue; remote tiers go through the resilient caller.
    async fn run_engine(&self, engine: &dyn OcrEngine, page: &PageImage) -> VerifyResult<Recognition> {
        let bytes = page.bytes.as_slice();
        let mime_type = page.mime_type.as_str();

        if engine.kind() != EngineKind::LocalOcr {
            return self
                .caller
                .call(move || async move {
                    engine
                        .recognize(bytes, mime_type)
                        .await
                        .map_err(VerifyError::from)
                })
                .await;
        }

        let limit = self.config.local_ocr_timeout();
        let cancel = self.caller.queue().cancellation();
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(VerifyError::Cancelled),
            outcome = tokio::time::timeout(limit, engine.recognize(bytes, mime_type)) => match outcome {
                Ok(result) => result.map_err(VerifyError::from),
                Err(_) => Err(ExtractError::Timeout {
                    engine: "local OCR",
                    secs: limit.as_secs(),
                }
                .into()),
            },
        }
    }

    fn select(
        &self,
        doc_type: DocumentType,
        page: usize,
        engine: EngineKind,
        recognition: Recognition,
    ) -> PageOutcome {
        self.observer.on_event(&PipelineEvent::tier_selected(
            doc_type,
            engine,
            page,
            recognition.confidence.unwrap_or(DEFAULT_CONFIDENCE),
        ));
        PageOutcome {
            page,
            engine,
            recognition,
        }
    }

    /// Merge per-page outcomes, in page order. A page no tier could read
    /// keeps its delimiter with empty text and counts as confidence 0.
    fn merge(&self, doc_type: DocumentType, pages: Vec<(usize, Option<PageOutcome>)>) -> ExtractionResult {
        let page_count = pages.len();
        let read: Vec<&PageOutcome> = pages.iter().filter_map(|(_, o)| o.as_ref()).collect();
        if read.is_empty() {
            tracing::warn!(document = %doc_type, pages = page_count, "all extraction tiers failed");
            return ExtractionResult::failed(page_count);
        }
        if read.len() < page_count {
            tracing::warn!(
                document = %doc_type,
                pages = page_count,
                unreadable = page_count - read.len(),
                "some pages yielded no text"
            );
        }

        let first = read[0].engine;
        let engine = if read.iter().all(|o| o.engine == first) {
            first
        } else {
            EngineKind::Mixed
        };
        let confidence = read
            .iter()
            .map(|o| o.recognition.confidence.unwrap_or(DEFAULT_CONFIDENCE))
            .sum::<f32>()
            / page_count as f32;

        let page_texts: Vec<(usize, String)> = pages
            .into_iter()
            .map(|(page, outcome)| (page, outcome.map(|o| o.recognition.text).unwrap_or_default()))
            .collect();

        ExtractionResult::new(
            self.join_pages(&page_texts, page_count),
            confidence,
            engine,
            page_count,
        )
    }

    /// Concatenate page texts in order; multi-page documents get a
    /// delimiter line before each page.
    fn join_pages(&self, pages: &[(usize, String)], page_count: usize) -> String {
        if page_count <= 1 {
            return pages
                .iter()
                .map(|(_, text)| text.trim())
                .collect::<Vec<_>>()
                .join("\n");
        }
        pages
            .iter()
            .map(|(page, text)| format!("{}\n{}", self.config.delimiter_for(*page), text.trim()))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    fn tier_failed(&self, doc_type: DocumentType, engine: EngineKind, page: usize, reason: impl Into<String>) {
        self.observer
            .on_event(&PipelineEvent::tier_failed(doc_type, engine, page, reason));
    }
}

#[cfg(feature = "pdf")]
fn default_reader() -> Option<Arc<dyn DocumentReader>> {
    Some(Arc::new(crate::pdf::PdfReader::new()))
}

#[cfg(not(feature = "pdf"))]
fn default_reader() -> Option<Arc<dyn DocumentReader>> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn orchestrator() -> ExtractionOrchestrator {
        ExtractionOrchestrator::new(ExtractionConfig::default(), EngineSet::new())
    }

    #[test]
    fn test_text_layer_gate() {
        let o = orchestrator();
        assert!(o.text_layer_rejection("short").is_some());
        assert!(o
            .text_layer_rejection(&"IJAZAH Universitas Padjadjaran ".repeat(4))
            .is_none());
        let sentinel = format!("{} [Extraction Failed]", "x".repeat(80));
        assert!(o.text_layer_rejection(&sentinel).unwrap().contains("failure marker"));
    }

    #[test]
    fn test_join_pages_delimits_multi_page_only() {
        let o = orchestrator();
        let single = o.join_pages(&[(1, " NIK 3201 ".to_string())], 1);
        assert_eq!(single, "NIK 3201");

        let multi = o.join_pages(&[(1, "a".to_string()), (2, "b".to_string())], 2);
        assert_eq!(multi, "--- Page 1 ---\na\n\n--- Page 2 ---\nb");
    }

    #[test]
    fn test_merge_means_confidence_and_marks_mixed() {
        let o = orchestrator();
        let outcomes = vec![
            (
                1,
                Some(PageOutcome {
                    page: 1,
                    engine: EngineKind::LocalOcr,
                    recognition: Recognition::new("page one text", Some(0.9)),
                }),
            ),
            (
                2,
                Some(PageOutcome {
                    page: 2,
                    engine: EngineKind::CloudOcr,
                    recognition: Recognition::new("page two text", None),
                }),
            ),
        ];
        let result = o.merge(DocumentType::Transcript, outcomes);

        assert_eq!(result.engine, EngineKind::Mixed);
        assert!((result.confidence - 0.7).abs() < 1e-6);
        assert_eq!(result.page_count, 2);
        assert!(result.text.contains("--- Page 2 ---\npage two text"));
    }

    #[test]
    fn test_merge_of_nothing_is_failed() {
        let result = orchestrator().merge(DocumentType::Identity, vec![(1, None), (2, None), (3, None)]);
        assert!(result.is_empty());
        assert!(result.confidence <= 0.1);
        assert_eq!(result.engine, EngineKind::None);
        assert_eq!(result.page_count, 3);
    }

    #[test]
    fn test_unreadable_pages_count_as_zero_confidence() {
        let read = PageOutcome {
            page: 1,
            engine: EngineKind::LocalOcr,
            recognition: Recognition::new("TRANSKRIP NILAI semester satu", Some(0.9)),
        };
        let result = orchestrator().merge(
            DocumentType::Transcript,
            vec![(1, Some(read)), (2, None), (3, None)],
        );

        assert!((result.confidence - 0.3).abs() < 1e-6);
        assert_eq!(result.engine, EngineKind::LocalOcr);
        assert_eq!(result.page_count, 3);
        assert_eq!(
            result.text,
            "--- Page 1 ---\nTRANSKRIP NILAI semester satu\n\n--- Page 2 ---\n\n\n--- Page 3 ---\n"
        );
    }
}
