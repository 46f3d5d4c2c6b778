//! Field extractor: ordered strategies over extracted document text.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum::Display;
use tokio_util::sync::CancellationToken;

use super::ai::{self, AiValue};
use super::normalize::{field_value, normalize_code};
use super::patterns::{self, Candidate};
use crate::config::FieldConfig;
use crate::events::{NoopObserver, PipelineEvent, SharedObserver};
use crate::prompts;
use crate::resilience::ResilientCaller;
use crate::traits::{GenerationOptions, Llm, LlmConfig, ResponseFormat};
use crate::types::{
    DocumentType, ExtractedField, ExtractionResult, FieldName, FieldSet, FieldSource, FieldValue,
    Message,
};

/// Weight applied to matches found only after OCR-noise normalization.
const NORMALIZED_FACTOR: f32 = 0.9;

/// One extraction strategy. The order they run in is data, see
/// [`FieldExtractor::strategies_for`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Regex anchored to a label token.
    Labeled,
    /// Shape match anywhere in the text, range-validated.
    Structural,
    /// Labeled and structural again over OCR-noise-normalized text for
    /// code-like fields; derived fields are re-derived.
    Normalized,
    /// Schema-directed generative extraction.
    Ai,
}

/// Default order: deterministic strategies first, generative last.
pub const DEFAULT_STRATEGIES: &[Strategy] = &[
    Strategy::Labeled,
    Strategy::Structural,
    Strategy::Normalized,
    Strategy::Ai,
];

/// Order for document types configured to ask the model first.
pub const AI_FIRST_STRATEGIES: &[Strategy] = &[
    Strategy::Ai,
    Strategy::Labeled,
    Strategy::Structural,
    Strategy::Normalized,
];

/// Fields expected on each document type.
pub fn fields_for(doc_type: DocumentType) -> &'static [FieldName] {
    match doc_type {
        DocumentType::Identity => &[
            FieldName::IdentityNumber,
            FieldName::FullName,
            FieldName::BirthPlace,
            FieldName::BirthDate,
            FieldName::Gender,
            FieldName::Province,
            FieldName::City,
        ],
        DocumentType::Diploma => &[
            FieldName::DiplomaNumber,
            FieldName::FullName,
            FieldName::Institution,
            FieldName::Major,
            FieldName::EducationLevel,
            FieldName::GraduationYear,
        ],
        DocumentType::Transcript => &[
            FieldName::FullName,
            FieldName::Institution,
            FieldName::Major,
            FieldName::Gpa,
        ],
        DocumentType::ApplicationLetter | DocumentType::StatementLetter => &[FieldName::FullName],
    }
}

/// Fields found for one document, plus the expected fields that no
/// strategy could extract.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FieldExtraction {
    pub fields: FieldSet,
    pub gaps: Vec<FieldName>,
}

/// Model and sampling settings for the generative strategy.
struct AiBackend {
    llm: Arc<dyn Llm>,
    settings: LlmConfig,
}

/// Extracts named fields from raw text.
pub struct FieldExtractor {
    config: FieldConfig,
    today: NaiveDate,
    caller: ResilientCaller,
    ai: Option<AiBackend>,
    observer: SharedObserver,
}

impl FieldExtractor {
    /// Create an extractor without a generative backend.
    ///
    /// `today` bounds plausible dates and resolves two-digit birth years.
    pub fn new(config: FieldConfig, today: NaiveDate) -> Self {
        Self {
            config,
            today,
            caller: ResilientCaller::default(),
            ai: None,
            observer: Arc::new(NoopObserver),
        }
    }

    /// Enable the generative strategy.
    pub fn with_llm(mut self, llm: Arc<dyn Llm>, settings: LlmConfig) -> Self {
        self.ai = Some(AiBackend { llm, settings });
        self
    }

    /// Route generative calls through `caller`.
    pub fn with_caller(mut self, caller: ResilientCaller) -> Self {
        self.caller = caller;
        self
    }

    /// Bind generative calls to a request's cancellation token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.caller = self.caller.with_cancellation(token);
        self
    }

    pub fn with_observer(mut self, observer: SharedObserver) -> Self {
        self.observer = observer;
        self
    }

    /// Strategy order for a document type.
    pub fn strategies_for(&self, doc_type: DocumentType) -> &'static [Strategy] {
        if self.config.ai_first_types.contains(&doc_type) {
            AI_FIRST_STRATEGIES
        } else {
            DEFAULT_STRATEGIES
        }
    }

    /// Run every strategy in order until all expected fields are found.
    ///
    /// Never fails: fields no strategy finds are reported as gaps.
    pub async fn extract(&self, doc_type: DocumentType, ocr: &ExtractionResult) -> FieldExtraction {
        let text = ocr.text.replace('\r', "");
        let wanted = fields_for(doc_type);
        let mut fields = FieldSet::new();

        if !text.trim().is_empty() {
            let mut normalized: Option<String> = None;

            for strategy in self.strategies_for(doc_type) {
                let missing: Vec<FieldName> = wanted
                    .iter()
                    .copied()
                    .filter(|f| !fields.contains(*f))
                    .collect();
                if missing.is_empty() {
                    break;
                }

                match strategy {
                    Strategy::Labeled => {
                        for field in missing {
                            let found = patterns::labeled(field, &text, self.today);
                            self.accept(doc_type, &mut fields, field, found, ocr.confidence);
                        }
                    }
                    Strategy::Structural => {
                        for field in missing {
                            let found = patterns::structural(field, &text, self.today, &fields);
                            self.accept(doc_type, &mut fields, field, found, ocr.confidence);
                        }
                    }
                    Strategy::Normalized => {
                        let normalized: &str =
                            normalized.get_or_insert_with(|| normalize_code(&text));
                        for field in missing {
                            let found = if patterns::is_code_field(field) {
                                patterns::labeled(field, normalized, self.today)
                                    .or_else(|| {
                                        patterns::structural(field, normalized, self.today, &fields)
                                    })
                                    .map(|mut c| {
                                        c.weight *= NORMALIZED_FACTOR;
                                        c
                                    })
                            } else if patterns::is_derived_field(field) {
                                // The identity number may only have appeared in this pass.
                                patterns::structural(field, &text, self.today, &fields)
                            } else {
                                None
                            };
                            self.accept(doc_type, &mut fields, field, found, ocr.confidence);
                        }
                    }
                    Strategy::Ai => {
                        self.extract_with_ai(doc_type, &text, &missing, &mut fields)
                            .await;
                    }
                }
            }
        }

        let gaps: Vec<FieldName> = wanted
            .iter()
            .copied()
            .filter(|f| !fields.contains(*f))
            .collect();
        for gap in &gaps {
            self.observer
                .on_event(&PipelineEvent::field_gap(doc_type, *gap));
        }

        FieldExtraction { fields, gaps }
    }

    fn accept(
        &self,
        doc_type: DocumentType,
        fields: &mut FieldSet,
        field: FieldName,
        candidate: Option<Candidate>,
        ocr_confidence: f32,
    ) {
        let Some(candidate) = candidate else {
            return;
        };
        let extracted = ExtractedField::new(
            field,
            candidate.raw,
            candidate.value,
            candidate.weight * ocr_confidence,
            FieldSource::Pattern,
        );
        if fields.insert(field, extracted) {
            self.observer.on_event(&PipelineEvent::field_extracted(
                doc_type,
                field,
                FieldSource::Pattern,
            ));
        }
    }

    /// One batched generative call for every missing field, attempted up to
    /// `ai_attempts` times while the response is malformed. Call failures
    /// end the strategy; they are never propagated.
    async fn extract_with_ai(
        &self,
        doc_type: DocumentType,
        text: &str,
        missing: &[FieldName],
        fields: &mut FieldSet,
    ) {
        let Some(backend) = self.ai.as_ref().filter(|_| self.config.ai_enabled) else {
            return;
        };

        let messages = vec![
            Message::system(prompts::field_extraction_prompt(doc_type, missing)),
            Message::user(text),
        ];
        let attempts = self.config.ai_attempts.max(1);

        for attempt in 1..=attempts {
            let response = self
                .caller
                .execute(&backend.settings.model, |model| {
                    let llm = backend.llm.clone();
                    let messages = messages.clone();
                    let options = GenerationOptions {
                        model: Some(model),
                        temperature: Some(backend.settings.temperature),
                        max_tokens: Some(backend.settings.max_tokens),
                        response_format: Some(ResponseFormat::Json),
                    };
                    async move { llm.generate(&messages, Some(options)).await }
                })
                .await;

            let response = match response {
                Ok(response) => response,
                Err(e) => {
                    tracing::warn!(
                        "AI field extraction for {} unavailable: {}",
                        doc_type,
                        e
                    );
                    return;
                }
            };

            match ai::parse_response(
                response.content_or_empty(),
                missing,
                self.config.min_ai_response_length,
            ) {
                Ok(values) => {
                    self.accept_ai(doc_type, fields, missing, values);
                    return;
                }
                Err(e) => {
                    tracing::warn!(
                        "Malformed AI extraction response for {} (attempt {}/{}): {}",
                        doc_type,
                        attempt,
                        attempts,
                        e
                    );
                }
            }
        }
    }

    fn accept_ai(
        &self,
        doc_type: DocumentType,
        fields: &mut FieldSet,
        missing: &[FieldName],
        values: Vec<AiValue>,
    ) {
        for value in values {
            match value.key.parse::<FieldName>() {
                Ok(field) if missing.contains(&field) => {
                    let Some(typed) = field_value(field, &value.raw, self.today) else {
                        tracing::debug!("Discarding implausible AI value for {}", field);
                        continue;
                    };
                    let extracted = ExtractedField::new(
                        field,
                        value.raw,
                        typed,
                        value.confidence,
                        FieldSource::Ai,
                    );
                    if fields.insert(field, extracted) {
                        self.observer.on_event(&PipelineEvent::field_extracted(
                            doc_type,
                            field,
                            FieldSource::Ai,
                        ));
                    }
                }
                Ok(_) => {}
                Err(_) => fields.insert_extra(
                    value.key.clone(),
                    ExtractedField {
                        name: value.key,
                        raw_value: value.raw.clone(),
                        normalized_value: FieldValue::Text(value.raw),
                        confidence: value.confidence,
                        source: FieldSource::Ai,
                    },
                ),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryConfig;
    use crate::events::EventBus;
    use crate::resilience::DispatchQueue;
    use crate::traits::{LlmResponse, MockLlm};
    use crate::types::EngineKind;
    use std::time::Duration;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 1).unwrap()
    }

    fn ocr(text: &str) -> ExtractionResult {
        ExtractionResult::new(text, 0.9, EngineKind::LocalOcr, 1)
    }

    fn fast_caller() -> ResilientCaller {
        ResilientCaller::new(
            DispatchQueue::new(2, Duration::ZERO),
            RetryConfig {
                max_retries: 1,
                base_delay_ms: 1,
                max_delay_ms: 5,
                fallback_targets: Vec::new(),
            },
        )
    }

    fn settings() -> LlmConfig {
        LlmConfig {
            model: "test-model".to_string(),
            ..Default::default()
        }
    }

    fn respond(content: &'static str) -> LlmResponse {
        LlmResponse {
            content: Some(content.to_string()),
            model: "test-model".to_string(),
            usage: None,
        }
    }

    #[tokio::test]
    async fn test_labeled_identity_number() {
        let extractor = FieldExtractor::new(FieldConfig::default(), today());
        let text = "REPUBLIK INDONESIA\n#$% noise ~~\nNIK: 3201234567890123\nNama : BUDI SANTOSO\n";

        let result = extractor.extract(DocumentType::Identity, &ocr(text)).await;

        let nik = result.fields.get(FieldName::IdentityNumber).unwrap();
        assert_eq!(nik.normalized_value, FieldValue::Text("3201234567890123".into()));
        assert_eq!(nik.source, FieldSource::Pattern);
        assert!((nik.confidence - 0.81).abs() < 1e-6);
        assert!(result.gaps.contains(&FieldName::Province));
    }

    #[tokio::test]
    async fn test_normalized_pass_fixes_confused_glyphs() {
        let extractor = FieldExtractor::new(FieldConfig::default(), today());
        let text = "NIK : 32O10115O595OOOl\n";

        let result = extractor.extract(DocumentType::Identity, &ocr(text)).await;

        assert_eq!(
            result.fields.text(FieldName::IdentityNumber).as_deref(),
            Some("3201011505950001")
        );
        // Birth date and gender derived from the identity number.
        assert_eq!(
            result.fields.date(FieldName::BirthDate),
            NaiveDate::from_ymd_opt(1995, 5, 15)
        );
        assert_eq!(result.fields.text(FieldName::Gender).as_deref(), Some("LAKI-LAKI"));
    }

    #[tokio::test]
    async fn test_empty_text_reports_every_field_as_gap() {
        let bus = EventBus::new();
        let mut events = bus.subscribe();
        let extractor =
            FieldExtractor::new(FieldConfig::default(), today()).with_observer(Arc::new(bus));

        let result = extractor
            .extract(DocumentType::Diploma, &ExtractionResult::failed(1))
            .await;

        assert!(result.fields.is_empty());
        assert_eq!(result.gaps, fields_for(DocumentType::Diploma).to_vec());
        assert_eq!(events.drain().len(), fields_for(DocumentType::Diploma).len());
    }

    #[tokio::test]
    async fn test_ai_fills_remaining_fields() {
        let mut llm = MockLlm::new();
        llm.expect_generate().times(1).returning(|_, options| {
            let options = options.unwrap();
            assert_eq!(options.model.as_deref(), Some("test-model"));
            assert_eq!(options.response_format, Some(ResponseFormat::Json));
            Ok(respond(
                r#"{"fields": {"institution": {"value": "Universitas Indonesia", "confidence": 0.8}, "major": {"value": "Akuntansi", "confidence": 0.85}}}"#,
            ))
        });

        let extractor = FieldExtractor::new(FieldConfig::default(), today())
            .with_llm(Arc::new(llm), settings())
            .with_caller(fast_caller());
        let text = "Nama : SITI AMINAH\nIPK : 3.51\n";

        let result = extractor.extract(DocumentType::Transcript, &ocr(text)).await;

        assert_eq!(result.fields.number(FieldName::Gpa), Some(3.51));
        let major = result.fields.get(FieldName::Major).unwrap();
        assert_eq!(major.source, FieldSource::Ai);
        assert!((major.confidence - 0.85).abs() < 1e-6);
        assert!(result.gaps.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_ai_falls_back_to_patterns() {
        let mut llm = MockLlm::new();
        llm.expect_generate()
            .times(3)
            .returning(|_, _| Ok(respond("I could not find the requested fields, sorry.")));

        let config = FieldConfig {
            ai_first_types: vec![DocumentType::Identity],
            ..Default::default()
        };
        let extractor = FieldExtractor::new(config, today())
            .with_llm(Arc::new(llm), settings())
            .with_caller(fast_caller());
        let text = "data 3201011505950001 halaman 1";

        let result = extractor.extract(DocumentType::Identity, &ocr(text)).await;

        assert_eq!(extractor.strategies_for(DocumentType::Identity)[0], Strategy::Ai);
        let nik = result.fields.get(FieldName::IdentityNumber).unwrap();
        assert_eq!(nik.source, FieldSource::Pattern);
        assert!(result.gaps.contains(&FieldName::FullName));
    }

    #[tokio::test]
    async fn test_ai_failure_is_absorbed() {
        let mut llm = MockLlm::new();
        llm.expect_generate()
            .times(1)
            .returning(|_, _| Err(crate::error::VerifyError::Configuration("no key".into())));

        let extractor = FieldExtractor::new(FieldConfig::default(), today())
            .with_llm(Arc::new(llm), settings())
            .with_caller(fast_caller());

        let result = extractor
            .extract(DocumentType::ApplicationLetter, &ocr("Dengan hormat, saya mengajukan lamaran."))
            .await;

        assert_eq!(result.gaps, vec![FieldName::FullName]);
    }

    #[tokio::test]
    async fn test_ai_disabled_skips_model() {
        let llm = MockLlm::new();
        let config = FieldConfig {
            ai_enabled: false,
            ..Default::default()
        };
        let extractor = FieldExtractor::new(config, today()).with_llm(Arc::new(llm), settings());

        let result = extractor
            .extract(DocumentType::StatementLetter, &ocr("surat pernyataan"))
            .await;

        assert_eq!(result.gaps, vec![FieldName::FullName]);
    }
}
