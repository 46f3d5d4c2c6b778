//! Academic major compatibility judgment.

use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::config::MatchingConfig;
use crate::error::{ErrorCode, VerifyError, VerifyResult};
use crate::json_parser::{parse_json_object, require_keys};
use crate::matching::{major_compatibility, CompatibilityTier};
use crate::prompts;
use crate::resilience::ResilientCaller;
use crate::traits::{GenerationOptions, Llm, LlmConfig, ResponseFormat};
use crate::types::{CheckSource, Message};

/// Outcome of a major compatibility judgment.
#[derive(Debug, Clone, PartialEq)]
pub struct MajorJudgment {
    pub score: u8,
    pub tier: CompatibilityTier,
    pub matched: Option<String>,
    pub source: CheckSource,
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AiJudgment {
    score: f64,
    #[serde(default)]
    matched: Option<String>,
    #[serde(default)]
    reason: Option<String>,
}

/// Judges an extracted major against the accepted ones.
///
/// A deterministic pass is final. Anything below that is referred to the
/// generative model when one is configured, and the deterministic result
/// stands whenever that call fails or answers malformed JSON.
pub struct MajorJudge {
    matching: MatchingConfig,
    caller: ResilientCaller,
    ai: Option<(Arc<dyn Llm>, LlmConfig)>,
    min_response_length: usize,
}

impl MajorJudge {
    pub fn new(matching: MatchingConfig) -> Self {
        Self {
            matching,
            caller: ResilientCaller::default(),
            ai: None,
            min_response_length: 10,
        }
    }

    pub fn with_llm(mut self, llm: Arc<dyn Llm>, settings: LlmConfig) -> Self {
        self.ai = Some((llm, settings));
        self
    }

    pub fn with_caller(mut self, caller: ResilientCaller) -> Self {
        self.caller = caller;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.caller = self.caller.with_cancellation(token);
        self
    }

    pub fn with_min_response_length(mut self, min_length: usize) -> Self {
        self.min_response_length = min_length;
        self
    }

    pub async fn judge(&self, extracted: &str, required: &[String]) -> MajorJudgment {
        let deterministic = major_compatibility(extracted, required, &self.matching);
        let fallback = MajorJudgment {
            score: deterministic.score,
            tier: deterministic.tier,
            matched: deterministic.matched,
            source: CheckSource::Matcher,
            reason: deterministic
                .via_group
                .then(|| "same academic field".to_string()),
        };

        if fallback.tier == CompatibilityTier::Pass {
            return fallback;
        }
        let Some((llm, settings)) = self.ai.as_ref() else {
            return fallback;
        };

        match self.ask(llm, settings, extracted, required).await {
            Ok(judgment) => judgment,
            Err(e) => {
                tracing::warn!(
                    "AI major judgment unavailable, using deterministic score {}: {}",
                    fallback.score,
                    e
                );
                fallback
            }
        }
    }

    async fn ask(
        &self,
        llm: &Arc<dyn Llm>,
        settings: &LlmConfig,
        extracted: &str,
        required: &[String],
    ) -> VerifyResult<MajorJudgment> {
        let messages = vec![
            Message::system(prompts::major_compatibility_prompt()),
            Message::user(prompts::major_compatibility_message(extracted, required)),
        ];

        let response = self
            .caller
            .execute(&settings.model, |model| {
                let llm = llm.clone();
                let messages = messages.clone();
                let options = GenerationOptions {
                    model: Some(model),
                    temperature: Some(settings.temperature),
                    max_tokens: Some(settings.max_tokens),
                    response_format: Some(ResponseFormat::Json),
                };
                async move { llm.generate(&messages, Some(options)).await }
            })
            .await?;

        let root: Value = parse_json_object(response.content_or_empty(), self.min_response_length)?;
        let object = root.as_object().ok_or_else(|| VerifyError::Parse {
            message: "judgment is not a JSON object".to_string(),
            code: ErrorCode::ParseInvalidJson,
        })?;
        require_keys(object, &["score"])?;
        let parsed: AiJudgment = serde_json::from_value(root)?;

        let score = parsed.score.round().clamp(0.0, 100.0) as u8;
        Ok(MajorJudgment {
            score,
            tier: CompatibilityTier::from_score(score, &self.matching),
            matched: parsed.matched.filter(|m| !m.trim().is_empty()),
            source: CheckSource::Ai,
            reason: parsed.reason,
        })
    }
}
