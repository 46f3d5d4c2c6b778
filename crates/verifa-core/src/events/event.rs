//! Pipeline diagnostic events.
//!
//! Emitted at tier selection, check evaluation and verdict time so callers
//! can observe the pipeline without parsing log output.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{
    CheckCategory, CheckStatus, DocumentType, EngineKind, FieldName, FieldSource, VerdictStatus,
};

/// Structured pipeline event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    /// An extraction tier produced the accepted text for a page.
    ExtractionTierSelected {
        document_type: DocumentType,
        engine: EngineKind,
        /// 1-based page number; 0 for whole-document tiers.
        page: usize,
        confidence: f32,
        timestamp: DateTime<Utc>,
    },
    /// An extraction tier failed or was gated out.
    ExtractionTierFailed {
        document_type: DocumentType,
        engine: EngineKind,
        page: usize,
        reason: String,
        timestamp: DateTime<Utc>,
    },
    /// A field was extracted.
    FieldExtracted {
        document_type: DocumentType,
        field: FieldName,
        source: FieldSource,
        timestamp: DateTime<Utc>,
    },
    /// A field could not be extracted by any strategy.
    FieldGap {
        document_type: DocumentType,
        field: FieldName,
        timestamp: DateTime<Utc>,
    },
    /// A validation rule was evaluated.
    CheckEvaluated {
        document_type: DocumentType,
        category: CheckCategory,
        status: CheckStatus,
        label: String,
        timestamp: DateTime<Utc>,
    },
    /// A verdict was reached for a document.
    VerdictReached {
        document_type: DocumentType,
        status: VerdictStatus,
        score: f32,
        timestamp: DateTime<Utc>,
    },
}

impl PipelineEvent {
    /// Get the event type as a string for filtering.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::ExtractionTierSelected { .. } => "extraction.tier_selected",
            Self::ExtractionTierFailed { .. } => "extraction.tier_failed",
            Self::FieldExtracted { .. } => "field.extracted",
            Self::FieldGap { .. } => "field.gap",
            Self::CheckEvaluated { .. } => "check.evaluated",
            Self::VerdictReached { .. } => "verdict.reached",
        }
    }

    /// Document type the event relates to.
    pub fn document_type(&self) -> DocumentType {
        match self {
            Self::ExtractionTierSelected { document_type, .. }
            | Self::ExtractionTierFailed { document_type, .. }
            | Self::FieldExtracted { document_type, .. }
            | Self::FieldGap { document_type, .. }
            | Self::CheckEvaluated { document_type, .. }
            | Self::VerdictReached { document_type, .. } => *document_type,
        }
    }

    pub fn tier_selected(
        document_type: DocumentType,
        engine: EngineKind,
        page: usize,
        confidence: f32,
    ) -> Self {
        Self::ExtractionTierSelected {
            document_type,
            engine,
            page,
            confidence,
            timestamp: Utc::now(),
        }
    }

    pub fn tier_failed(
        document_type: DocumentType,
        engine: EngineKind,
        page: usize,
        reason: impl Into<String>,
    ) -> Self {
        Self::ExtractionTierFailed {
            document_type,
            engine,
            page,
            reason: reason.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn field_extracted(document_type: DocumentType, field: FieldName, source: FieldSource) -> Self {
        Self::FieldExtracted {
            document_type,
            field,
            source,
            timestamp: Utc::now(),
        }
    }

    pub fn field_gap(document_type: DocumentType, field: FieldName) -> Self {
        Self::FieldGap {
            document_type,
            field,
            timestamp: Utc::now(),
        }
    }

    pub fn check_evaluated(
        document_type: DocumentType,
        category: CheckCategory,
        status: CheckStatus,
        label: impl Into<String>,
    ) -> Self {
        Self::CheckEvaluated {
            document_type,
            category,
            status,
            label: label.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn verdict_reached(document_type: DocumentType, status: VerdictStatus, score: f32) -> Self {
        Self::VerdictReached {
            document_type,
            status,
            score,
            timestamp: Utc::now(),
        }
    }
}
