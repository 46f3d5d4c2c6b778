//! Observers receive pipeline events.

use std::sync::Arc;

use crate::events::PipelineEvent;
use crate::types::{CheckStatus, VerdictStatus};

/// Sink for structured pipeline events.
pub trait Observer: Send + Sync {
    fn on_event(&self, event: &PipelineEvent);
}

/// Shared observer handle.
pub type SharedObserver = Arc<dyn Observer>;

/// Re-emits events as leveled `tracing` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl Observer for TracingObserver {
    fn on_event(&self, event: &PipelineEvent) {
        match event {
            PipelineEvent::ExtractionTierSelected {
                document_type,
                engine,
                page,
                confidence,
                ..
            } => tracing::info!(
                document = %document_type,
                engine = %engine,
                page,
                confidence,
                "extraction tier selected"
            ),
            PipelineEvent::ExtractionTierFailed {
                document_type,
                engine,
                page,
                reason,
                ..
            } => tracing::warn!(
                document = %document_type,
                engine = %engine,
                page,
                reason = %reason,
                "extraction tier failed"
            ),
            PipelineEvent::FieldExtracted {
                document_type,
                field,
                source,
                ..
            } => tracing::debug!(document = %document_type, field = %field, source = %source, "field extracted"),
            PipelineEvent::FieldGap {
                document_type,
                field,
                ..
            } => tracing::debug!(document = %document_type, field = %field, "field gap"),
            PipelineEvent::CheckEvaluated {
                document_type,
                category,
                status,
                label,
                ..
            } => match status {
                CheckStatus::Failed => tracing::warn!(
                    document = %document_type,
                    category = %category,
                    label = %label,
                    "check failed"
                ),
                _ => tracing::debug!(
                    document = %document_type,
                    category = %category,
                    status = %status,
                    label = %label,
                    "check evaluated"
                ),
            },
            PipelineEvent::VerdictReached {
                document_type,
                status,
                score,
                ..
            } => match status {
                VerdictStatus::Rejected => {
                    tracing::warn!(document = %document_type, status = %status, score, "verdict reached")
                }
                _ => tracing::info!(document = %document_type, status = %status, score, "verdict reached"),
            },
        }
    }
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl Observer for NoopObserver {
    fn on_event(&self, _event: &PipelineEvent) {}
}
