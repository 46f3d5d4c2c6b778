//! Broadcast observer for watching a verification run from the outside.

use tokio::sync::broadcast;

use crate::events::{Observer, PipelineEvent};

/// How far a subscriber may fall behind before it starts losing the oldest
/// events. A five-document bundle emits well under this.
const BACKLOG: usize = 1024;

/// Observer that fans every pipeline event out to its subscribers.
///
/// Publishing never waits: with no subscriber the event is dropped, and a
/// subscriber that falls more than the backlog behind skips ahead.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<PipelineEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(BACKLOG);
        Self { sender }
    }

    /// Events published from now on.
    pub fn subscribe(&self) -> EventSubscriber {
        EventSubscriber {
            receiver: self.sender.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Observer for EventBus {
    fn on_event(&self, event: &PipelineEvent) {
        let _ = self.sender.send(event.clone());
    }
}

/// Receiving end of an [`EventBus`].
pub struct EventSubscriber {
    receiver: broadcast::Receiver<PipelineEvent>,
}

impl EventSubscriber {
    /// Wait for the next event; `None` once every bus handle is gone.
    pub async fn next(&mut self) -> Option<PipelineEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Closed) => return None,
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "pipeline event subscriber fell behind");
                }
            }
        }
    }

    /// Everything published so far that this subscriber has not seen.
    pub fn drain(&mut self) -> Vec<PipelineEvent> {
        let mut events = Vec::new();
        loop {
            match self.receiver.try_recv() {
                Ok(event) => events.push(event),
                Err(broadcast::error::TryRecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "pipeline event subscriber fell behind");
                }
                Err(_) => return events,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CheckCategory, CheckStatus, DocumentType, FieldName, VerdictStatus};

    fn publish_run(bus: &EventBus) {
        let observer: &dyn Observer = bus;
        observer.on_event(&PipelineEvent::field_gap(DocumentType::Transcript, FieldName::Gpa));
        observer.on_event(&PipelineEvent::check_evaluated(
            DocumentType::Transcript,
            CheckCategory::Gpa,
            CheckStatus::Warning,
            "Minimum GPA",
        ));
        observer.on_event(&PipelineEvent::verdict_reached(
            DocumentType::Transcript,
            VerdictStatus::NeedReview,
            0.7,
        ));
    }

    #[test]
    fn test_subscriber_sees_run_in_order() {
        let bus = EventBus::new();
        let mut events = bus.subscribe();
        publish_run(&bus);

        let kinds: Vec<&str> = events.drain().iter().map(|e| e.event_type()).collect();
        assert_eq!(kinds, ["field.gap", "check.evaluated", "verdict.reached"]);
        assert!(events.drain().is_empty());
    }

    #[test]
    fn test_publishing_without_subscribers_is_silent() {
        let bus = EventBus::new();
        publish_run(&bus);
        assert_eq!(bus.subscriber_count(), 0);

        // A late subscriber only sees what comes after it.
        let mut late = bus.subscribe();
        assert!(late.drain().is_empty());
    }

    #[tokio::test]
    async fn test_next_ends_when_bus_is_dropped() {
        let bus = EventBus::new();
        let mut events = bus.subscribe();
        publish_run(&bus);
        drop(bus);

        let mut seen = 0;
        while let Some(event) = events.next().await {
            assert_eq!(event.document_type(), DocumentType::Transcript);
            seen += 1;
        }
        assert_eq!(seen, 3);
    }
}
