use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::error::{NsDoctorError, Result};
use crate::models::{DiagnosticEvent, DiagnosticEventType};

const CHANNEL_CAPACITY: usize = 1024;

/// Broadcasts progress of a diagnostic pass to whoever renders it.
pub struct EventBus {
    sender: broadcast::Sender<DiagnosticEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DiagnosticEvent> {
        self.sender.subscribe()
    }

    /// Publishing with nobody listening is not an error.
    pub fn publish(&self, event: DiagnosticEvent) {
        debug!("Publishing event {:?} for run {}", event.event_type, event.run_id);

        match self.sender.send(event) {
            Ok(receivers) => debug!("Event sent to {} receivers", receivers),
            Err(_) => debug!("No subscribers for event"),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

pub struct EventFilter {
    allowed_types: Vec<DiagnosticEventType>,
}

impl EventFilter {
    pub fn new(allowed_types: Vec<DiagnosticEventType>) -> Self {
        Self { allowed_types }
    }

    pub fn matches(&self, event: &DiagnosticEvent) -> bool {
        self.allowed_types.is_empty() || self.allowed_types.contains(&event.event_type)
    }
}

pub struct FilteredReceiver {
    receiver: broadcast::Receiver<DiagnosticEvent>,
    filter: EventFilter,
}

impl FilteredReceiver {
    pub fn new(receiver: broadcast::Receiver<DiagnosticEvent>, filter: EventFilter) -> Self {
        Self { receiver, filter }
    }

    pub async fn recv(&mut self) -> Result<DiagnosticEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        return Ok(event);
                    }
                }
                Err(broadcast::error::RecvError::Closed) => {
                    return Err(NsDoctorError::InternalError(
                        "Event channel closed".to_string(),
                    ));
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Receiver lagged by {} messages", n);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_event_bus_publish_subscribe() {
        let bus = EventBus::new();
        let mut receiver = bus.subscribe();

        bus.publish(DiagnosticEvent::scope_resolved(
            Uuid::new_v4(),
            vec!["kyverno".to_string()],
        ));

        let received = receiver.recv().await.unwrap();
        assert_eq!(received.event_type, DiagnosticEventType::ScopeResolved);
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::new();
        bus.publish(DiagnosticEvent::scope_resolved(Uuid::new_v4(), vec![]));

        // a receiver created afterwards does not see earlier events
        let mut receiver = bus.subscribe();
        assert!(receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_filtered_receiver_skips_other_types() {
        let bus = EventBus::new();
        let mut receiver = FilteredReceiver::new(
            bus.subscribe(),
            EventFilter::new(vec![DiagnosticEventType::NamespaceVerified]),
        );
        let run_id = Uuid::new_v4();

        bus.publish(DiagnosticEvent::scope_resolved(run_id, vec![]));
        bus.publish(DiagnosticEvent::namespace_verified(
            run_id,
            "test1".to_string(),
            crate::models::VerificationOutcome::Deleted,
        ));

        let received = receiver.recv().await.unwrap();
        assert_eq!(received.event_type, DiagnosticEventType::NamespaceVerified);
    }
}
