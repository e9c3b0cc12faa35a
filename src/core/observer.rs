//! Turn observers: where trace events go.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::domain::{TurnEvent, TurnEventType};

/// Receives every event the orchestrator emits, in emission order.
///
/// Observers must not fail the turn; errors are theirs to log.
#[async_trait]
pub trait TurnObserver: Send + Sync {
    async fn record(&self, event: &TurnEvent);
}

/// Forwards events to `tracing`
#[derive(Debug, Default)]
pub struct TracingObserver;

#[async_trait]
impl TurnObserver for TracingObserver {
    async fn record(&self, event: &TurnEvent) {
        let turn = event.turn_id;
        if event.is_failure() {
            warn!(turn = %turn, phase = %event.phase, error = ?event.error, "{}", event.summary);
        } else if event.event_type == TurnEventType::FragmentReceived {
            debug!(turn = %turn, "{}", event.summary);
        } else {
            info!(turn = %turn, phase = %event.phase, "{}", event.summary);
        }
    }
}

/// Keeps events in memory
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<TurnEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<TurnEvent> {
        self.events.lock().clone()
    }

    pub fn event_types(&self) -> Vec<TurnEventType> {
        self.events.lock().iter().map(|e| e.event_type).collect()
    }

    pub fn count(&self, event_type: TurnEventType) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| e.event_type == event_type)
            .count()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

#[async_trait]
impl TurnObserver for RecordingObserver {
    async fn record(&self, event: &TurnEvent) {
        self.events.lock().push(event.clone());
    }
}

/// Fans each event out to several observers in order
#[derive(Default)]
pub struct Observers {
    observers: Vec<Arc<dyn TurnObserver>>,
}

impl Observers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, observer: Arc<dyn TurnObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

#[async_trait]
impl TurnObserver for Observers {
    async fn record(&self, event: &TurnEvent) {
        for observer in &self.observers {
            observer.record(event).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TurnPhase;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_fan_out_reaches_every_observer() {
        let first = Arc::new(RecordingObserver::new());
        let second = Arc::new(RecordingObserver::new());
        let observers = Observers::new()
            .with(first.clone())
            .with(Arc::new(TracingObserver))
            .with(second.clone());
        assert_eq!(observers.len(), 3);

        let event = TurnEvent::new(
            Uuid::new_v4(),
            "thread-1",
            TurnEventType::CaptureStarted,
            TurnPhase::Capturing,
            "Capture started",
        );
        observers.record(&event).await;

        assert_eq!(first.event_types(), vec![TurnEventType::CaptureStarted]);
        assert_eq!(second.count(TurnEventType::CaptureStarted), 1);
    }
}
